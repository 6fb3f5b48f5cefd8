//! GFX 后端边界
//!
//! 渲染图与具体图形 API 之间的接口。宿主（真实 GPU 后端，或者 `mgssr-soft-gfx` 的 CPU 参考实现）
//! 实现 `GfxDevice`，渲染图在执行阶段通过它申请临时图像、插入 barrier、录制命令。

mod barrier;
mod device;
mod error;
mod handles;
mod program;
mod renderer_list;
pub mod screen;

pub use barrier::GfxImageBarrier;
pub use device::{GfxCommandEncoder, GfxDepthTest, GfxDevice, GfxFullscreenDraw, GfxRendererListDraw};
pub use error::GfxError;
pub use handles::{GfxImageHandle, GfxMeshHandle, GfxProgramHandle};
pub use program::{GfxProgram, GfxProgramLibrary};
pub use renderer_list::{DrawItem, RenderQueueRange, RendererList, RendererListDesc, ShaderTagId, SortingCriteria};
