//! 屏幕空间反射
//!
//! 每帧在 render graph 中录制四个 pass：
//! - `SsrThinGBuffer`：用覆盖程序绘制不透明物体，输出反射遮罩和物体厚度，发布为全局纹理
//! - `MgSSRPass`：读取深度、法线和 thin G-buffer，ray march 得到反射 UV
//! - `CopyColor`：拷贝当前颜色目标
//! - `MgSSRPassComposite`：按反射 UV 从拷贝中采样，混合回颜色目标
//!
//! 着色程序按名字从后端解析；`kernels` 提供它们的 CPU 实现。

pub mod error;
pub mod frame;
pub mod kernels;
pub mod passes;
pub mod pipeline;
pub mod programs;
pub mod settings;
pub mod tracing;

pub use error::SsrError;
pub use frame::{FrameContext, SsrCamera};
pub use pipeline::{SsrFeature, SsrFrame, SsrFrameOutcome, SsrFrameState};
pub use programs::SsrPrograms;
pub use settings::{RenderPassEvent, SsrSettings, TracingMode, ValidatedSsrSettings};
