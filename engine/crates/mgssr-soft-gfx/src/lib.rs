//! GFX 接口的 CPU 参考实现
//!
//! 用于没有 GPU 的环境（测试、headless demo）。语义上尽量贴近真实后端：
//! - 图像按格式量化存储（f16、16 位 unorm、8 位 unorm）
//! - 程序按名字注册，全屏程序和 renderer list 覆盖程序是 CPU kernel
//! - 所有命令写入命令日志，便于断言执行顺序
//!
//! `scene` 模块扮演“宿主”：上传 mesh、生成 draw item、渲染不透明物体的
//! 深度、法线和颜色。

pub mod device;
pub mod image;
pub mod mesh;
pub mod program;
pub mod raster;
pub mod scene;

pub use device::{SoftCommand, SoftGfx};
pub use image::SoftImage;
pub use mesh::SoftMesh;
pub use program::{SoftFullscreenKernel, SoftProgram, SoftRasterKernel};
pub use raster::RasterFragment;
pub use scene::{SoftOpaqueTargets, SoftScene, SoftSceneObject};
