//! SSR 的 render graph pass
//!
//! 每个 pass 持有自己需要的全部数据（程序、uniform、图像句柄），
//! 因此不借用帧外的任何东西。

mod composite;
mod copy_color;
mod thin_gbuffer;
mod trace;

pub use composite::CompositePass;
pub use copy_color::CopyColorPass;
pub use thin_gbuffer::ThinGBufferPass;
pub use trace::ReflectionTracePass;

pub const THIN_GBUFFER_PASS_NAME: &str = "SsrThinGBuffer";
pub const COPY_COLOR_PASS_NAME: &str = "CopyColor";
pub const TRACE_PASS_NAME: &str = "MgSSRPass";
pub const COMPOSITE_PASS_NAME: &str = "MgSSRPassComposite";

pub const THIN_GBUFFER_IMAGE_NAME: &str = "_SsrThinGBuffer";
pub const COLOR_COPY_IMAGE_NAME: &str = "SSR_CopyColorTexture";
pub const REFLECTION_MAP_IMAGE_NAME: &str = "SSR_ReflectedUVMap";
