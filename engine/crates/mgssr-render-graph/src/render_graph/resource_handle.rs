//! RenderGraph 资源句柄定义
//!
//! 这些句柄是 graph 内部的虚拟引用，与后端的物理句柄 `GfxImageHandle` 分离。
//! 一个句柄只在创建它的 `RenderGraphBuilder` / `CompiledGraph` 中有效。

use slotmap::new_key_type;

new_key_type! {
    /// Graph 内部的 Image 句柄
    pub struct RgImageHandle;
}
