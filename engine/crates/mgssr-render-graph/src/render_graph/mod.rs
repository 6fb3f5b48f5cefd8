//! RenderGraph - 声明式渲染图系统
//!
//! 提供自动依赖分析、pass 裁剪和 barrier 生成的渲染图抽象。
//!
//! # 核心概念
//!
//! - **RgImageHandle**: 虚拟资源句柄，在 graph 内部标识资源
//! - **RgImageState**: 资源状态描述，包含 stage、access、layout
//! - **RgPass**: 渲染 Pass trait，声明资源依赖和执行逻辑
//! - **RenderGraphBuilder**: 构建器，用于注册资源和 Pass
//! - **CompiledGraph**: 编译结果，包含执行顺序、裁剪结果和预计算的 barriers
//! - **RgGlobalTextures**: 帧内的全局纹理表，使用强类型 key
//!
//! # 使用示例
//!
//! ```ignore
//! use mgssr_render_graph::render_graph::*;
//!
//! struct BlurPass {
//!     input: RgImageHandle,
//!     output: Option<RgImageHandle>,
//! }
//!
//! impl RgPass for BlurPass {
//!     fn setup(&mut self, builder: &mut RgPassBuilder) {
//!         builder.read_image(self.input, RgImageState::SHADER_READ_FRAGMENT);
//!         let output = builder.create_image("blur-output", RgImageDesc::new_2d(w, h, vk::Format::R8G8B8A8_UNORM));
//!         self.output = Some(builder.write_image(output, RgImageState::COLOR_ATTACHMENT_WRITE));
//!     }
//!
//!     fn execute(&self, ctx: &mut RgPassContext<'_>) -> Result<(), RgError> {
//!         let input = ctx.get_image(self.input)?;
//!         // 录制命令 ...
//!         Ok(())
//!     }
//! }
//!
//! let mut builder = RenderGraphBuilder::new();
//! let color = builder.import_image("color", color_handle, color_desc, RgImageState::COLOR_ATTACHMENT_WRITE);
//! builder.add_pass("blur", BlurPass { input: color, output: None });
//!
//! let graph = builder.compile()?;
//! let report = graph.execute(&mut device);
//! ```
//!
//! # 模块结构
//!
//! - `resource_handle`: 虚拟资源句柄定义
//! - `resource_state`: 资源状态（stage/access/layout）封装
//! - `image_resource` / `resource_registry`: 资源描述与注册表
//! - `global_textures`: 帧内全局纹理表
//! - `pass`: Pass trait 和 builder
//! - `graph`: 依赖图、拓扑排序和裁剪
//! - `barrier`: 自动 barrier 计算
//! - `transient`: 临时资源的作用域分配
//! - `executor`: 构建器和执行器

mod barrier;
mod error;
mod executor;
mod global_textures;
mod graph;
mod image_resource;
mod pass;
mod resource_handle;
mod resource_registry;
mod resource_state;
mod transient;

pub use barrier::{PassBarriers, RgImageBarrierDesc};
pub use error::RgError;
pub use executor::{CompiledGraph, RenderGraphBuilder, RgExecuteReport, RgSkippedPass};
pub use global_textures::{RgGlobalTextureKey, RgGlobalTextures};
pub use graph::{DependencyEdge, DependencyGraph, DependencyKind};
pub use image_resource::{RgImageDesc, RgImageResource, RgImageSource};
pub use pass::{RgPass, RgPassBuilder, RgPassContext, RgPassNode};
pub use resource_handle::RgImageHandle;
pub use resource_registry::RgResourceRegistry;
pub use resource_state::RgImageState;
pub use transient::RgTransientArena;
