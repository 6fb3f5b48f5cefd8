//! mgssr 渲染图
//!
//! - `gfx`: 后端边界。渲染图只通过这里的 trait 申请图像、录制命令。
//! - `render_graph`: 声明式渲染图，负责依赖分析、裁剪、barrier 计算和临时资源的生命周期。

pub mod gfx;
pub mod render_graph;
