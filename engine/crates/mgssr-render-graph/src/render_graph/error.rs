use thiserror::Error;

use crate::gfx::GfxError;
use crate::render_graph::RgImageHandle;

/// 渲染图错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RgError {
    /// 依赖图中存在环
    #[error("cycle detected involving passes: {0:?}")]
    Cycle(Vec<String>),

    /// 同一帧内同一个全局纹理 key 被发布了两次
    #[error("global texture '{key}' is already published by pass '{first}', pass '{second}' published it again")]
    DuplicateGlobal { key: &'static str, first: String, second: String },

    /// Pass 引用了不属于本 graph 的图像
    #[error("pass '{pass}' references unknown image {image:?}")]
    UnknownImage { pass: String, image: RgImageHandle },

    /// 执行阶段图像没有对应的物理资源（被裁剪或分配失败）
    #[error("image {0:?} has no physical resource")]
    MissingPhysicalImage(RgImageHandle),

    /// 临时资源分配失败
    #[error("failed to allocate transient image '{name}': {source}")]
    Allocation {
        name: String,
        #[source]
        source: GfxError,
    },

    #[error(transparent)]
    Gfx(#[from] GfxError),
}
