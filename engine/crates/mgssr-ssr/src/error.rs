use mgssr_render_graph::render_graph::RgError;
use thiserror::Error;

use crate::pipeline::SsrFrameState;

/// SSR 错误
///
/// 所有错误都局限在 SSR 内部：最坏的结果是这一帧没有反射，而不是整帧失败。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SsrError {
    /// 找不到需要的着色程序
    #[error("shader program '{name}' cannot be resolved")]
    Resolution { name: &'static str },

    /// 参数非法，在构建 pipeline 时拒绝
    #[error("invalid SSR setting `{field}`: {reason}")]
    Configuration { field: &'static str, reason: String },

    /// 中间资源无法分配或帧输入不可用
    #[error("SSR resource error: {0}")]
    Resource(String),

    /// 帧内的阶段顺序错误
    #[error("invalid SSR frame transition {from:?} -> {to:?}")]
    InvalidTransition { from: SsrFrameState, to: SsrFrameState },

    #[error(transparent)]
    Graph(#[from] RgError),
}
