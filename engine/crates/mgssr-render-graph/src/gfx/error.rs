use ash::vk;
use thiserror::Error;

use crate::gfx::{GfxImageHandle, GfxMeshHandle};

/// 后端错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GfxError {
    /// 设备不支持该格式
    #[error("format {format:?} is not supported for image '{name}'")]
    UnsupportedFormat { name: String, format: vk::Format },

    /// 图像尺寸非法（宽或高为 0）
    #[error("invalid extent {width}x{height} for image '{name}'")]
    InvalidExtent { name: String, width: u32, height: u32 },

    /// 句柄已失效或不属于该设备
    #[error("image {0:?} does not exist")]
    ImageNotFound(GfxImageHandle),

    /// mesh 句柄已失效
    #[error("mesh {0:?} does not exist")]
    MeshNotFound(GfxMeshHandle),

    /// 程序无法找到
    #[error("program '{0}' is not registered")]
    ProgramNotFound(String),

    /// 程序不包含请求的 pass
    #[error("program '{program}' has no pass {pass}")]
    InvalidProgramPass { program: String, pass: u32 },

    /// 程序类型与调用方式不匹配（例如用全屏 pass 的程序去画 renderer list）
    #[error("program '{0}' cannot be used for this kind of draw")]
    ProgramKindMismatch(String),

    /// 同一张图像既被采样又作为渲染目标
    #[error("image {0:?} is bound as both input and render target")]
    FeedbackLoop(GfxImageHandle),

    /// 拷贝的源和目标尺寸不一致
    #[error("extent mismatch: {src_width}x{src_height} -> {dst_width}x{dst_height}")]
    ExtentMismatch { src_width: u32, src_height: u32, dst_width: u32, dst_height: u32 },

    /// uniform 数据大小与程序约定不一致
    #[error("uniform block of program '{program}' expects {expected} bytes, got {actual}")]
    UniformSize { program: String, expected: usize, actual: usize },

    /// 程序期望的输入纹理数量不一致
    #[error("program '{program}' pass {pass} expects {expected} textures, got {actual}")]
    TextureCount { program: String, pass: u32, expected: usize, actual: usize },
}
