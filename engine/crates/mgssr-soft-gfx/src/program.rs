use glam::Vec4;
use mgssr_render_graph::gfx::GfxError;

use crate::{RasterFragment, SoftImage};

/// 全屏程序的一个 pass
///
/// 相当于“全屏三角形 + 片段着色器”。kernel 一次处理整个 target，
/// 因此可以在着色前构建加速结构（例如深度金字塔）。
pub trait SoftFullscreenKernel: Send + Sync {
    /// 输入纹理数量（槽位顺序由程序约定）
    fn input_count(&self) -> usize;

    /// uniform block 的字节数
    fn uniform_size(&self) -> usize;

    /// `inputs` 不会包含 `target` 本身
    fn dispatch(&self, inputs: &[&SoftImage], uniforms: &[u8], target: &mut SoftImage) -> Result<(), GfxError>;
}

/// renderer list 覆盖程序
pub trait SoftRasterKernel: Send + Sync {
    fn uniform_size(&self) -> usize;

    /// `object_params` 来自 draw item；出错时整个 draw 失败
    fn shade(&self, fragment: &RasterFragment, object_params: Vec4, uniforms: &[u8]) -> Result<Vec4, GfxError>;
}

/// 注册到后端的程序
pub enum SoftProgram {
    /// 每个元素是一个 pass
    Fullscreen(Vec<Box<dyn SoftFullscreenKernel>>),
    Raster(Box<dyn SoftRasterKernel>),
}

impl SoftProgram {
    pub fn pass_count(&self) -> u32 {
        match self {
            Self::Fullscreen(passes) => passes.len() as u32,
            Self::Raster(_) => 1,
        }
    }
}

/// 检查 uniform 大小
pub(crate) fn check_uniform_size(program: &str, expected: usize, actual: usize) -> Result<(), GfxError> {
    if expected != actual {
        return Err(GfxError::UniformSize {
            program: program.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}
