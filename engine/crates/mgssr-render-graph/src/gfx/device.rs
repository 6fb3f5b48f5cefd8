use ash::vk;

use crate::gfx::{GfxError, GfxImageBarrier, GfxImageHandle, GfxProgram, RendererList};
use crate::render_graph::RgImageDesc;

/// 全屏 pass 的绘制参数
///
/// 相当于“绑定程序的某个 pass、绑定输入纹理和 uniform，然后画一个全屏三角形”。
/// 输入纹理的槽位顺序和 uniform 的内存布局由程序自身约定。
pub struct GfxFullscreenDraw<'a> {
    pub program: &'a GfxProgram,
    pub pass_index: u32,
    pub textures: &'a [GfxImageHandle],
    /// `#[repr(C)]` uniform block 的字节
    pub uniforms: &'a [u8],
    pub target: GfxImageHandle,
}

/// 只读深度测试
///
/// 深度写入始终关闭，只和已经存在的深度（通常来自 depth pre-pass）比较。
#[derive(Clone, Copy, Debug)]
pub struct GfxDepthTest {
    pub depth: GfxImageHandle,
    pub compare: vk::CompareOp,
}

/// renderer list 的绘制参数
///
/// `override_program` 是显式参数：list 中的每个物体都用它来着色，而不是物体自己的材质。
pub struct GfxRendererListDraw<'a> {
    pub list: &'a RendererList,
    pub override_program: &'a GfxProgram,
    pub view: glam::Mat4,
    pub projection: glam::Mat4,
    pub uniforms: &'a [u8],
    pub depth_test: Option<GfxDepthTest>,
    /// 绘制前用该颜色清空 target
    pub clear: Option<glam::Vec4>,
    pub target: GfxImageHandle,
}

/// 命令录制接口
///
/// Pass 在执行阶段通过它录制命令。后端可以立即执行（CPU 参考实现），
/// 也可以写入真正的命令缓冲区。
pub trait GfxCommandEncoder {
    fn image_barriers(&mut self, barriers: &[GfxImageBarrier]);

    fn begin_label(&mut self, name: &str);

    fn end_label(&mut self);

    /// 整图拷贝，源和目标尺寸必须一致
    fn copy_image(&mut self, src: GfxImageHandle, dst: GfxImageHandle) -> Result<(), GfxError>;

    fn draw_renderer_list(&mut self, draw: &GfxRendererListDraw<'_>) -> Result<(), GfxError>;

    fn draw_fullscreen(&mut self, draw: &GfxFullscreenDraw<'_>) -> Result<(), GfxError>;
}

/// 设备接口：资源分配 + 命令录制
pub trait GfxDevice: GfxCommandEncoder {
    fn create_image(&mut self, name: &str, desc: &RgImageDesc) -> Result<GfxImageHandle, GfxError>;

    fn destroy_image(&mut self, image: GfxImageHandle);

    /// Pass 执行时只暴露命令录制接口
    fn as_encoder(&mut self) -> &mut dyn GfxCommandEncoder;
}
