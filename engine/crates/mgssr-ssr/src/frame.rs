use ash::vk;
use glam::{Mat4, Vec3};
use mgssr_render_graph::gfx::DrawItem;
use mgssr_render_graph::render_graph::RgImageHandle;

use crate::SsrError;

/// 相机参数
///
/// 约定右手 view space（相机看向 -Z），投影矩阵输出 [0, 1] 深度。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SsrCamera {
    pub view: Mat4,
    pub projection: Mat4,
    /// 世界空间相机位置，用于 renderer list 排序
    pub position: Vec3,
}

impl SsrCamera {
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, fov_y: f32, aspect: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, up),
            projection: Mat4::perspective_rh(fov_y, aspect, z_near, z_far),
            position: eye,
        }
    }

    /// 光栅化和 ray march 都必须使用这个乘积，保证深度逐位一致
    #[inline]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// 一帧的输入
///
/// 图像都是宿主导入 render graph 之后的句柄；draw item 是宿主的裁剪结果，只在本帧内借用。
#[derive(Clone, Copy, Debug)]
pub struct FrameContext<'f> {
    pub camera: SsrCamera,
    pub width: u32,
    pub height: u32,
    /// 相机颜色目标的格式，ColorCopy 使用同样的格式
    pub color_format: vk::Format,

    pub depth: RgImageHandle,
    pub normal: RgImageHandle,
    pub color: RgImageHandle,

    pub draw_items: &'f [DrawItem],
}

impl FrameContext<'_> {
    pub(crate) fn check_viewport(&self) -> Result<(), SsrError> {
        if self.width == 0 || self.height == 0 {
            return Err(SsrError::Resource(format!("empty viewport {}x{}", self.width, self.height)));
        }
        Ok(())
    }
}
