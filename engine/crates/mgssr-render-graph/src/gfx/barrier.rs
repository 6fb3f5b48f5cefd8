use ash::vk;

use crate::gfx::GfxImageHandle;

/// 便捷创建 image memory barrier 的结构体
///
/// 与 `vk::ImageMemoryBarrier2` 一一对应，只是用物理 handle 代替 `vk::Image`，
/// 由后端在录制时翻译。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxImageBarrier {
    pub image: GfxImageHandle,
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub aspect: vk::ImageAspectFlags,
}

impl GfxImageBarrier {
    pub fn new(image: GfxImageHandle) -> Self {
        Self {
            image,
            src_stage: vk::PipelineStageFlags2::NONE,
            src_access: vk::AccessFlags2::NONE,
            dst_stage: vk::PipelineStageFlags2::NONE,
            dst_access: vk::AccessFlags2::NONE,
            old_layout: vk::ImageLayout::UNDEFINED,
            new_layout: vk::ImageLayout::UNDEFINED,
            aspect: vk::ImageAspectFlags::COLOR,
        }
    }

    /// builder
    #[inline]
    pub fn layout_transfer(mut self, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> Self {
        self.old_layout = old_layout;
        self.new_layout = new_layout;
        self
    }

    /// builder
    #[inline]
    pub fn src_mask(mut self, src_stage: vk::PipelineStageFlags2, src_access: vk::AccessFlags2) -> Self {
        self.src_stage = src_stage;
        self.src_access = src_access;
        self
    }

    /// builder
    #[inline]
    pub fn dst_mask(mut self, dst_stage: vk::PipelineStageFlags2, dst_access: vk::AccessFlags2) -> Self {
        self.dst_stage = dst_stage;
        self.dst_access = dst_access;
        self
    }

    /// builder
    #[inline]
    pub fn image_aspect_flag(mut self, aspect: vk::ImageAspectFlags) -> Self {
        self.aspect = aspect;
        self
    }
}
