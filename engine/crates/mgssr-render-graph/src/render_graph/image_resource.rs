use ash::vk;

use crate::gfx::GfxImageHandle;
use crate::render_graph::RgImageState;

/// 图像资源描述（用于创建临时资源）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgImageDesc {
    /// 图像宽度
    pub width: u32,
    /// 图像高度
    pub height: u32,
    /// 图像格式
    pub format: vk::Format,
    /// 图像用途
    pub usage: vk::ImageUsageFlags,
}

impl Default for RgImageDesc {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            format: vk::Format::R8G8B8A8_UNORM,
            usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::COLOR_ATTACHMENT,
        }
    }
}

// new & init & builder
impl RgImageDesc {
    /// 创建 2D 图像描述
    #[inline]
    pub fn new_2d(width: u32, height: u32, format: vk::Format) -> Self {
        Self {
            width,
            height,
            format,
            ..Default::default()
        }
    }

    /// 设置用途（链式调用）
    #[inline]
    pub fn with_usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.usage = usage;
        self
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width,
            height: self.height,
        }
    }

    /// 从格式推断 aspect
    pub fn infer_aspect(format: vk::Format) -> vk::ImageAspectFlags {
        match format {
            vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
                vk::ImageAspectFlags::DEPTH
            }
            vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
            vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
            }
            _ => vk::ImageAspectFlags::COLOR,
        }
    }
}

/// 图像资源的来源
#[derive(Clone, Debug)]
pub enum RgImageSource {
    /// 从外部导入的图像（宿主持有，本帧内借用）
    Imported { image_handle: GfxImageHandle },
    /// 由 RenderGraph 创建的临时图像，执行结束后自动释放
    Transient,
}

/// 图像资源条目
#[derive(Clone, Debug)]
pub struct RgImageResource {
    /// 资源来源
    pub source: RgImageSource,
    /// 图像描述（导入资源同样需要，用于推断尺寸和 aspect）
    pub desc: RgImageDesc,
    /// graph 开始执行时的状态
    pub initial_state: RgImageState,
    /// 调试名称
    pub name: String,
}

// new & init
impl RgImageResource {
    /// 创建导入的图像资源
    pub fn imported(
        name: impl Into<String>,
        image_handle: GfxImageHandle,
        desc: RgImageDesc,
        initial_state: RgImageState,
    ) -> Self {
        Self {
            source: RgImageSource::Imported { image_handle },
            desc,
            initial_state,
            name: name.into(),
        }
    }

    /// 创建临时图像资源
    pub fn transient(name: impl Into<String>, desc: RgImageDesc) -> Self {
        Self {
            source: RgImageSource::Transient,
            desc,
            initial_state: RgImageState::UNDEFINED,
            name: name.into(),
        }
    }
}

// getters
impl RgImageResource {
    /// 根据格式推断 aspect flags
    #[inline]
    pub fn infer_aspect(&self) -> vk::ImageAspectFlags {
        RgImageDesc::infer_aspect(self.desc.format)
    }

    #[inline]
    pub fn is_imported(&self) -> bool {
        matches!(self.source, RgImageSource::Imported { .. })
    }

    /// 获取物理 image handle（仅对导入资源有效）
    #[inline]
    pub fn physical_handle(&self) -> Option<GfxImageHandle> {
        match &self.source {
            RgImageSource::Imported { image_handle } => Some(*image_handle),
            RgImageSource::Transient => None,
        }
    }
}
