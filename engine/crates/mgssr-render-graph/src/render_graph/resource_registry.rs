use slotmap::SlotMap;

use crate::render_graph::{RgImageHandle, RgImageResource};

/// 资源注册表
///
/// 管理 RenderGraph 中所有声明的资源，提供虚拟句柄到资源信息的映射。
/// 使用 SlotMap 存储资源，提供稳定的句柄和高效的访问。
#[derive(Default)]
pub struct RgResourceRegistry {
    /// 图像资源表
    images: SlotMap<RgImageHandle, RgImageResource>,
}

// new & init
impl RgResourceRegistry {
    /// 创建新的资源注册表
    pub fn new() -> Self {
        Self::default()
    }
}

// register
impl RgResourceRegistry {
    pub fn register_image(&mut self, rg_image_resource: RgImageResource) -> RgImageHandle {
        self.images.insert(rg_image_resource)
    }
}

// getter & iter
impl RgResourceRegistry {
    /// 获取图像资源
    #[inline]
    pub fn get_image(&self, handle: RgImageHandle) -> Option<&RgImageResource> {
        self.images.get(handle)
    }

    #[inline]
    pub fn contains_image(&self, handle: RgImageHandle) -> bool {
        self.images.contains_key(handle)
    }

    /// 调试名称，未知句柄返回 `<unknown>`
    #[inline]
    pub fn image_name(&self, handle: RgImageHandle) -> &str {
        self.images.get(handle).map(|r| r.name.as_str()).unwrap_or("<unknown>")
    }

    /// 获取图像数量
    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// 迭代所有图像资源
    #[inline]
    pub fn iter_images(&self) -> impl Iterator<Item = (RgImageHandle, &RgImageResource)> {
        self.images.iter()
    }
}
