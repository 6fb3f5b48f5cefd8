//! 临时资源的作用域分配
//!
//! graph 执行期间创建的临时图像全部登记在 arena 中，
//! arena 被 drop 时统一销毁，无论执行过程中是否有 pass 失败。

use crate::gfx::{GfxDevice, GfxImageHandle};
use crate::render_graph::{RgError, RgImageDesc};

pub struct RgTransientArena<'d> {
    device: &'d mut dyn GfxDevice,
    images: Vec<(String, GfxImageHandle)>,
}

// new & init
impl<'d> RgTransientArena<'d> {
    pub fn new(device: &'d mut dyn GfxDevice) -> Self {
        Self {
            device,
            images: Vec::new(),
        }
    }
}

impl RgTransientArena<'_> {
    /// 分配一张临时图像，生命周期与 arena 绑定
    pub fn allocate(&mut self, name: &str, desc: &RgImageDesc) -> Result<GfxImageHandle, RgError> {
        let image = self.device.create_image(name, desc).map_err(|source| RgError::Allocation {
            name: name.to_string(),
            source,
        })?;
        log::debug!("transient image '{}' allocated ({}x{} {:?})", name, desc.width, desc.height, desc.format);
        self.images.push((name.to_string(), image));
        Ok(image)
    }

    #[inline]
    pub fn device(&mut self) -> &mut dyn GfxDevice {
        &mut *self.device
    }

    #[inline]
    pub fn allocated_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for RgTransientArena<'_> {
    fn drop(&mut self) {
        for (name, image) in self.images.drain(..).rev() {
            log::debug!("transient image '{}' released", name);
            self.device.destroy_image(image);
        }
    }
}
