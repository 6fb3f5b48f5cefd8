//! 屏幕空间约定
//!
//! - NDC: x 向右、y 向上，深度范围 [0, 1]，1 为远平面（标准 Z）
//! - UV: 原点在左上角，v 向下
//! - 像素 `(x, y)` 的中心位于 `((x + 0.5) / w, (y + 0.5) / h)`
//!
//! 后端的光栅化与各个程序都必须使用同一套约定。

use glam::{UVec2, Vec2};

/// 深度缓冲清空值，同时也是“天空/无几何体”的标记
pub const FAR_DEPTH: f32 = 1.0;

#[inline]
pub fn ndc_to_uv(ndc: Vec2) -> Vec2 {
    Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5)
}

#[inline]
pub fn uv_to_ndc(uv: Vec2) -> Vec2 {
    Vec2::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0)
}

/// 像素中心的 UV
#[inline]
pub fn pixel_center_uv(pixel: UVec2, size: UVec2) -> Vec2 {
    (pixel.as_vec2() + Vec2::splat(0.5)) / size.as_vec2()
}

/// UV 所在的像素，越界时返回 `None`
#[inline]
pub fn uv_to_pixel(uv: Vec2, size: UVec2) -> Option<UVec2> {
    if !(0.0..=1.0).contains(&uv.x) || !(0.0..=1.0).contains(&uv.y) {
        return None;
    }
    let p = (uv * size.as_vec2()).floor();
    Some(UVec2::new((p.x as u32).min(size.x - 1), (p.y as u32).min(size.y - 1)))
}

/// 深度值是否表示天空
#[inline]
pub fn is_sky_depth(depth: f32) -> bool {
    depth >= FAR_DEPTH
}
