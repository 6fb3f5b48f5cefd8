use ash::vk;
use glam::{UVec2, Vec2, Vec4};
use half::f16;
use mgssr_render_graph::gfx::GfxError;
use mgssr_render_graph::render_graph::RgImageDesc;
use rayon::prelude::*;

/// 后端支持的格式
pub const SUPPORTED_FORMATS: &[vk::Format] = &[
    vk::Format::R8G8B8A8_UNORM,
    vk::Format::B8G8R8A8_UNORM,
    vk::Format::R16G16_UNORM,
    vk::Format::R16G16B16A16_SFLOAT,
    vk::Format::R32G32B32A32_SFLOAT,
    vk::Format::D32_SFLOAT,
];

/// 按存储格式量化一个 texel
///
/// 不存在的通道读回时为 0（alpha 为 1），和 GPU 的采样行为一致。
pub fn quantize(format: vk::Format, value: Vec4) -> Vec4 {
    let unorm = |v: f32, max: f32| (v.clamp(0.0, 1.0) * max).round() / max;
    match format {
        vk::Format::R8G8B8A8_UNORM | vk::Format::B8G8R8A8_UNORM => Vec4::new(
            unorm(value.x, 255.0),
            unorm(value.y, 255.0),
            unorm(value.z, 255.0),
            unorm(value.w, 255.0),
        ),
        vk::Format::R16G16_UNORM => Vec4::new(unorm(value.x, 65535.0), unorm(value.y, 65535.0), 0.0, 1.0),
        vk::Format::R16G16B16A16_SFLOAT => Vec4::new(
            f16::from_f32(value.x).to_f32(),
            f16::from_f32(value.y).to_f32(),
            f16::from_f32(value.z).to_f32(),
            f16::from_f32(value.w).to_f32(),
        ),
        vk::Format::D32_SFLOAT => Vec4::new(value.x, 0.0, 0.0, 1.0),
        _ => value,
    }
}

/// CPU 端的 2D 图像
#[derive(Clone, Debug, Default)]
pub struct SoftImage {
    name: String,
    desc: RgImageDesc,
    texels: Vec<Vec4>,
}

// new & init
impl SoftImage {
    pub fn new(name: impl Into<String>, desc: RgImageDesc) -> Result<Self, GfxError> {
        let name = name.into();
        if desc.width == 0 || desc.height == 0 {
            return Err(GfxError::InvalidExtent {
                name,
                width: desc.width,
                height: desc.height,
            });
        }
        if !SUPPORTED_FORMATS.contains(&desc.format) {
            return Err(GfxError::UnsupportedFormat {
                name,
                format: desc.format,
            });
        }

        let clear = quantize(desc.format, Vec4::ZERO);
        let texels = vec![clear; (desc.width * desc.height) as usize];
        Ok(Self { name, desc, texels })
    }
}

// getters
impl SoftImage {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn desc(&self) -> &RgImageDesc {
        &self.desc
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.desc.format
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.desc.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.desc.height
    }

    #[inline]
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.desc.width, self.desc.height)
    }

    #[inline]
    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.desc.width + x) as usize
    }

    /// 读取一个 texel，坐标必须在范围内
    #[inline]
    pub fn load(&self, x: u32, y: u32) -> Vec4 {
        self.texels[self.index(x, y)]
    }

    /// 最近点采样，坐标 clamp 到边缘
    pub fn sample_point(&self, uv: Vec2) -> Vec4 {
        let size = self.size().as_vec2();
        let p = (uv * size).floor().clamp(Vec2::ZERO, size - Vec2::ONE);
        self.load(p.x as u32, p.y as u32)
    }
}

// write
impl SoftImage {
    /// 写入一个 texel（按格式量化），坐标必须在范围内
    #[inline]
    pub fn store(&mut self, x: u32, y: u32, value: Vec4) {
        let index = self.index(x, y);
        self.texels[index] = quantize(self.desc.format, value);
    }

    pub fn fill(&mut self, value: Vec4) {
        let value = quantize(self.desc.format, value);
        self.texels.fill(value);
    }

    /// 逐像素着色整张图像，按行并行
    pub fn par_shade<F>(&mut self, shade: F)
    where
        F: Fn(UVec2) -> Vec4 + Sync,
    {
        let format = self.desc.format;
        let width = self.desc.width as usize;
        self.texels.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
            for (x, texel) in row.iter_mut().enumerate() {
                *texel = quantize(format, shade(UVec2::new(x as u32, y as u32)));
            }
        });
    }

    /// 整图拷贝，按目标格式重新量化
    pub fn copy_from(&mut self, src: &SoftImage) -> Result<(), GfxError> {
        if src.size() != self.size() {
            return Err(GfxError::ExtentMismatch {
                src_width: src.width(),
                src_height: src.height(),
                dst_width: self.width(),
                dst_height: self.height(),
            });
        }
        let format = self.desc.format;
        self.texels.iter_mut().zip(src.texels.iter()).for_each(|(dst, src)| *dst = quantize(format, *src));
        Ok(())
    }

    /// 转为 8 位 RGBA 图像（用于保存 PNG）
    pub fn to_rgba8(&self) -> ::image::RgbaImage {
        let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        ::image::RgbaImage::from_fn(self.width(), self.height(), |x, y| {
            let t = self.load(x, y);
            ::image::Rgba([to_u8(t.x), to_u8(t.y), to_u8(t.z), to_u8(t.w)])
        })
    }
}
