//! SSR 程序的 CPU 实现
//!
//! 注册到 `SoftGfx` 之后，`SsrPrograms::resolve` 就能按名字找到它们。

use glam::{UVec2, Vec4};
use mgssr_render_graph::gfx::{GfxError, GfxProgramHandle};
use mgssr_soft_gfx::{RasterFragment, SoftFullscreenKernel, SoftGfx, SoftImage, SoftRasterKernel};

use crate::programs::{
    COMPOSITE_PASS, CompositeUniforms, REFLECTION_MISS, SSR_PROGRAM, THIN_GBUFFER_PROGRAM, TRACE_PASS,
    ThinGBufferUniforms, TraceUniforms,
};
use crate::tracing::{self, DepthPyramid, ReflectionRay, SceneDepth, TraceResult, TraceSetup};
use crate::TracingMode;

/// 注册 SSR 主程序和 thin G-buffer 覆盖程序
pub fn register_software_programs(gfx: &mut SoftGfx) -> (GfxProgramHandle, GfxProgramHandle) {
    debug_assert_eq!((TRACE_PASS, COMPOSITE_PASS), (0, 1));
    let passes: Vec<Box<dyn SoftFullscreenKernel>> = vec![Box::new(TraceKernel), Box::new(CompositeKernel)];
    let ssr = gfx.register_fullscreen_program(SSR_PROGRAM, passes);
    let thin = gfx.register_raster_program(THIN_GBUFFER_PROGRAM, Box::new(ThinGBufferKernel));
    (ssr, thin)
}

#[cfg(feature = "profiling")]
fn profiling_span(name: &'static str) -> Option<tracy_client::Span> {
    tracy_client::Client::running().map(|client| client.span_alloc(Some(name), "", file!(), line!(), 0))
}

#[cfg(not(feature = "profiling"))]
#[inline]
fn profiling_span(_name: &'static str) {}

fn read_uniforms<T: bytemuck::Pod>(program: &str, bytes: &[u8]) -> Result<T, GfxError> {
    bytemuck::try_pod_read_unaligned(bytes).map_err(|_| GfxError::UniformSize {
        program: program.to_string(),
        expected: std::mem::size_of::<T>(),
        actual: bytes.len(),
    })
}

fn check_extent(input: &SoftImage, target: &SoftImage) -> Result<(), GfxError> {
    if input.size() != target.size() {
        return Err(GfxError::ExtentMismatch {
            src_width: input.width(),
            src_height: input.height(),
            dst_width: target.width(),
            dst_height: target.height(),
        });
    }
    Ok(())
}

/// thin G-buffer：R = 反射遮罩，G = 物体厚度 / thickness_range
struct ThinGBufferKernel;

impl SoftRasterKernel for ThinGBufferKernel {
    fn uniform_size(&self) -> usize {
        std::mem::size_of::<ThinGBufferUniforms>()
    }

    fn shade(&self, _fragment: &RasterFragment, object_params: Vec4, uniforms: &[u8]) -> Result<Vec4, GfxError> {
        let range = read_uniforms::<ThinGBufferUniforms>(THIN_GBUFFER_PROGRAM, uniforms)?.thickness_range;
        let reflectivity = object_params.x.clamp(0.0, 1.0);
        let thickness = if range > 0.0 { (object_params.y / range).clamp(0.0, 1.0) } else { 0.0 };
        Ok(Vec4::new(reflectivity, thickness, 0.0, 1.0))
    }
}

/// trace pass
///
/// 命中输出 `(u, v, 1, 1)`，未命中输出 `REFLECTION_MISS`。
struct TraceKernel;

impl SoftFullscreenKernel for TraceKernel {
    fn input_count(&self) -> usize {
        3
    }

    fn uniform_size(&self) -> usize {
        std::mem::size_of::<TraceUniforms>()
    }

    fn dispatch(&self, inputs: &[&SoftImage], uniforms: &[u8], target: &mut SoftImage) -> Result<(), GfxError> {
        let _span = profiling_span("TraceKernel::dispatch");
        let uniforms: TraceUniforms = read_uniforms(SSR_PROGRAM, uniforms)?;
        let &[depth, normal, thin] = inputs else {
            return Err(GfxError::TextureCount {
                program: SSR_PROGRAM.to_string(),
                pass: TRACE_PASS,
                expected: 3,
                actual: inputs.len(),
            });
        };
        for input in [depth, normal] {
            check_extent(input, target)?;
        }
        let thin = (uniforms.has_thin_gbuffer != 0).then_some(thin);
        if let Some(thin) = thin {
            check_extent(thin, target)?;
        }

        let mut setup = TraceSetup::from_uniforms(&uniforms);
        setup.size = target.size();
        let scene = SceneDepth::build(&setup, depth, thin);
        let pyramid = (setup.mode == TracingMode::HiZTracing).then(|| DepthPyramid::build(&scene));

        target.par_shade(|pixel: UVec2| {
            let world_normal = normal.load(pixel.x, pixel.y).truncate();
            let Some(ray) = ReflectionRay::for_pixel(&setup, &scene, world_normal, pixel) else {
                return REFLECTION_MISS;
            };
            match tracing::trace(&setup, &scene, pyramid.as_ref(), &ray) {
                TraceResult::Hit { uv, .. } => Vec4::new(uv.x, uv.y, 1.0, 1.0),
                TraceResult::Miss => REFLECTION_MISS,
            }
        });
        Ok(())
    }
}

/// 屏幕边缘淡出：反射 UV 到最近边界的距离小于 `edge_fade` 时平滑衰减到 0
pub fn edge_fade_factor(uv: glam::Vec2, edge_fade: f32) -> f32 {
    if edge_fade <= 0.0 {
        return 1.0;
    }
    let distance = uv.x.min(1.0 - uv.x).min(uv.y).min(1.0 - uv.y).max(0.0);
    let t = (distance / edge_fade).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// composite pass
///
/// 未命中的像素原样输出 ColorCopy；命中时按 `intensity * fade` 向反射颜色插值，保留原 alpha。
struct CompositeKernel;

impl SoftFullscreenKernel for CompositeKernel {
    fn input_count(&self) -> usize {
        2
    }

    fn uniform_size(&self) -> usize {
        std::mem::size_of::<CompositeUniforms>()
    }

    fn dispatch(&self, inputs: &[&SoftImage], uniforms: &[u8], target: &mut SoftImage) -> Result<(), GfxError> {
        let uniforms: CompositeUniforms = read_uniforms(SSR_PROGRAM, uniforms)?;
        let &[color_copy, reflection_map] = inputs else {
            return Err(GfxError::TextureCount {
                program: SSR_PROGRAM.to_string(),
                pass: COMPOSITE_PASS,
                expected: 2,
                actual: inputs.len(),
            });
        };
        check_extent(color_copy, target)?;
        check_extent(reflection_map, target)?;

        target.par_shade(|pixel: UVec2| {
            let original = color_copy.load(pixel.x, pixel.y);
            let reflected = reflection_map.load(pixel.x, pixel.y);
            if reflected.z <= 0.5 {
                return original;
            }

            let uv = glam::Vec2::new(reflected.x, reflected.y);
            let factor = uniforms.intensity * edge_fade_factor(uv, uniforms.edge_fade);
            if factor <= 0.0 {
                return original;
            }
            let color = original.lerp(color_copy.sample_point(uv), factor);
            color.truncate().extend(original.w)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;
    use glam::Vec2;
    use mgssr_render_graph::render_graph::RgImageDesc;

    use super::*;

    fn image(name: &str, format: vk::Format) -> SoftImage {
        SoftImage::new(name, RgImageDesc::new_2d(8, 8, format)).unwrap()
    }

    #[test]
    fn test_edge_fade_factor() {
        assert_eq!(edge_fade_factor(Vec2::new(0.0, 0.5), 0.0), 1.0);
        assert_eq!(edge_fade_factor(Vec2::new(0.5, 0.5), 0.2), 1.0);
        assert_eq!(edge_fade_factor(Vec2::new(0.0, 0.5), 0.2), 0.0);

        // 越靠近边界衰减越多
        let near = edge_fade_factor(Vec2::new(0.02, 0.5), 0.2);
        let far = edge_fade_factor(Vec2::new(0.1, 0.5), 0.2);
        assert!(0.0 < near && near < far && far < 1.0);
        // 距离 >= edge_fade 时不衰减
        assert_eq!(edge_fade_factor(Vec2::new(0.5, 0.25), 0.25), 1.0);
        // edge_fade 超过 0.5 时屏幕中心也被衰减
        assert_eq!(edge_fade_factor(Vec2::splat(0.5), 0.5), 1.0);
        assert_eq!(edge_fade_factor(Vec2::splat(0.5), 1.0), 0.5);
        assert!(edge_fade_factor(Vec2::splat(0.5), 10.0) < 0.01);
    }

    #[test]
    fn test_composite_miss_is_exact_copy() {
        let mut copy = image("copy", vk::Format::R8G8B8A8_UNORM);
        copy.par_shade(|p| Vec4::new(p.x as f32 / 7.0, p.y as f32 / 7.0, 0.3, 1.0));
        let mut map = image("map", vk::Format::R16G16B16A16_SFLOAT);
        map.fill(REFLECTION_MISS);
        map.store(2, 2, Vec4::new(0.9, 0.1, 1.0, 1.0));
        let mut target = image("color", vk::Format::R8G8B8A8_UNORM);
        target.fill(Vec4::ONE);

        let uniforms = CompositeUniforms {
            intensity: 1.0,
            edge_fade: 0.0,
            ..Default::default()
        };
        CompositeKernel.dispatch(&[&copy, &map], bytemuck::bytes_of(&uniforms), &mut target).unwrap();

        for y in 0..8 {
            for x in 0..8 {
                if (x, y) == (2, 2) {
                    assert_eq!(target.load(x, y), copy.sample_point(Vec2::new(0.9, 0.1)));
                } else {
                    assert_eq!(target.load(x, y), copy.load(x, y));
                }
            }
        }
    }

    #[test]
    fn test_composite_zero_intensity_keeps_color() {
        let mut copy = image("copy", vk::Format::R8G8B8A8_UNORM);
        copy.par_shade(|p| Vec4::new(p.x as f32 / 7.0, 0.5, 0.3, 1.0));
        let mut map = image("map", vk::Format::R16G16B16A16_SFLOAT);
        map.fill(Vec4::new(0.5, 0.5, 1.0, 1.0));
        let mut target = image("color", vk::Format::R8G8B8A8_UNORM);

        let uniforms = CompositeUniforms::default();
        CompositeKernel.dispatch(&[&copy, &map], bytemuck::bytes_of(&uniforms), &mut target).unwrap();
        assert_eq!(target.texels(), copy.texels());
    }

    #[test]
    fn test_thin_gbuffer_encoding() {
        let fragment = RasterFragment {
            pixel: UVec2::ZERO,
            depth: 0.5,
            world_position: glam::Vec3::ZERO,
            world_normal: glam::Vec3::Y,
        };
        let uniforms = ThinGBufferUniforms {
            thickness_range: 10.0,
            ..Default::default()
        };
        let texel = ThinGBufferKernel
            .shade(&fragment, Vec4::new(0.8, 2.5, 0.0, 0.0), bytemuck::bytes_of(&uniforms))
            .unwrap();
        assert_eq!(texel, Vec4::new(0.8, 0.25, 0.0, 1.0));

        // uniform 长度不对时报错，不使用默认值
        assert!(matches!(
            ThinGBufferKernel.shade(&fragment, Vec4::ONE, &[0u8; 3]),
            Err(GfxError::UniformSize { expected: 16, actual: 3, .. })
        ));
    }
}
