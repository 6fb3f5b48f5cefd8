//! 屏幕空间 ray march（trace 程序的 CPU 实现）
//!
//! 每个像素：从深度重建 view space 位置、从法线图取法线，沿反射方向以固定步长
//! 前进，每一步投影回屏幕与场景深度比较。射线位于表面之后且差值小于厚度时命中，
//! 起点所在的平面不参与命中。
//!
//! 两种模式的命中判定完全相同：
//! - `linear`：逐步检查
//! - `hiz`：借助深度金字塔证明一段步进不可能命中后整段跳过

mod hiz;
mod linear;

pub use hiz::{DepthPyramid, trace_hiz};
pub use linear::trace_linear;

use glam::{Mat4, UVec2, Vec2, Vec3};
use mgssr_render_graph::gfx::screen;
use mgssr_soft_gfx::SoftImage;

use crate::TracingMode;
use crate::programs::TraceUniforms;

/// 判定与起点共面时允许的偏差，按线性深度缩放
const ORIGIN_SURFACE_TOLERANCE: f32 = 1e-3;

/// ray march 参数
#[derive(Clone, Copy, Debug)]
pub struct TraceSetup {
    pub view: Mat4,
    pub projection: Mat4,
    pub inv_projection: Mat4,
    pub size: UVec2,
    pub max_steps: u32,
    pub step_size: f32,
    /// 全局厚度（thin G-buffer 没有给出物体厚度时使用）
    pub thickness: f32,
    pub thin_thickness_range: f32,
    pub mode: TracingMode,
}

impl TraceSetup {
    pub fn from_uniforms(uniforms: &TraceUniforms) -> Self {
        Self {
            view: uniforms.view,
            projection: uniforms.projection,
            inv_projection: uniforms.inv_projection,
            size: uniforms.screen_size.as_uvec2(),
            max_steps: uniforms.num_steps,
            step_size: uniforms.step_size,
            thickness: uniforms.thickness,
            thin_thickness_range: uniforms.thin_thickness_range,
            mode: uniforms.tracing_mode(),
        }
    }
}

/// 逐像素的场景信息
///
/// - `linear`：线性深度（到相机平面的距离），天空为 `f32::INFINITY`
/// - `thickness`：以该像素为被命中表面时的厚度
/// - `reflectivity`：以该像素为射线起点时的反射遮罩
pub struct SceneDepth {
    size: UVec2,
    positions: Vec<Vec3>,
    linear: Vec<f32>,
    thickness: Vec<f32>,
    reflectivity: Vec<f32>,
}

impl SceneDepth {
    /// `thin_gbuffer`：R = 反射遮罩，G = 物体厚度 / `thin_thickness_range`（0 表示使用全局厚度）
    pub fn build(setup: &TraceSetup, depth: &SoftImage, thin_gbuffer: Option<&SoftImage>) -> Self {
        let size = setup.size;
        let count = (size.x * size.y) as usize;
        let mut scene = Self {
            size,
            positions: Vec::with_capacity(count),
            linear: Vec::with_capacity(count),
            thickness: Vec::with_capacity(count),
            reflectivity: Vec::with_capacity(count),
        };

        for y in 0..size.y {
            for x in 0..size.x {
                let pixel = UVec2::new(x, y);
                let d = depth.load(x, y).x;
                if screen::is_sky_depth(d) {
                    scene.positions.push(Vec3::ZERO);
                    scene.linear.push(f32::INFINITY);
                } else {
                    let ndc = screen::uv_to_ndc(screen::pixel_center_uv(pixel, size));
                    let position = setup.inv_projection.project_point3(ndc.extend(d));
                    scene.positions.push(position);
                    scene.linear.push(-position.z);
                }

                let (reflectivity, thickness) = match thin_gbuffer {
                    Some(thin) => {
                        let texel = thin.load(x, y);
                        let thickness =
                            if texel.y > 0.0 { texel.y * setup.thin_thickness_range } else { setup.thickness };
                        (texel.x, thickness)
                    }
                    None => (1.0, setup.thickness),
                };
                scene.reflectivity.push(reflectivity);
                scene.thickness.push(thickness);
            }
        }

        scene
    }
}

// getters
impl SceneDepth {
    #[inline]
    pub fn size(&self) -> UVec2 {
        self.size
    }

    #[inline]
    fn index(&self, pixel: UVec2) -> usize {
        (pixel.y * self.size.x + pixel.x) as usize
    }

    #[inline]
    pub fn linear_depth(&self, pixel: UVec2) -> f32 {
        self.linear[self.index(pixel)]
    }

    #[inline]
    pub fn thickness(&self, pixel: UVec2) -> f32 {
        self.thickness[self.index(pixel)]
    }

    #[inline]
    pub fn is_sky(&self, pixel: UVec2) -> bool {
        self.linear_depth(pixel).is_infinite()
    }

    /// 像素的 view space 位置，天空返回 `None`
    #[inline]
    pub fn view_position(&self, pixel: UVec2) -> Option<Vec3> {
        (!self.is_sky(pixel)).then(|| self.positions[self.index(pixel)])
    }

    #[inline]
    pub fn reflectivity(&self, pixel: UVec2) -> f32 {
        self.reflectivity[self.index(pixel)]
    }
}

/// view space 中的反射射线
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReflectionRay {
    pub origin: Vec3,
    /// 单位向量
    pub direction: Vec3,
    /// 起点所在表面的法线（view space，单位向量）
    pub normal: Vec3,
}

impl ReflectionRay {
    /// 为像素构建反射射线
    ///
    /// 天空、反射遮罩为 0、法线无效（长度过小）的像素没有射线。
    pub fn for_pixel(setup: &TraceSetup, scene: &SceneDepth, world_normal: Vec3, pixel: UVec2) -> Option<Self> {
        let origin = scene.view_position(pixel)?;
        if scene.reflectivity(pixel) <= 0.0 || world_normal.length_squared() < 0.25 {
            return None;
        }

        let normal = setup.view.transform_vector3(world_normal).normalize();
        let incident = origin.normalize();
        let direction = (incident - 2.0 * incident.dot(normal) * normal).normalize();
        direction.is_finite().then_some(Self {
            origin,
            direction,
            normal,
        })
    }

    /// 第 `step` 步的位置，第 0 步即起点
    #[inline]
    pub fn march_point(&self, setup: &TraceSetup, step: u32) -> Vec3 {
        self.origin + self.direction * (setup.step_size * step as f32)
    }

    /// `position` 是否落在起点所在的切平面上
    ///
    /// 反射射线离开切平面后不会再回到这个平面，平面上的像素只能是射线自身所在的表面。
    #[inline]
    pub fn is_on_origin_surface(&self, position: Vec3) -> bool {
        let tolerance = ORIGIN_SURFACE_TOLERANCE * (-position.z).max(1.0);
        (position - self.origin).dot(self.normal).abs() <= tolerance
    }
}

/// 一次 ray march 的结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TraceResult {
    /// `uv` 为命中像素的中心，`step` 为命中的步数（从 1 开始）
    Hit { uv: Vec2, step: u32 },
    Miss,
}

impl TraceResult {
    #[inline]
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }
}

/// 单步检查的结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum StepOutcome {
    Hit(UVec2),
    /// 射线离开屏幕或到了相机后面，之后不可能再命中
    Exit,
    Continue,
}

/// 射线上一点投影到屏幕
pub(crate) struct ScreenPoint {
    /// 连续像素坐标（`uv * size`）
    pub texel: Vec2,
    pub pixel: UVec2,
    /// 线性深度
    pub depth: f32,
}

pub(crate) fn project(setup: &TraceSetup, point: Vec3) -> Option<ScreenPoint> {
    let clip = setup.projection * point.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let uv = screen::ndc_to_uv(Vec2::new(clip.x, clip.y) / clip.w);
    let pixel = screen::uv_to_pixel(uv, setup.size)?;
    Some(ScreenPoint {
        texel: uv * setup.size.as_vec2(),
        pixel,
        depth: -point.z,
    })
}

/// 检查第 `step` 步
pub(crate) fn check_step(setup: &TraceSetup, scene: &SceneDepth, ray: &ReflectionRay, step: u32) -> StepOutcome {
    let Some(point) = project(setup, ray.march_point(setup, step)) else {
        return StepOutcome::Exit;
    };
    let scene_depth = scene.linear_depth(point.pixel);
    if scene_depth.is_infinite() {
        return StepOutcome::Continue;
    }

    let behind = point.depth - scene_depth;
    if behind <= 0.0 || behind >= scene.thickness(point.pixel) {
        return StepOutcome::Continue;
    }
    // 起点像素以及同一平面上的邻居不算命中
    match scene.view_position(point.pixel) {
        Some(surface) if !ray.is_on_origin_surface(surface) => StepOutcome::Hit(point.pixel),
        _ => StepOutcome::Continue,
    }
}

/// 按 `setup.mode` 选择 ray march 方式
pub fn trace(
    setup: &TraceSetup,
    scene: &SceneDepth,
    pyramid: Option<&DepthPyramid>,
    ray: &ReflectionRay,
) -> TraceResult {
    match (setup.mode, pyramid) {
        (TracingMode::HiZTracing, Some(pyramid)) => trace_hiz(setup, scene, pyramid, ray),
        _ => trace_linear(setup, scene, ray),
    }
}

pub(crate) fn hit_result(setup: &TraceSetup, pixel: UVec2, step: u32) -> TraceResult {
    TraceResult::Hit {
        uv: screen::pixel_center_uv(pixel, setup.size),
        step,
    }
}
