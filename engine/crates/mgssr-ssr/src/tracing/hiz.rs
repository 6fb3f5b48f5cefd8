use glam::{UVec2, Vec2};
use itertools::iproduct;

use crate::tracing::{
    ReflectionRay, SceneDepth, StepOutcome, TraceResult, TraceSetup, check_step, hit_result, project,
};

/// 最高层级（tile 边长 2^8 像素）
const MAX_LEVEL: usize = 8;

/// 端点距离 tile 边界的最小像素距离
const TILE_MARGIN: f32 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq)]
struct DepthTile {
    /// 非天空像素的最小线性深度，全是天空时为 +inf
    min: f32,
    /// 非天空像素的最大线性深度，全是天空时为 -inf
    max: f32,
    /// 最大厚度
    max_thickness: f32,
}

impl DepthTile {
    const EMPTY: Self = Self {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
        max_thickness: 0.0,
    };

    fn merge(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            max_thickness: self.max_thickness.max(other.max_thickness),
        }
    }
}

/// 线性深度的 min/max 金字塔
///
/// 第 `k` 层的一个 tile 覆盖 `2^k x 2^k` 个像素；天空像素不参与统计，
/// 因为射线经过天空永远不会命中。
pub struct DepthPyramid {
    levels: Vec<(UVec2, Vec<DepthTile>)>,
}

impl DepthPyramid {
    pub fn build(scene: &SceneDepth) -> Self {
        let size = scene.size();
        let mut base = Vec::with_capacity((size.x * size.y) as usize);
        for (y, x) in iproduct!(0..size.y, 0..size.x) {
            let pixel = UVec2::new(x, y);
            base.push(if scene.is_sky(pixel) {
                DepthTile::EMPTY
            } else {
                let depth = scene.linear_depth(pixel);
                DepthTile {
                    min: depth,
                    max: depth,
                    max_thickness: scene.thickness(pixel),
                }
            });
        }

        let mut levels = vec![(size, base)];
        while levels.len() <= MAX_LEVEL {
            let (prev_size, prev) = &levels[levels.len() - 1];
            if prev_size.x <= 1 && prev_size.y <= 1 {
                break;
            }
            let next_size = (*prev_size + UVec2::ONE) / 2;
            let mut next = vec![DepthTile::EMPTY; (next_size.x * next_size.y) as usize];
            for (y, x) in iproduct!(0..prev_size.y, 0..prev_size.x) {
                let dst = ((y / 2) * next_size.x + x / 2) as usize;
                next[dst] = next[dst].merge(prev[(y * prev_size.x + x) as usize]);
            }
            levels.push((next_size, next));
        }

        Self { levels }
    }

    #[inline]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    fn tile(&self, level: usize, pixel: UVec2) -> DepthTile {
        let (size, tiles) = &self.levels[level];
        let t = UVec2::new(pixel.x >> level, pixel.y >> level);
        tiles[(t.y * size.x + t.x) as usize]
    }
}

/// 连续像素坐标所在的 tile，距离 tile 边界不足 `TILE_MARGIN` 时返回 `None`
fn tile_of(texel: Vec2, level: usize) -> Option<UVec2> {
    let extent = (1u32 << level) as f32;
    let tile = (texel / extent).floor();
    let lo = tile * extent;
    let hi = lo + Vec2::splat(extent);
    let inside = texel.cmpge(lo + Vec2::splat(TILE_MARGIN)).all() && texel.cmple(hi - Vec2::splat(TILE_MARGIN)).all();
    inside.then(|| tile.as_uvec2())
}

/// 第 `first..=last` 步能否整段跳过
///
/// 射线段在 view space 是直线，两端都在屏幕内且在相机前方时整段投影是一条线段，
/// 两端落在同一个 tile 中则整段都在这个 tile 内；
/// 再根据 tile 的深度范围证明每一步都不满足命中条件。
fn can_skip(
    setup: &TraceSetup,
    pyramid: &DepthPyramid,
    ray: &ReflectionRay,
    first: u32,
    last: u32,
    level: usize,
) -> bool {
    let (Some(a), Some(b)) = (
        project(setup, ray.march_point(setup, first)),
        project(setup, ray.march_point(setup, last)),
    ) else {
        return false;
    };
    let (Some(tile_a), Some(tile_b)) = (tile_of(a.texel, level), tile_of(b.texel, level)) else {
        return false;
    };
    if tile_a != tile_b {
        return false;
    }

    let tile = pyramid.tile(level, a.pixel);
    if tile.min > tile.max {
        // 全是天空
        return true;
    }
    let (ray_min, ray_max) = (a.depth.min(b.depth), a.depth.max(b.depth));
    // 射线整段在所有表面之前
    let in_front = tile.min >= ray_max + 1e-5 * ray_max.max(1.0);
    // 射线整段在所有表面之后，并且超出厚度
    let beyond = tile.max < ray_min - tile.max_thickness * 1.001 - 1e-5 * ray_min.max(1.0);
    in_front || beyond
}

/// 分层 ray march
///
/// 在第 `k` 层尝试一次跳过 `2^k` 步：成功则前进并上升一层，失败则下降一层；
/// 第 0 层与线性步进做完全相同的检查，因此命中的步数与 `trace_linear` 一致。
pub fn trace_hiz(setup: &TraceSetup, scene: &SceneDepth, pyramid: &DepthPyramid, ray: &ReflectionRay) -> TraceResult {
    let top = pyramid.level_count().saturating_sub(1);
    let mut step = 1;
    let mut level = 0;

    while step <= setup.max_steps {
        if level > 0 {
            let last = (step + (1 << level) - 1).min(setup.max_steps);
            if can_skip(setup, pyramid, ray, step, last, level) {
                step = last + 1;
                level = (level + 1).min(top);
            } else {
                level -= 1;
            }
            continue;
        }

        match check_step(setup, scene, ray, step) {
            StepOutcome::Hit(pixel) => return hit_result(setup, pixel, step),
            StepOutcome::Exit => return TraceResult::Miss,
            StepOutcome::Continue => {}
        }
        step += 1;
        level = top.min(1);
    }

    TraceResult::Miss
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::TracingMode;
    use crate::tracing::test_scene::*;
    use crate::tracing::trace_linear;

    #[test]
    fn test_pyramid_levels_and_sky() {
        let setup = setup(TracingMode::HiZTracing, 16, 0.1, 0.1);
        let (depth, _normal) = render_planes(&setup, &[(Vec3::new(0.0, -1.0, 0.0), Vec3::Y)]);
        let scene = SceneDepth::build(&setup, &depth, None);
        let pyramid = DepthPyramid::build(&scene);

        // 64x48 -> 32x24 -> ... -> 1x1
        assert_eq!(pyramid.level_count(), 7);
        // 顶部一行全是天空
        assert_eq!(pyramid.tile(2, UVec2::new(0, 0)), DepthTile::EMPTY);
        // 最高层包含整个地面
        let top = pyramid.tile(pyramid.level_count() - 1, UVec2::ZERO);
        assert!(top.min < top.max);
        assert!(top.min > 0.0);
    }

    #[test]
    fn test_tile_margin() {
        assert_eq!(tile_of(Vec2::new(4.5, 4.5), 2), Some(UVec2::new(1, 1)));
        assert_eq!(tile_of(Vec2::new(4.0, 4.5), 2), None);
        assert_eq!(tile_of(Vec2::new(7.9999, 4.5), 2), None);
    }

    /// 随机平面场景中两种模式的结果一致
    #[test]
    fn test_hiz_matches_linear_on_random_scenes() {
        let mut rng = StdRng::seed_from_u64(0x55A2);

        for _ in 0..6 {
            let floor_y = rng.gen_range(-2.0..-0.5);
            let wall_z = rng.gen_range(-12.0..-3.0);
            let side_x = rng.gen_range(2.0..6.0);
            let planes = [
                (Vec3::new(0.0, floor_y, 0.0), Vec3::Y),
                (Vec3::new(0.0, 0.0, wall_z), Vec3::Z),
                (Vec3::new(side_x, 0.0, 0.0), Vec3::NEG_X),
            ];
            let max_steps = rng.gen_range(8..160);
            let step_size = rng.gen_range(0.02..0.3);
            let thickness = rng.gen_range(0.05..0.5);

            let linear_setup = setup(TracingMode::LinearTracing, max_steps, step_size, thickness);
            let hiz_setup = TraceSetup {
                mode: TracingMode::HiZTracing,
                ..linear_setup
            };
            let (depth, normal) = render_planes(&linear_setup, &planes);
            let scene = SceneDepth::build(&linear_setup, &depth, None);
            let pyramid = DepthPyramid::build(&scene);

            for y in 0..HEIGHT {
                for x in 0..WIDTH {
                    let pixel = UVec2::new(x, y);
                    let n = normal.load(x, y).truncate();
                    let Some(ray) = ReflectionRay::for_pixel(&linear_setup, &scene, n, pixel) else {
                        continue;
                    };
                    let linear = trace_linear(&linear_setup, &scene, &ray);
                    let hiz = trace_hiz(&hiz_setup, &scene, &pyramid, &ray);
                    assert_eq!(linear.is_hit(), hiz.is_hit(), "pixel {pixel}");
                    if let (TraceResult::Hit { uv: a, .. }, TraceResult::Hit { uv: b, .. }) = (linear, hiz) {
                        let texel = 1.0 / linear_setup.size.as_vec2();
                        assert!((a - b).abs().cmple(texel * 1.01).all(), "pixel {pixel}: {a} vs {b}");
                    }
                }
            }
        }
    }
}
