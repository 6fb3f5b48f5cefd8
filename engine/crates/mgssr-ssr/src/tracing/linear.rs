use crate::tracing::{ReflectionRay, SceneDepth, StepOutcome, TraceResult, TraceSetup, check_step, hit_result};

/// 固定步长逐步检查
///
/// 第 `i` 步位于 `origin + direction * step_size * i`，`i` 从 1 到 `max_steps`。
/// 增加 `max_steps` 只会延长同一条路径，因此命中率不会下降。
pub fn trace_linear(setup: &TraceSetup, scene: &SceneDepth, ray: &ReflectionRay) -> TraceResult {
    for step in 1..=setup.max_steps {
        match check_step(setup, scene, ray, step) {
            StepOutcome::Hit(pixel) => return hit_result(setup, pixel, step),
            StepOutcome::Exit => return TraceResult::Miss,
            StepOutcome::Continue => {}
        }
    }
    TraceResult::Miss
}

#[cfg(test)]
mod tests {
    use glam::{UVec2, Vec3};
    use mgssr_render_graph::gfx::screen;

    use super::*;
    use crate::TracingMode;
    use crate::tracing::test_scene::*;

    /// 地面 y = -1，正前方 z = -6 处一面朝向相机的墙
    fn floor_and_wall() -> [(Vec3, Vec3); 2] {
        [(Vec3::new(0.0, -1.0, 0.0), Vec3::Y), (Vec3::new(0.0, 0.0, -6.0), Vec3::Z)]
    }

    #[test]
    fn test_floor_reflects_wall() {
        let setup = setup(TracingMode::LinearTracing, 200, 0.05, 0.2);
        let (depth, normal) = render_planes(&setup, &floor_and_wall());
        let scene = SceneDepth::build(&setup, &depth, None);

        let pixel = UVec2::new(WIDTH / 2, HEIGHT - 10);
        let n = normal.load(pixel.x, pixel.y).truncate();
        let ray = ReflectionRay::for_pixel(&setup, &scene, n, pixel).unwrap();
        assert!(ray.direction.y > 0.0);

        let TraceResult::Hit { uv, step } = trace_linear(&setup, &scene, &ray) else {
            panic!("floor should reflect the wall");
        };
        assert!(step >= 1);
        let hit_pixel = screen::uv_to_pixel(uv, setup.size).unwrap();
        // 命中的是墙
        let wall_depth = scene.linear_depth(hit_pixel);
        assert!((wall_depth - 6.0).abs() < 0.05, "hit depth {wall_depth}");
        // 镜像点在墙上，位于地面像素的正上方
        assert_eq!(hit_pixel.x, pixel.x);
        assert!(hit_pixel.y < pixel.y);
    }

    #[test]
    fn test_open_sky_misses() {
        let setup = setup(TracingMode::LinearTracing, 200, 0.05, 0.2);
        let (depth, normal) = render_planes(&setup, &[(Vec3::new(0.0, -1.0, 0.0), Vec3::Y)]);
        let scene = SceneDepth::build(&setup, &depth, None);

        let pixel = UVec2::new(WIDTH / 2, HEIGHT - 10);
        let n = normal.load(pixel.x, pixel.y).truncate();
        let ray = ReflectionRay::for_pixel(&setup, &scene, n, pixel).unwrap();
        assert_eq!(trace_linear(&setup, &scene, &ray), TraceResult::Miss);
    }

    #[test]
    fn test_too_few_steps_miss() {
        let setup = setup(TracingMode::LinearTracing, 3, 0.05, 0.2);
        let (depth, normal) = render_planes(&setup, &floor_and_wall());
        let scene = SceneDepth::build(&setup, &depth, None);

        let pixel = UVec2::new(WIDTH / 2, HEIGHT - 10);
        let n = normal.load(pixel.x, pixel.y).truncate();
        let ray = ReflectionRay::for_pixel(&setup, &scene, n, pixel).unwrap();
        assert_eq!(trace_linear(&setup, &scene, &ray), TraceResult::Miss);
    }
}
