//! 三角形光栅化
//!
//! - 只裁剪近平面（clip.z >= 0），其余方向由屏幕包围盒截断
//! - 像素中心采样，深度在屏幕空间线性插值，其余属性透视校正
//! - 不做背面剔除，遮挡交给深度测试

use glam::{Mat3, Mat4, UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};
use mgssr_render_graph::gfx::screen;

use crate::SoftMesh;

/// 光栅化得到的片元
#[derive(Clone, Copy, Debug)]
pub struct RasterFragment {
    pub pixel: UVec2,
    /// NDC 深度，[0, 1)
    pub depth: f32,
    pub world_position: Vec3,
    pub world_normal: Vec3,
}

#[derive(Clone, Copy)]
struct ClipVertex {
    clip: Vec4,
    world: Vec3,
    normal: Vec3,
}

impl ClipVertex {
    fn lerp(a: &Self, b: &Self, t: f32) -> Self {
        Self {
            clip: a.clip.lerp(b.clip, t),
            world: a.world.lerp(b.world, t),
            normal: a.normal.lerp(b.normal, t),
        }
    }
}

/// 光栅化整个 mesh
///
/// `view_projection` 必须由调用方以 `projection * view` 的形式给出，
/// 不同 pass 对同一物体得到逐位相同的深度依赖于这一点。
pub fn rasterize_mesh(
    mesh: &SoftMesh,
    model: Mat4,
    view_projection: Mat4,
    size: UVec2,
    mut emit: impl FnMut(&RasterFragment),
) {
    let normal_matrix = Mat3::from_mat4(model).inverse().transpose();

    for [a, b, c] in mesh.triangles() {
        let vertex = |i: usize| {
            let world = model.transform_point3(mesh.positions[i]);
            ClipVertex {
                clip: view_projection * world.extend(1.0),
                world,
                normal: normal_matrix * mesh.normals[i],
            }
        };
        let polygon = clip_near([vertex(a), vertex(b), vertex(c)]);

        // 扇形三角化
        for i in 1..polygon.len().saturating_sub(1) {
            rasterize_triangle([&polygon[0], &polygon[i], &polygon[i + 1]], size, &mut emit);
        }
    }
}

/// Sutherland–Hodgman 裁剪近平面
fn clip_near(triangle: [ClipVertex; 3]) -> Vec<ClipVertex> {
    let mut out = Vec::with_capacity(4);
    for i in 0..3 {
        let cur = &triangle[i];
        let next = &triangle[(i + 1) % 3];
        let (dc, dn) = (cur.clip.z, next.clip.z);

        if dc >= 0.0 {
            out.push(*cur);
        }
        if (dc >= 0.0) != (dn >= 0.0) {
            out.push(ClipVertex::lerp(cur, next, dc / (dc - dn)));
        }
    }
    out
}

#[inline]
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn rasterize_triangle(tri: [&ClipVertex; 3], size: UVec2, emit: &mut impl FnMut(&RasterFragment)) {
    if tri.iter().any(|v| v.clip.w <= 0.0) {
        return;
    }

    let size_f = size.as_vec2();
    let inv_w = tri.map(|v| 1.0 / v.clip.w);
    let ndc = [0, 1, 2].map(|i| tri[i].clip.xyz() * inv_w[i]);
    let screen_pos = ndc.map(|p| screen::ndc_to_uv(p.truncate()) * size_f);

    let area = edge(screen_pos[0], screen_pos[1], screen_pos[2]);
    if area.abs() < 1e-12 {
        return;
    }

    let min = screen_pos[0].min(screen_pos[1]).min(screen_pos[2]).floor().max(Vec2::ZERO);
    let max = screen_pos[0].max(screen_pos[1]).max(screen_pos[2]).ceil().min(size_f);
    if min.x >= max.x || min.y >= max.y {
        return;
    }

    for y in min.y as u32..max.y as u32 {
        for x in min.x as u32..max.x as u32 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w = [
                edge(screen_pos[1], screen_pos[2], p),
                edge(screen_pos[2], screen_pos[0], p),
                edge(screen_pos[0], screen_pos[1], p),
            ];
            let inside = if area > 0.0 { w.iter().all(|&e| e >= 0.0) } else { w.iter().all(|&e| e <= 0.0) };
            if !inside {
                continue;
            }

            let b = w.map(|e| e / area);
            let depth = b[0] * ndc[0].z + b[1] * ndc[1].z + b[2] * ndc[2].z;
            if !(0.0..screen::FAR_DEPTH).contains(&depth) {
                continue;
            }

            // 透视校正
            let pw = [b[0] * inv_w[0], b[1] * inv_w[1], b[2] * inv_w[2]];
            let sum = pw[0] + pw[1] + pw[2];
            let world_position = (tri[0].world * pw[0] + tri[1].world * pw[1] + tri[2].world * pw[2]) / sum;
            let world_normal =
                ((tri[0].normal * pw[0] + tri[1].normal * pw[1] + tri[2].normal * pw[2]) / sum).normalize_or_zero();

            emit(&RasterFragment {
                pixel: UVec2::new(x, y),
                depth,
                world_position,
                world_normal,
            });
        }
    }
}
