use glam::{Vec3, vec3};

/// 三角形网格（CPU 端）
///
/// 每个顶点带自己的法线，立方体等硬边物体按面拆分顶点。
#[derive(Clone, Debug, Default)]
pub struct SoftMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
}

// new & init
impl SoftMesh {
    /// XZ 平面上的正方形，中心在原点，法线 +Y
    pub fn plane(half_extent: f32) -> Self {
        let e = half_extent;
        Self {
            positions: vec![vec3(-e, 0.0, -e), vec3(e, 0.0, -e), vec3(e, 0.0, e), vec3(-e, 0.0, e)],
            normals: vec![Vec3::Y; 4],
            indices: vec![0, 2, 1, 0, 3, 2],
        }
    }

    /// 中心在原点的立方体
    pub fn cube(half_extent: f32) -> Self {
        let mut mesh = Self::default();
        for normal in [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z] {
            // 面上两个切线方向
            let tangent = if normal.y.abs() > 0.5 { Vec3::X } else { Vec3::Y };
            let bitangent = normal.cross(tangent);

            let base = mesh.positions.len() as u32;
            for (s, t) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                mesh.positions.push((normal + tangent * s + bitangent * t) * half_extent);
                mesh.normals.push(normal);
            }
            mesh.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }
}

impl SoftMesh {
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// 逐三角形迭代顶点索引
    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
    }
}
