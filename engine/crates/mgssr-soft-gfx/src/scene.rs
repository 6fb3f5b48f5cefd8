//! 测试和 demo 使用的小场景
//!
//! 这里扮演“宿主渲染框架”：持有物体、生成 draw item，
//! 并在 SSR 之前渲染不透明物体的深度、世界空间法线和光照颜色。

use ash::vk;
use glam::{Mat4, Vec3, Vec4};
use mgssr_render_graph::gfx::{DrawItem, GfxError, GfxImageHandle, GfxMeshHandle, ShaderTagId, screen};

use crate::SoftGfx;
use crate::device::SoftCommand;
use crate::raster::rasterize_mesh;

/// 场景中的一个物体
#[derive(Clone, Debug)]
pub struct SoftSceneObject {
    pub name: String,
    pub mesh: GfxMeshHandle,
    pub model: Mat4,
    pub base_color: Vec3,
    /// 反射强度遮罩，0 表示不反射
    pub reflectivity: f32,
    /// 物体厚度，0 表示使用全局厚度
    pub thickness: f32,
    pub render_queue: u32,
    pub shader_tag: ShaderTagId,
}

impl SoftSceneObject {
    pub fn opaque(name: impl Into<String>, mesh: GfxMeshHandle, model: Mat4, base_color: Vec3) -> Self {
        Self {
            name: name.into(),
            mesh,
            model,
            base_color,
            reflectivity: 1.0,
            thickness: 0.0,
            render_queue: 2000,
            shader_tag: ShaderTagId("UniversalForward"),
        }
    }

    pub fn with_reflectivity(mut self, reflectivity: f32) -> Self {
        self.reflectivity = reflectivity;
        self
    }

    pub fn with_thickness(mut self, thickness: f32) -> Self {
        self.thickness = thickness;
        self
    }
}

#[derive(Clone, Debug)]
pub struct SoftScene {
    pub objects: Vec<SoftSceneObject>,
    /// 指向光源的方向
    pub light_direction: Vec3,
    pub ambient: f32,
    pub sky_color: Vec3,
}

impl Default for SoftScene {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            light_direction: Vec3::new(0.3, 1.0, 0.5).normalize(),
            ambient: 0.25,
            sky_color: Vec3::new(0.05, 0.05, 0.08),
        }
    }
}

impl SoftScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: SoftSceneObject) -> &mut Self {
        self.objects.push(object);
        self
    }

    /// 宿主的“裁剪结果”，object_params = (reflectivity, thickness, 0, 0)
    pub fn draw_items(&self) -> Vec<DrawItem> {
        self.objects
            .iter()
            .map(|o| DrawItem {
                mesh: o.mesh,
                model: o.model,
                render_queue: o.render_queue,
                shader_tag: o.shader_tag,
                object_params: Vec4::new(o.reflectivity, o.thickness, 0.0, 0.0),
            })
            .collect()
    }

    fn shade(&self, object: &SoftSceneObject, normal: Vec3) -> Vec4 {
        let diffuse = normal.dot(self.light_direction).max(0.0);
        (object.base_color * (self.ambient + (1.0 - self.ambient) * diffuse)).extend(1.0)
    }
}

/// 不透明 pass 的输出
#[derive(Clone, Copy, Debug)]
pub struct SoftOpaqueTargets {
    /// 光照颜色
    pub color: GfxImageHandle,
    /// D32_SFLOAT，清空为 1.0
    pub depth: GfxImageHandle,
    /// 世界空间法线
    pub normal: GfxImageHandle,
}

impl SoftGfx {
    /// 宿主的不透明 pass（同时输出深度和法线）
    pub fn render_opaque(
        &mut self,
        scene: &SoftScene,
        view: Mat4,
        projection: Mat4,
        targets: SoftOpaqueTargets,
    ) -> Result<(), GfxError> {
        let SoftOpaqueTargets { color, depth, normal } = targets;
        if color == depth || color == normal || depth == normal {
            return Err(GfxError::FeedbackLoop(depth));
        }

        let mut color_image = self.take_target(color)?;
        let mut depth_image = match self.take_target(depth) {
            Ok(image) => image,
            Err(err) => {
                self.restore_target(color, color_image);
                return Err(err);
            }
        };
        let mut normal_image = match self.take_target(normal) {
            Ok(image) => image,
            Err(err) => {
                self.restore_target(color, color_image);
                self.restore_target(depth, depth_image);
                return Err(err);
            }
        };

        let result = (|| -> Result<(), GfxError> {
            if depth_image.format() != vk::Format::D32_SFLOAT {
                return Err(GfxError::UnsupportedFormat {
                    name: depth_image.name().to_string(),
                    format: depth_image.format(),
                });
            }
            let size = color_image.size();
            for image in [&depth_image, &normal_image] {
                if image.size() != size {
                    return Err(GfxError::ExtentMismatch {
                        src_width: image.width(),
                        src_height: image.height(),
                        dst_width: size.x,
                        dst_height: size.y,
                    });
                }
            }

            color_image.fill(scene.sky_color.extend(1.0));
            depth_image.fill(Vec4::splat(screen::FAR_DEPTH));
            normal_image.fill(Vec4::ZERO);

            let view_projection = projection * view;
            for object in &scene.objects {
                let mesh = self.mesh(object.mesh).ok_or(GfxError::MeshNotFound(object.mesh))?;
                rasterize_mesh(mesh, object.model, view_projection, size, |fragment| {
                    let (x, y) = (fragment.pixel.x, fragment.pixel.y);
                    if fragment.depth >= depth_image.load(x, y).x {
                        return;
                    }
                    depth_image.store(x, y, Vec4::splat(fragment.depth));
                    normal_image.store(x, y, fragment.world_normal.extend(1.0));
                    color_image.store(x, y, scene.shade(object, fragment.world_normal));
                });
            }
            Ok(())
        })();

        self.restore_target(color, color_image);
        self.restore_target(depth, depth_image);
        self.restore_target(normal, normal_image);
        result?;

        self.record(SoftCommand::DrawRendererList {
            program: "HostOpaque".to_string(),
            draws: scene.objects.len(),
            target: self.image(color).map(|i| i.name().to_string()).unwrap_or_default(),
        });
        Ok(())
    }
}
