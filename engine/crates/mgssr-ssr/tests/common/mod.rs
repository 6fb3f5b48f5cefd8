//! 地面 + 立方体的测试场景

#![allow(dead_code)]

use ash::vk;
use glam::{Mat4, UVec2, Vec3, Vec4};
use mgssr_render_graph::gfx::{GfxDevice, GfxImageHandle, screen};
use mgssr_render_graph::render_graph::{RenderGraphBuilder, RgExecuteReport, RgImageDesc, RgImageState};
use mgssr_soft_gfx::{SoftGfx, SoftImage, SoftMesh, SoftOpaqueTargets, SoftScene, SoftSceneObject};
use mgssr_ssr::kernels::register_software_programs;
use mgssr_ssr::programs::REFLECTION_MAP_FORMAT;
use mgssr_ssr::{FrameContext, RenderPassEvent, SsrCamera, SsrFeature, SsrFrameOutcome, SsrSettings};

pub const FLOOR_COLOR: Vec3 = Vec3::new(0.5, 0.5, 0.5);
pub const CUBE_COLOR: Vec3 = Vec3::new(0.9, 0.1, 0.1);

/// 立方体正面的中心
pub const CUBE_FRONT_CENTER: Vec3 = Vec3::new(0.0, 0.5, 0.5);

pub struct TestScene {
    pub gfx: SoftGfx,
    pub scene: SoftScene,
    pub camera: SsrCamera,
    pub width: u32,
    pub height: u32,
    pub color: GfxImageHandle,
    pub depth: GfxImageHandle,
    pub normal: GfxImageHandle,
}

pub struct SsrRun {
    pub report: RgExecuteReport,
    pub outcome: SsrFrameOutcome,
    /// SSR 之前的颜色
    pub scene_color: SoftImage,
    pub depth: SoftImage,
    /// SSR 之后的颜色
    pub color: SoftImage,
    pub reflection_map: Option<SoftImage>,
}

impl TestScene {
    /// y = 0 的地面，上面放一个边长 1 的红色立方体；相机从斜上方看向立方体
    pub fn floor_and_cube(width: u32, height: u32) -> Self {
        Self::floor_and_cube_with(width, height, true)
    }

    /// `register_programs` 为 false 时后端找不到 SSR 程序
    pub fn floor_and_cube_with(width: u32, height: u32, register_programs: bool) -> Self {
        let mut gfx = SoftGfx::new();
        if register_programs {
            register_software_programs(&mut gfx);
        }

        let floor = gfx.upload_mesh(SoftMesh::plane(20.0));
        let cube = gfx.upload_mesh(SoftMesh::cube(0.5));
        let mut scene = SoftScene::new();
        scene
            .add(SoftSceneObject::opaque("floor", floor, Mat4::IDENTITY, FLOOR_COLOR))
            .add(
                SoftSceneObject::opaque("cube", cube, Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0)), CUBE_COLOR)
                    .with_reflectivity(0.0)
                    .with_thickness(1.0),
            );

        let camera = SsrCamera::look_at(
            Vec3::new(0.0, 1.5, 4.0),
            Vec3::new(0.0, 0.4, 0.0),
            Vec3::Y,
            60f32.to_radians(),
            width as f32 / height as f32,
            0.1,
            100.0,
        );

        let mut create = |name: &str, format| {
            gfx.create_image(name, &RgImageDesc::new_2d(width, height, format)).unwrap()
        };
        let color = create("CameraColor", vk::Format::R8G8B8A8_UNORM);
        let depth = create("CameraDepth", vk::Format::D32_SFLOAT);
        let normal = create("CameraNormals", vk::Format::R16G16B16A16_SFLOAT);

        Self {
            gfx,
            scene,
            camera,
            width,
            height,
            color,
            depth,
            normal,
        }
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    /// 世界空间点所在的像素
    pub fn project(&self, world: Vec3) -> UVec2 {
        let ndc = self.camera.view_projection().project_point3(world);
        screen::uv_to_pixel(screen::ndc_to_uv(glam::Vec2::new(ndc.x, ndc.y)), self.size()).unwrap()
    }

    fn image(&self, handle: GfxImageHandle) -> SoftImage {
        self.gfx.image(handle).unwrap().clone()
    }

    /// 渲染不透明物体，然后按注入点录制并执行 SSR
    ///
    /// `readback` 为 true 时把反射图拷贝到宿主图像，便于检查。
    pub fn run(&mut self, settings: SsrSettings, readback: bool) -> SsrRun {
        let targets = SoftOpaqueTargets {
            color: self.color,
            depth: self.depth,
            normal: self.normal,
        };
        self.gfx.render_opaque(&self.scene, self.camera.view, self.camera.projection, targets).unwrap();
        let scene_color = self.image(self.color);

        let readback_image = readback.then(|| {
            let desc = RgImageDesc::new_2d(self.width, self.height, REFLECTION_MAP_FORMAT);
            (self.gfx.create_image("ReflectionReadback", &desc).unwrap(), desc)
        });

        let readback_handle = readback_image.as_ref().map(|(handle, _)| *handle);

        let draw_items = self.scene.draw_items();
        let mut builder = RenderGraphBuilder::new();
        let color_desc = RgImageDesc::new_2d(self.width, self.height, vk::Format::R8G8B8A8_UNORM);
        let frame = FrameContext {
            camera: self.camera,
            width: self.width,
            height: self.height,
            color_format: vk::Format::R8G8B8A8_UNORM,
            depth: builder.import_image(
                "CameraDepth",
                self.depth,
                RgImageDesc::new_2d(self.width, self.height, vk::Format::D32_SFLOAT),
                RgImageState::DEPTH_ATTACHMENT_WRITE,
            ),
            normal: builder.import_image(
                "CameraNormals",
                self.normal,
                RgImageDesc::new_2d(self.width, self.height, vk::Format::R16G16B16A16_SFLOAT),
                RgImageState::COLOR_ATTACHMENT_WRITE,
            ),
            color: builder.import_image("CameraColor", self.color, color_desc, RgImageState::COLOR_ATTACHMENT_WRITE),
            draw_items: &draw_items,
        };
        builder.export_image(frame.color, RgImageState::PRESENT);

        let mut feature = SsrFeature::new(settings.validate().unwrap());
        let mut ssr = feature.begin_frame(&self.gfx);
        ssr.record_event(RenderPassEvent::AfterRenderingOpaques, &mut builder, &frame).unwrap();
        let reflection_map = ssr.record_trace(&mut builder, &frame).unwrap();

        if let (Some((host, desc)), Some(map)) = (readback_image, reflection_map) {
            let host = builder.import_image("ReflectionReadback", host, desc, RgImageState::UNDEFINED);
            builder.add_pass_lambda(
                "ReadbackReflectionMap",
                move |b| {
                    b.read_image(map, RgImageState::TRANSFER_SRC);
                    b.write_image(host, RgImageState::TRANSFER_DST);
                },
                move |ctx| {
                    let (src, dst) = (ctx.get_image(map)?, ctx.get_image(host)?);
                    ctx.cmd.copy_image(src, dst)?;
                    Ok(())
                },
            );
        }
        ssr.record_composite(&mut builder, &frame, reflection_map).unwrap();

        let graph = builder.compile().unwrap();
        let report = graph.execute(&mut self.gfx);
        let outcome = ssr.retire(&report).unwrap();

        SsrRun {
            report,
            outcome,
            scene_color,
            depth: self.image(self.depth),
            color: self.image(self.color),
            reflection_map: readback_handle.map(|handle| self.image(handle)),
        }
    }
}

pub fn is_miss(texel: Vec4) -> bool {
    texel.z <= 0.5
}

pub fn assert_color_close(actual: Vec4, expected: Vec4, context: &str) {
    let diff = (actual - expected).abs().max_element();
    assert!(diff <= 1.5 / 255.0, "{context}: {actual} vs {expected}");
}
