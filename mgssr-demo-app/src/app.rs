use std::path::Path;

use anyhow::Context;
use ash::vk;
use glam::{Mat4, Vec3};
use mgssr_render_graph::gfx::{GfxDevice, GfxImageHandle};
use mgssr_render_graph::render_graph::{RenderGraphBuilder, RgExecuteReport, RgImageDesc, RgImageState};
use mgssr_soft_gfx::{SoftGfx, SoftImage, SoftMesh, SoftOpaqueTargets, SoftScene, SoftSceneObject};
use mgssr_ssr::kernels::register_software_programs;
use mgssr_ssr::{FrameContext, RenderPassEvent, SsrCamera, SsrFeature, SsrFrameOutcome, ValidatedSsrSettings};

const COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;
const NORMAL_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;

/// 一帧的产物
pub struct DemoFrame {
    /// SSR 之前的颜色
    pub scene: SoftImage,
    /// SSR 之后的颜色
    pub ssr: SoftImage,
    pub report: RgExecuteReport,
    pub outcome: SsrFrameOutcome,
}

/// 地面 + 立方体场景
///
/// 扮演宿主：持有相机目标，渲染不透明物体，然后在每个注入点把 SSR 录进 render graph。
pub struct FloorCubeApp {
    gfx: SoftGfx,
    scene: SoftScene,
    camera: SsrCamera,
    width: u32,
    height: u32,

    color: GfxImageHandle,
    depth: GfxImageHandle,
    normal: GfxImageHandle,

    ssr: SsrFeature,
}

// new & init
impl FloorCubeApp {
    pub fn new(settings: ValidatedSsrSettings, width: u32, height: u32) -> anyhow::Result<Self> {
        let mut gfx = SoftGfx::new();
        register_software_programs(&mut gfx);

        let floor = gfx.upload_mesh(SoftMesh::plane(20.0));
        let cube = gfx.upload_mesh(SoftMesh::cube(0.5));
        let mut scene = SoftScene::new();
        scene
            .add(SoftSceneObject::opaque("floor", floor, Mat4::IDENTITY, Vec3::new(0.45, 0.45, 0.5)))
            .add(
                SoftSceneObject::opaque(
                    "cube",
                    cube,
                    Mat4::from_rotation_y(0.4) * Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0)),
                    Vec3::new(0.9, 0.2, 0.1),
                )
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

        let mut create = |name: &str, format: vk::Format| {
            gfx.create_image(name, &RgImageDesc::new_2d(width, height, format))
                .with_context(|| format!("create camera target '{name}'"))
        };
        let color = create("CameraColor", COLOR_FORMAT)?;
        let depth = create("CameraDepth", DEPTH_FORMAT)?;
        let normal = create("CameraNormals", NORMAL_FORMAT)?;

        log::info!("floor + cube scene: {}x{}, {} objects", width, height, scene.objects.len());

        Ok(Self {
            gfx,
            scene,
            camera,
            width,
            height,
            color,
            depth,
            normal,
            ssr: SsrFeature::new(settings),
        })
    }
}

impl FloorCubeApp {
    fn snapshot(&self, handle: GfxImageHandle) -> anyhow::Result<SoftImage> {
        self.gfx.image(handle).cloned().context("camera target missing")
    }

    pub fn render_frame(&mut self) -> anyhow::Result<DemoFrame> {
        let targets = SoftOpaqueTargets {
            color: self.color,
            depth: self.depth,
            normal: self.normal,
        };
        self.gfx
            .render_opaque(&self.scene, self.camera.view, self.camera.projection, targets)
            .context("opaque pass")?;
        let scene = self.snapshot(self.color)?;

        let draw_items = self.scene.draw_items();
        let desc = |format| RgImageDesc::new_2d(self.width, self.height, format);
        let mut builder = RenderGraphBuilder::new();
        let frame = FrameContext {
            camera: self.camera,
            width: self.width,
            height: self.height,
            color_format: COLOR_FORMAT,
            depth: builder.import_image(
                "CameraDepth",
                self.depth,
                desc(DEPTH_FORMAT),
                RgImageState::DEPTH_ATTACHMENT_WRITE,
            ),
            normal: builder.import_image(
                "CameraNormals",
                self.normal,
                desc(NORMAL_FORMAT),
                RgImageState::COLOR_ATTACHMENT_WRITE,
            ),
            color: builder.import_image("CameraColor", self.color, desc(COLOR_FORMAT), RgImageState::COLOR_ATTACHMENT_WRITE),
            draw_items: &draw_items,
        };
        builder.export_image(frame.color, RgImageState::PRESENT);

        let mut ssr_frame = self.ssr.begin_frame(&self.gfx);
        for event in RenderPassEvent::ALL {
            if let Err(err) = ssr_frame.record_event(event, &mut builder, &frame) {
                log::error!("SSR recording at {:?} failed: {}", event, err);
            }
        }

        let graph = builder.compile().context("compile render graph")?;
        if log::log_enabled!(log::Level::Debug) {
            graph.print_execution_plan();
        }
        let report = graph.execute(&mut self.gfx);
        let outcome = ssr_frame.retire(&report)?;

        Ok(DemoFrame {
            scene,
            ssr: self.snapshot(self.color)?,
            report,
            outcome,
        })
    }
}

impl DemoFrame {
    pub fn save(&self, dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(dir).with_context(|| format!("create output dir {:?}", dir))?;
        for (name, image) in [("scene.png", &self.scene), ("ssr.png", &self.ssr)] {
            let path = dir.join(name);
            image.to_rgba8().save(&path).with_context(|| format!("write {:?}", path))?;
            log::info!("saved {:?}", path);
        }
        Ok(())
    }
}
