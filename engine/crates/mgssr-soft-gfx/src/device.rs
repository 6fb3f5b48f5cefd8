use std::collections::HashMap;

use ash::vk;
use mgssr_render_graph::gfx::{
    GfxCommandEncoder, GfxDepthTest, GfxDevice, GfxError, GfxFullscreenDraw, GfxImageBarrier, GfxImageHandle,
    GfxMeshHandle, GfxProgram, GfxProgramHandle, GfxProgramLibrary, GfxRendererListDraw,
};
use mgssr_render_graph::render_graph::RgImageDesc;
use slotmap::SlotMap;

use crate::program::check_uniform_size;
use crate::raster::rasterize_mesh;
use crate::{SoftFullscreenKernel, SoftImage, SoftMesh, SoftProgram, SoftRasterKernel};

/// 命令日志
#[derive(Clone, Debug, PartialEq)]
pub enum SoftCommand {
    CreateImage { name: String },
    DestroyImage { name: String },
    Barrier { image: String, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout },
    BeginLabel(String),
    EndLabel,
    Copy { src: String, dst: String },
    DrawRendererList { program: String, draws: usize, target: String },
    DrawFullscreen { program: String, pass: u32, target: String },
}

/// CPU 参考后端
///
/// 命令在录制时立即执行。
#[derive(Default)]
pub struct SoftGfx {
    images: SlotMap<GfxImageHandle, SoftImage>,
    meshes: SlotMap<GfxMeshHandle, SoftMesh>,
    programs: SlotMap<GfxProgramHandle, (String, SoftProgram)>,
    program_names: HashMap<String, GfxProgramHandle>,

    /// 模拟设备不支持的格式
    unsupported_formats: Vec<vk::Format>,

    commands: Vec<SoftCommand>,
    label_depth: usize,
}

// new & init
impl SoftGfx {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让后续的 `create_image` 对该格式返回 `UnsupportedFormat`
    pub fn disable_format(&mut self, format: vk::Format) {
        self.unsupported_formats.push(format);
    }
}

// programs & meshes
impl SoftGfx {
    pub fn register_fullscreen_program(
        &mut self,
        name: impl Into<String>,
        passes: Vec<Box<dyn SoftFullscreenKernel>>,
    ) -> GfxProgramHandle {
        self.register_program(name.into(), SoftProgram::Fullscreen(passes))
    }

    pub fn register_raster_program(&mut self, name: impl Into<String>, kernel: Box<dyn SoftRasterKernel>) -> GfxProgramHandle {
        self.register_program(name.into(), SoftProgram::Raster(kernel))
    }

    fn register_program(&mut self, name: String, program: SoftProgram) -> GfxProgramHandle {
        if let Some(old) = self.program_names.get(&name).copied() {
            log::warn!("program '{}' re-registered, the old one is replaced", name);
            self.programs.remove(old);
        }
        let handle = self.programs.insert((name.clone(), program));
        log::debug!("program '{}' registered", name);
        self.program_names.insert(name, handle);
        handle
    }

    pub fn upload_mesh(&mut self, mesh: SoftMesh) -> GfxMeshHandle {
        self.meshes.insert(mesh)
    }

    #[inline]
    pub fn mesh(&self, handle: GfxMeshHandle) -> Option<&SoftMesh> {
        self.meshes.get(handle)
    }
}

// images & commands
impl SoftGfx {
    #[inline]
    pub fn image(&self, handle: GfxImageHandle) -> Option<&SoftImage> {
        self.images.get(handle)
    }

    #[inline]
    pub fn image_mut(&mut self, handle: GfxImageHandle) -> Option<&mut SoftImage> {
        self.images.get_mut(handle)
    }

    #[inline]
    pub fn live_image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn commands(&self) -> &[SoftCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<SoftCommand> {
        std::mem::take(&mut self.commands)
    }

    pub(crate) fn record(&mut self, command: SoftCommand) {
        self.commands.push(command);
    }

    fn image_name(&self, handle: GfxImageHandle) -> String {
        self.images.get(handle).map(|i| i.name().to_string()).unwrap_or_else(|| format!("{:?}", handle))
    }

    fn program_entry(&self, program: &GfxProgram) -> Result<&(String, SoftProgram), GfxError> {
        self.programs.get(program.handle()).ok_or_else(|| GfxError::ProgramNotFound(program.name().to_string()))
    }

    /// 把 target 暂时移出图像表，使其可以和输入图像同时借用
    pub(crate) fn take_target(&mut self, handle: GfxImageHandle) -> Result<SoftImage, GfxError> {
        self.images.get_mut(handle).map(std::mem::take).ok_or(GfxError::ImageNotFound(handle))
    }

    pub(crate) fn restore_target(&mut self, handle: GfxImageHandle, image: SoftImage) {
        if let Some(slot) = self.images.get_mut(handle) {
            *slot = image;
        }
    }
}

fn depth_test_passes(compare: vk::CompareOp, fragment: f32, stored: f32) -> bool {
    match compare {
        vk::CompareOp::NEVER => false,
        vk::CompareOp::LESS => fragment < stored,
        vk::CompareOp::EQUAL => fragment == stored,
        vk::CompareOp::LESS_OR_EQUAL => fragment <= stored,
        vk::CompareOp::GREATER => fragment > stored,
        vk::CompareOp::NOT_EQUAL => fragment != stored,
        vk::CompareOp::GREATER_OR_EQUAL => fragment >= stored,
        _ => true,
    }
}

impl GfxCommandEncoder for SoftGfx {
    fn image_barriers(&mut self, barriers: &[GfxImageBarrier]) {
        for barrier in barriers {
            let image = self.image_name(barrier.image);
            self.record(SoftCommand::Barrier {
                image,
                old_layout: barrier.old_layout,
                new_layout: barrier.new_layout,
            });
        }
    }

    fn begin_label(&mut self, name: &str) {
        self.label_depth += 1;
        self.record(SoftCommand::BeginLabel(name.to_string()));
    }

    fn end_label(&mut self) {
        self.label_depth = self.label_depth.saturating_sub(1);
        self.record(SoftCommand::EndLabel);
    }

    fn copy_image(&mut self, src: GfxImageHandle, dst: GfxImageHandle) -> Result<(), GfxError> {
        if src == dst {
            return Err(GfxError::FeedbackLoop(dst));
        }
        let mut target = self.take_target(dst)?;
        let result = match self.images.get(src) {
            Some(source) => target.copy_from(source),
            None => Err(GfxError::ImageNotFound(src)),
        };
        self.restore_target(dst, target);
        result?;

        let (src, dst) = (self.image_name(src), self.image_name(dst));
        self.record(SoftCommand::Copy { src, dst });
        Ok(())
    }

    fn draw_renderer_list(&mut self, draw: &GfxRendererListDraw<'_>) -> Result<(), GfxError> {
        let (name, program) = self.program_entry(draw.override_program)?;
        let SoftProgram::Raster(kernel) = program else {
            return Err(GfxError::ProgramKindMismatch(name.clone()));
        };
        check_uniform_size(name, kernel.uniform_size(), draw.uniforms.len())?;
        if let Some(GfxDepthTest { depth, .. }) = draw.depth_test {
            if depth == draw.target {
                return Err(GfxError::FeedbackLoop(depth));
            }
        }

        let mut target = self.take_target(draw.target)?;
        let result = self.rasterize_list(draw, &mut target);
        self.restore_target(draw.target, target);
        result?;

        let (program, target) = (draw.override_program.name().to_string(), self.image_name(draw.target));
        self.record(SoftCommand::DrawRendererList {
            program,
            draws: draw.list.len(),
            target,
        });
        Ok(())
    }

    fn draw_fullscreen(&mut self, draw: &GfxFullscreenDraw<'_>) -> Result<(), GfxError> {
        let (name, program) = self.program_entry(draw.program)?;
        let SoftProgram::Fullscreen(passes) = program else {
            return Err(GfxError::ProgramKindMismatch(name.clone()));
        };
        let kernel = passes.get(draw.pass_index as usize).ok_or_else(|| GfxError::InvalidProgramPass {
            program: name.clone(),
            pass: draw.pass_index,
        })?;
        if kernel.input_count() != draw.textures.len() {
            return Err(GfxError::TextureCount {
                program: name.clone(),
                pass: draw.pass_index,
                expected: kernel.input_count(),
                actual: draw.textures.len(),
            });
        }
        check_uniform_size(name, kernel.uniform_size(), draw.uniforms.len())?;
        if draw.textures.contains(&draw.target) {
            return Err(GfxError::FeedbackLoop(draw.target));
        }

        let mut target = self.take_target(draw.target)?;
        let result = self.dispatch_fullscreen(draw, &mut target);
        self.restore_target(draw.target, target);
        result?;

        let target = self.image_name(draw.target);
        self.record(SoftCommand::DrawFullscreen {
            program: draw.program.name().to_string(),
            pass: draw.pass_index,
            target,
        });
        Ok(())
    }
}

impl SoftGfx {
    fn dispatch_fullscreen(&self, draw: &GfxFullscreenDraw<'_>, target: &mut SoftImage) -> Result<(), GfxError> {
        let (name, SoftProgram::Fullscreen(passes)) = self.program_entry(draw.program)? else {
            return Err(GfxError::ProgramKindMismatch(draw.program.name().to_string()));
        };
        let kernel = passes.get(draw.pass_index as usize).ok_or_else(|| GfxError::InvalidProgramPass {
            program: name.clone(),
            pass: draw.pass_index,
        })?;
        let inputs = draw
            .textures
            .iter()
            .map(|&h| self.images.get(h).ok_or(GfxError::ImageNotFound(h)))
            .collect::<Result<Vec<_>, _>>()?;
        kernel.dispatch(&inputs, draw.uniforms, target)
    }

    fn rasterize_list(&self, draw: &GfxRendererListDraw<'_>, target: &mut SoftImage) -> Result<(), GfxError> {
        let (_, SoftProgram::Raster(kernel)) = self.program_entry(draw.override_program)? else {
            return Err(GfxError::ProgramKindMismatch(draw.override_program.name().to_string()));
        };
        let depth = match draw.depth_test {
            Some(test) => {
                let image = self.images.get(test.depth).ok_or(GfxError::ImageNotFound(test.depth))?;
                if image.size() != target.size() {
                    return Err(GfxError::ExtentMismatch {
                        src_width: image.width(),
                        src_height: image.height(),
                        dst_width: target.width(),
                        dst_height: target.height(),
                    });
                }
                Some((image, test.compare))
            }
            None => None,
        };

        if let Some(clear) = draw.clear {
            target.fill(clear);
        }

        let view_projection = draw.projection * draw.view;
        let size = target.size();
        let mut failure = None;
        for item in draw.list.iter() {
            let mesh = self.meshes.get(item.mesh).ok_or(GfxError::MeshNotFound(item.mesh))?;
            rasterize_mesh(mesh, item.model, view_projection, size, |fragment| {
                if failure.is_some() {
                    return;
                }
                if let Some((depth, compare)) = depth {
                    let stored = depth.load(fragment.pixel.x, fragment.pixel.y).x;
                    if !depth_test_passes(compare, fragment.depth, stored) {
                        return;
                    }
                }
                match kernel.shade(fragment, item.object_params, draw.uniforms) {
                    Ok(color) => target.store(fragment.pixel.x, fragment.pixel.y, color),
                    Err(err) => failure = Some(err),
                }
            });
            if let Some(err) = failure.take() {
                return Err(err);
            }
        }
        Ok(())
    }
}

impl GfxDevice for SoftGfx {
    fn create_image(&mut self, name: &str, desc: &RgImageDesc) -> Result<GfxImageHandle, GfxError> {
        if self.unsupported_formats.contains(&desc.format) {
            return Err(GfxError::UnsupportedFormat {
                name: name.to_string(),
                format: desc.format,
            });
        }
        let image = SoftImage::new(name, desc.clone())?;
        self.record(SoftCommand::CreateImage { name: name.to_string() });
        Ok(self.images.insert(image))
    }

    fn destroy_image(&mut self, image: GfxImageHandle) {
        if let Some(image) = self.images.remove(image) {
            self.record(SoftCommand::DestroyImage {
                name: image.name().to_string(),
            });
        }
    }

    fn as_encoder(&mut self) -> &mut dyn GfxCommandEncoder {
        self
    }
}

impl GfxProgramLibrary for SoftGfx {
    fn find_program(&self, name: &str) -> Option<GfxProgram> {
        let handle = *self.program_names.get(name)?;
        let (name, program) = self.programs.get(handle)?;
        Some(GfxProgram::new(handle, name.clone(), program.pass_count()))
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, UVec2, Vec3, Vec4, vec3};
    use mgssr_render_graph::gfx::{RenderQueueRange, RendererList, RendererListDesc, ShaderTagId, SortingCriteria};

    use super::*;
    use crate::{RasterFragment, SoftOpaqueTargets, SoftScene, SoftSceneObject};

    struct FillKernel(Vec4);

    impl SoftFullscreenKernel for FillKernel {
        fn input_count(&self) -> usize {
            0
        }
        fn uniform_size(&self) -> usize {
            0
        }
        fn dispatch(&self, _inputs: &[&SoftImage], _uniforms: &[u8], target: &mut SoftImage) -> Result<(), GfxError> {
            target.par_shade(|_| self.0);
            Ok(())
        }
    }

    struct PassThroughKernel;

    impl SoftFullscreenKernel for PassThroughKernel {
        fn input_count(&self) -> usize {
            1
        }
        fn uniform_size(&self) -> usize {
            4
        }
        fn dispatch(&self, inputs: &[&SoftImage], _uniforms: &[u8], target: &mut SoftImage) -> Result<(), GfxError> {
            target.par_shade(|p| inputs[0].load(p.x, p.y));
            Ok(())
        }
    }

    /// 输出物体参数，便于检查哪个物体通过了深度测试
    struct ParamsKernel;

    impl SoftRasterKernel for ParamsKernel {
        fn uniform_size(&self) -> usize {
            0
        }
        fn shade(&self, _fragment: &RasterFragment, object_params: Vec4, _uniforms: &[u8]) -> Result<Vec4, GfxError> {
            Ok(object_params)
        }
    }

    fn desc(format: vk::Format) -> RgImageDesc {
        RgImageDesc::new_2d(32, 24, format)
    }

    #[test]
    fn test_programs_are_found_by_name() {
        let mut gfx = SoftGfx::new();
        gfx.register_fullscreen_program("Test/Fill", vec![Box::new(FillKernel(Vec4::ONE)), Box::new(PassThroughKernel)]);

        let program = gfx.find_program("Test/Fill").unwrap();
        assert_eq!(program.name(), "Test/Fill");
        assert_eq!(program.pass_count(), 2);
        assert!(gfx.find_program("Test/Missing").is_none());
    }

    #[test]
    fn test_disabled_format_fails_allocation() {
        let mut gfx = SoftGfx::new();
        gfx.disable_format(vk::Format::R16G16B16A16_SFLOAT);

        let result = gfx.create_image("reflection", &desc(vk::Format::R16G16B16A16_SFLOAT));
        assert!(matches!(result, Err(GfxError::UnsupportedFormat { .. })));
        assert!(gfx.create_image("ok", &desc(vk::Format::R8G8B8A8_UNORM)).is_ok());
        assert_eq!(gfx.live_image_count(), 1);
    }

    #[test]
    fn test_fullscreen_validation() {
        let mut gfx = SoftGfx::new();
        gfx.register_fullscreen_program("Test/Copy", vec![Box::new(PassThroughKernel)]);
        let program = gfx.find_program("Test/Copy").unwrap();
        let a = gfx.create_image("a", &desc(vk::Format::R32G32B32A32_SFLOAT)).unwrap();
        let b = gfx.create_image("b", &desc(vk::Format::R32G32B32A32_SFLOAT)).unwrap();
        let uniforms = [0u8; 4];

        let feedback = GfxFullscreenDraw {
            program: &program,
            pass_index: 0,
            textures: &[a],
            uniforms: &uniforms,
            target: a,
        };
        assert_eq!(gfx.draw_fullscreen(&feedback), Err(GfxError::FeedbackLoop(a)));

        let wrong_uniforms = GfxFullscreenDraw {
            program: &program,
            pass_index: 0,
            textures: &[a],
            uniforms: &[],
            target: b,
        };
        assert!(matches!(gfx.draw_fullscreen(&wrong_uniforms), Err(GfxError::UniformSize { .. })));

        let wrong_pass = GfxFullscreenDraw {
            program: &program,
            pass_index: 1,
            textures: &[a],
            uniforms: &uniforms,
            target: b,
        };
        assert!(matches!(gfx.draw_fullscreen(&wrong_pass), Err(GfxError::InvalidProgramPass { .. })));

        let wrong_inputs = GfxFullscreenDraw {
            program: &program,
            pass_index: 0,
            textures: &[],
            uniforms: &uniforms,
            target: b,
        };
        assert!(matches!(gfx.draw_fullscreen(&wrong_inputs), Err(GfxError::TextureCount { .. })));

        gfx.image_mut(a).unwrap().fill(Vec4::new(0.25, 0.5, 0.75, 1.0));
        let ok = GfxFullscreenDraw {
            program: &program,
            pass_index: 0,
            textures: &[a],
            uniforms: &uniforms,
            target: b,
        };
        gfx.draw_fullscreen(&ok).unwrap();
        assert_eq!(gfx.image(b).unwrap().load(5, 5), Vec4::new(0.25, 0.5, 0.75, 1.0));
        assert_eq!(
            gfx.commands().last(),
            Some(&SoftCommand::DrawFullscreen {
                program: "Test/Copy".to_string(),
                pass: 0,
                target: "b".to_string(),
            })
        );
    }

    #[test]
    fn test_copy_image() {
        let mut gfx = SoftGfx::new();
        let src = gfx.create_image("src", &desc(vk::Format::R16G16B16A16_SFLOAT)).unwrap();
        let dst = gfx.create_image("dst", &desc(vk::Format::R8G8B8A8_UNORM)).unwrap();
        gfx.image_mut(src).unwrap().fill(Vec4::new(1.5, 0.5, -1.0, 1.0));

        assert_eq!(gfx.copy_image(src, src), Err(GfxError::FeedbackLoop(src)));
        gfx.copy_image(src, dst).unwrap();
        // 按目标格式量化
        assert_eq!(gfx.image(dst).unwrap().load(0, 0), Vec4::new(1.0, 128.0 / 255.0, 0.0, 1.0));
    }

    #[test]
    fn test_renderer_list_depth_test_keeps_front_surface() {
        let mut gfx = SoftGfx::new();
        gfx.register_raster_program("Test/Params", Box::new(ParamsKernel));
        let plane = gfx.upload_mesh(SoftMesh::plane(1.0));

        let size = UVec2::new(32, 24);
        let projection = Mat4::perspective_rh(60f32.to_radians(), size.x as f32 / size.y as f32, 0.1, 50.0);
        let view = Mat4::look_at_rh(vec3(0.0, 3.0, 0.0), Vec3::ZERO, Vec3::NEG_Z);

        // 两块平行的板：near 在上方（离相机更近）
        let near = SoftSceneObject::opaque("near", plane, Mat4::from_translation(vec3(0.0, 1.0, 0.0)), Vec3::ONE)
            .with_reflectivity(0.25);
        let far = SoftSceneObject::opaque("far", plane, Mat4::IDENTITY, Vec3::ONE).with_reflectivity(0.75);
        let mut scene = SoftScene::new();
        scene.add(near).add(far);

        let targets = SoftOpaqueTargets {
            color: gfx.create_image("color", &desc(vk::Format::R8G8B8A8_UNORM)).unwrap(),
            depth: gfx.create_image("depth", &desc(vk::Format::D32_SFLOAT)).unwrap(),
            normal: gfx.create_image("normal", &desc(vk::Format::R16G16B16A16_SFLOAT)).unwrap(),
        };
        gfx.render_opaque(&scene, view, projection, targets).unwrap();

        let items = scene.draw_items();
        let tags = [ShaderTagId("UniversalForward")];
        let list = RendererList::build(
            &items,
            &RendererListDesc {
                shader_tags: &tags,
                queue_range: RenderQueueRange::OPAQUE,
                sorting: SortingCriteria::None,
                camera_position: vec3(0.0, 3.0, 0.0),
            },
        );
        assert_eq!(list.len(), 2);

        let target = gfx.create_image("params", &desc(vk::Format::R16G16_UNORM)).unwrap();
        let program = gfx.find_program("Test/Params").unwrap();
        gfx.draw_renderer_list(&GfxRendererListDraw {
            list: &list,
            override_program: &program,
            view,
            projection,
            uniforms: &[],
            depth_test: Some(GfxDepthTest {
                depth: targets.depth,
                compare: vk::CompareOp::LESS_OR_EQUAL,
            }),
            clear: Some(Vec4::ZERO),
            target,
        })
        .unwrap();

        // 中心像素只能看到 near 板，尽管 far 板后画
        let center = gfx.image(target).unwrap().load(16, 12);
        assert!((center.x - 0.25).abs() < 1e-4);
        // 角落是天空，被清空为 0
        assert_eq!(gfx.image(target).unwrap().load(0, 0).x, 0.0);

        // 覆盖程序不能用于全屏绘制
        let misuse = GfxFullscreenDraw {
            program: &program,
            pass_index: 0,
            textures: &[],
            uniforms: &[],
            target,
        };
        assert_eq!(gfx.draw_fullscreen(&misuse), Err(GfxError::ProgramKindMismatch("Test/Params".to_string())));
    }
}
