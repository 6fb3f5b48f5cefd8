use ash::vk;
use mgssr_render_graph::gfx::{
    GfxDepthTest, GfxProgram, GfxRendererListDraw, RenderQueueRange, RendererList, RendererListDesc, SortingCriteria,
};
use mgssr_render_graph::render_graph::{RgError, RgImageHandle, RgImageState, RgPass, RgPassBuilder, RgPassContext};

use crate::frame::FrameContext;
use crate::programs::{THIN_GBUFFER_KEY, THIN_GBUFFER_SHADER_TAGS, THIN_GBUFFER_THICKNESS_RANGE, ThinGBufferUniforms};

/// 用覆盖程序把不透明物体画进 thin G-buffer，并发布到帧内全局纹理表
///
/// 不写深度，只和已有深度做 `LESS_OR_EQUAL` 比较：每个像素只保留可见表面，
/// 与绘制顺序无关。
pub struct ThinGBufferPass {
    program: GfxProgram,
    list: RendererList,
    view: glam::Mat4,
    projection: glam::Mat4,
    uniforms: ThinGBufferUniforms,

    depth: RgImageHandle,
    thin_gbuffer: RgImageHandle,
}

impl ThinGBufferPass {
    pub fn new(program: GfxProgram, frame: &FrameContext<'_>, thin_gbuffer: RgImageHandle) -> Self {
        let list = RendererList::build(
            frame.draw_items,
            &RendererListDesc {
                shader_tags: &THIN_GBUFFER_SHADER_TAGS,
                queue_range: RenderQueueRange::OPAQUE,
                sorting: SortingCriteria::CommonOpaque,
                camera_position: frame.camera.position,
            },
        );
        log::debug!("thin G-buffer renderer list: {} of {} draw items", list.len(), frame.draw_items.len());

        Self {
            program,
            list,
            view: frame.camera.view,
            projection: frame.camera.projection,
            uniforms: ThinGBufferUniforms {
                thickness_range: THIN_GBUFFER_THICKNESS_RANGE,
                ..Default::default()
            },
            depth: frame.depth,
            thin_gbuffer,
        }
    }
}

impl RgPass for ThinGBufferPass {
    fn setup(&mut self, builder: &mut RgPassBuilder) {
        builder.read_image(self.depth, RgImageState::DEPTH_ATTACHMENT_READ_ONLY);
        builder.write_image(self.thin_gbuffer, RgImageState::COLOR_ATTACHMENT_WRITE);
        builder.publish_global(THIN_GBUFFER_KEY, self.thin_gbuffer);
        // 发布的纹理可能被 graph 之外的系统按名字读取
        builder.never_cull();
    }

    fn execute(&self, ctx: &mut RgPassContext<'_>) -> Result<(), RgError> {
        let depth = ctx.get_image(self.depth)?;
        let target = ctx.get_image(self.thin_gbuffer)?;

        ctx.cmd.draw_renderer_list(&GfxRendererListDraw {
            list: &self.list,
            override_program: &self.program,
            view: self.view,
            projection: self.projection,
            uniforms: bytemuck::bytes_of(&self.uniforms),
            depth_test: Some(GfxDepthTest {
                depth,
                compare: vk::CompareOp::LESS_OR_EQUAL,
            }),
            clear: Some(glam::Vec4::ZERO),
            target,
        })?;
        Ok(())
    }
}
