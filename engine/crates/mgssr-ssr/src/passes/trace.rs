use mgssr_render_graph::gfx::{GfxFullscreenDraw, GfxProgram};
use mgssr_render_graph::render_graph::{RgError, RgImageHandle, RgImageState, RgPass, RgPassBuilder, RgPassContext};

use crate::programs::{THIN_GBUFFER_KEY, TRACE_PASS, TraceUniforms};

/// 逐像素 ray march，输出反射图
///
/// thin G-buffer 在 setup 时按 key 从全局纹理表中查找，没有发布时退化为只用深度。
pub struct ReflectionTracePass {
    program: GfxProgram,
    uniforms: TraceUniforms,

    depth: RgImageHandle,
    normal: RgImageHandle,
    thin_gbuffer: Option<RgImageHandle>,
    reflection_map: RgImageHandle,
}

impl ReflectionTracePass {
    pub fn new(
        program: GfxProgram,
        uniforms: TraceUniforms,
        depth: RgImageHandle,
        normal: RgImageHandle,
        reflection_map: RgImageHandle,
    ) -> Self {
        Self {
            program,
            uniforms,
            depth,
            normal,
            thin_gbuffer: None,
            reflection_map,
        }
    }
}

impl RgPass for ReflectionTracePass {
    fn setup(&mut self, builder: &mut RgPassBuilder) {
        builder.read_image(self.depth, RgImageState::SHADER_READ_FRAGMENT);
        builder.read_image(self.normal, RgImageState::SHADER_READ_FRAGMENT);

        self.thin_gbuffer = builder.global_image(THIN_GBUFFER_KEY);
        if let Some(thin) = self.thin_gbuffer {
            builder.read_image(thin, RgImageState::SHADER_READ_FRAGMENT);
        } else {
            log::debug!("no thin G-buffer published, tracing with global thickness");
        }
        self.uniforms.has_thin_gbuffer = self.thin_gbuffer.is_some() as u32;

        builder.write_image(self.reflection_map, RgImageState::COLOR_ATTACHMENT_WRITE);
    }

    fn execute(&self, ctx: &mut RgPassContext<'_>) -> Result<(), RgError> {
        let depth = ctx.get_image(self.depth)?;
        let normal = ctx.get_image(self.normal)?;
        // 槽位 2 必须绑定，没有 thin G-buffer 时用深度占位
        let thin = match self.thin_gbuffer {
            Some(thin) => ctx.get_image(thin)?,
            None => depth,
        };
        let target = ctx.get_image(self.reflection_map)?;

        ctx.cmd.draw_fullscreen(&GfxFullscreenDraw {
            program: &self.program,
            pass_index: TRACE_PASS,
            textures: &[depth, normal, thin],
            uniforms: bytemuck::bytes_of(&self.uniforms),
            target,
        })?;
        Ok(())
    }
}
