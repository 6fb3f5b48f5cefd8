use mgssr_render_graph::gfx::{GfxFullscreenDraw, GfxProgram};
use mgssr_render_graph::render_graph::{RgError, RgImageHandle, RgImageState, RgPass, RgPassBuilder, RgPassContext};

use crate::programs::{COMPOSITE_PASS, CompositeUniforms};

/// 按反射图从 ColorCopy 采样，混合后写回颜色目标
pub struct CompositePass {
    pub program: GfxProgram,
    pub uniforms: CompositeUniforms,

    pub color_copy: RgImageHandle,
    pub reflection_map: RgImageHandle,
    pub color: RgImageHandle,
}

impl RgPass for CompositePass {
    fn setup(&mut self, builder: &mut RgPassBuilder) {
        builder.read_image(self.reflection_map, RgImageState::SHADER_READ_FRAGMENT);
        builder.read_image(self.color_copy, RgImageState::SHADER_READ_FRAGMENT);
        builder.write_image(self.color, RgImageState::COLOR_ATTACHMENT_WRITE);
    }

    fn execute(&self, ctx: &mut RgPassContext<'_>) -> Result<(), RgError> {
        let color_copy = ctx.get_image(self.color_copy)?;
        let reflection_map = ctx.get_image(self.reflection_map)?;
        let target = ctx.get_image(self.color)?;

        ctx.cmd.draw_fullscreen(&GfxFullscreenDraw {
            program: &self.program,
            pass_index: COMPOSITE_PASS,
            textures: &[color_copy, reflection_map],
            uniforms: bytemuck::bytes_of(&self.uniforms),
            target,
        })?;
        Ok(())
    }
}
