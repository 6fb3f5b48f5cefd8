use mgssr_render_graph::render_graph::{RgError, RgImageHandle, RgImageState, RgPass, RgPassBuilder, RgPassContext};

/// 在 composite 覆盖颜色目标之前保存一份拷贝
pub struct CopyColorPass {
    pub src: RgImageHandle,
    pub dst: RgImageHandle,
}

impl RgPass for CopyColorPass {
    fn setup(&mut self, builder: &mut RgPassBuilder) {
        builder.read_image(self.src, RgImageState::TRANSFER_SRC);
        builder.write_image(self.dst, RgImageState::TRANSFER_DST);
        builder.never_cull();
    }

    fn execute(&self, ctx: &mut RgPassContext<'_>) -> Result<(), RgError> {
        let src = ctx.get_image(self.src)?;
        let dst = ctx.get_image(self.dst)?;
        ctx.cmd.copy_image(src, dst)?;
        Ok(())
    }
}
