//! SSR feature 与单帧录制状态机
//!
//! ```text
//! Idle -> GBufferRecorded -> TraceRecorded -> CompositeRecorded -> Retired
//! ```
//!
//! `SsrFeature` 跨帧存在，只缓存校验过的参数和已解析的程序；
//! `SsrFrame` 每帧新建，执行完 graph 之后 `retire`。

use mgssr_render_graph::gfx::GfxProgramLibrary;
use mgssr_render_graph::render_graph::{RenderGraphBuilder, RgExecuteReport, RgImageDesc, RgImageHandle};

use crate::frame::FrameContext;
use crate::passes::{
    COLOR_COPY_IMAGE_NAME, COMPOSITE_PASS_NAME, COPY_COLOR_PASS_NAME, CompositePass, CopyColorPass,
    REFLECTION_MAP_IMAGE_NAME, ReflectionTracePass, THIN_GBUFFER_IMAGE_NAME, THIN_GBUFFER_PASS_NAME,
    TRACE_PASS_NAME, ThinGBufferPass,
};
use crate::programs::{CompositeUniforms, REFLECTION_MAP_FORMAT, SsrPrograms, THIN_GBUFFER_FORMAT, TraceUniforms};
use crate::{RenderPassEvent, SsrError, SsrSettings, ValidatedSsrSettings};

/// SSR 的所有 pass 名字
pub const SSR_PASS_NAMES: [&str; 4] = [THIN_GBUFFER_PASS_NAME, COPY_COLOR_PASS_NAME, TRACE_PASS_NAME, COMPOSITE_PASS_NAME];

/// 跨帧的 SSR feature
pub struct SsrFeature {
    settings: ValidatedSsrSettings,
    programs: Option<SsrPrograms>,
}

// new & init
impl SsrFeature {
    pub fn new(settings: ValidatedSsrSettings) -> Self {
        Self {
            settings,
            programs: None,
        }
    }
}

// getters
impl SsrFeature {
    #[inline]
    pub fn settings(&self) -> &SsrSettings {
        &self.settings
    }

    /// 程序是否已经解析成功
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.programs.is_some()
    }
}

impl SsrFeature {
    /// 开始一帧
    ///
    /// 程序尚未解析时在这里重试；失败则本帧不录制任何 SSR pass，颜色目标保持原样。
    pub fn begin_frame(&mut self, library: &dyn GfxProgramLibrary) -> SsrFrame {
        if self.programs.is_none() {
            match SsrPrograms::resolve(library) {
                Ok(programs) => {
                    log::info!("SSR programs resolved");
                    self.programs = Some(programs);
                }
                Err(err) => log::error!("{err}; SSR disabled for this frame"),
            }
        }

        SsrFrame {
            settings: (*self.settings).clone(),
            programs: self.programs.clone(),
            state: SsrFrameState::Idle,
            thin_gbuffer: None,
        }
    }
}

/// 单帧的录制阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SsrFrameState {
    Idle,
    GBufferRecorded,
    TraceRecorded,
    CompositeRecorded,
    Retired,
}

/// 一帧执行之后 SSR 的结果
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SsrFrameOutcome {
    /// composite 是否执行，即颜色目标中是否有反射
    pub applied: bool,
    /// 执行时被跳过的 SSR pass
    pub skipped: Vec<String>,
}

/// 单帧录制
///
/// 只负责把 pass 加入 render graph；执行由宿主在所有 pass 录制完之后进行。
pub struct SsrFrame {
    settings: SsrSettings,
    /// `None` 表示本帧禁用
    programs: Option<SsrPrograms>,
    state: SsrFrameState,
    thin_gbuffer: Option<RgImageHandle>,
}

// getters
impl SsrFrame {
    #[inline]
    pub fn state(&self) -> SsrFrameState {
        self.state
    }

    /// 本帧是否会录制 SSR pass
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.programs.is_some()
    }

    #[inline]
    pub fn thin_gbuffer(&self) -> Option<RgImageHandle> {
        self.thin_gbuffer
    }
}

impl SsrFrame {
    fn advance(&mut self, from: SsrFrameState, to: SsrFrameState) -> Result<(), SsrError> {
        if self.state != from {
            return Err(SsrError::InvalidTransition { from: self.state, to });
        }
        self.state = to;
        Ok(())
    }

    /// 本帧可用的程序；视口无效时禁用本帧并返回错误
    fn active_programs(&mut self, frame: &FrameContext<'_>) -> Result<Option<SsrPrograms>, SsrError> {
        if self.programs.is_none() {
            return Ok(None);
        }
        if let Err(err) = frame.check_viewport() {
            log::warn!("{err}; SSR disabled for this frame");
            self.programs = None;
            return Err(err);
        }
        Ok(self.programs.clone())
    }

    /// 录制 thin G-buffer pass（`AfterRenderingOpaques`）
    pub fn record_thin_gbuffer(
        &mut self,
        builder: &mut RenderGraphBuilder<'_>,
        frame: &FrameContext<'_>,
    ) -> Result<(), SsrError> {
        self.advance(SsrFrameState::Idle, SsrFrameState::GBufferRecorded)?;
        let Some(programs) = self.active_programs(frame)? else {
            return Ok(());
        };

        let thin_gbuffer = builder.create_image(
            THIN_GBUFFER_IMAGE_NAME,
            RgImageDesc::new_2d(frame.width, frame.height, THIN_GBUFFER_FORMAT),
        );
        builder.add_pass(THIN_GBUFFER_PASS_NAME, ThinGBufferPass::new(programs.thin_gbuffer, frame, thin_gbuffer));
        self.thin_gbuffer = Some(thin_gbuffer);
        Ok(())
    }

    /// 录制 trace pass，输出反射图
    pub fn record_trace(
        &mut self,
        builder: &mut RenderGraphBuilder<'_>,
        frame: &FrameContext<'_>,
    ) -> Result<Option<RgImageHandle>, SsrError> {
        self.advance(SsrFrameState::GBufferRecorded, SsrFrameState::TraceRecorded)?;
        let Some(programs) = self.active_programs(frame)? else {
            return Ok(None);
        };

        let reflection_map = builder.create_image(
            REFLECTION_MAP_IMAGE_NAME,
            RgImageDesc::new_2d(frame.width, frame.height, REFLECTION_MAP_FORMAT),
        );
        let uniforms = TraceUniforms::new(&self.settings, &frame.camera, frame.width, frame.height);
        builder.add_pass(
            TRACE_PASS_NAME,
            ReflectionTracePass::new(programs.ssr, uniforms, frame.depth, frame.normal, reflection_map),
        );
        Ok(Some(reflection_map))
    }

    /// 录制 CopyColor 和 composite pass
    pub fn record_composite(
        &mut self,
        builder: &mut RenderGraphBuilder<'_>,
        frame: &FrameContext<'_>,
        reflection_map: Option<RgImageHandle>,
    ) -> Result<(), SsrError> {
        self.advance(SsrFrameState::TraceRecorded, SsrFrameState::CompositeRecorded)?;
        let Some(programs) = self.active_programs(frame)? else {
            return Ok(());
        };
        let Some(reflection_map) = reflection_map else {
            log::warn!("SSR composite recorded without a reflection map; skipped");
            return Ok(());
        };

        let color_copy = builder.create_image(
            COLOR_COPY_IMAGE_NAME,
            RgImageDesc::new_2d(frame.width, frame.height, frame.color_format),
        );
        builder.add_pass(
            COPY_COLOR_PASS_NAME,
            CopyColorPass {
                src: frame.color,
                dst: color_copy,
            },
        );
        builder.add_pass(
            COMPOSITE_PASS_NAME,
            CompositePass {
                program: programs.ssr,
                uniforms: CompositeUniforms {
                    intensity: self.settings.intensity,
                    edge_fade: self.settings.edge_fade,
                    ..Default::default()
                },
                color_copy,
                reflection_map,
                color: frame.color,
            },
        );
        Ok(())
    }

    /// 宿主在每个注入点调用
    ///
    /// `AfterRenderingOpaques` 录制 thin G-buffer，`injection_point` 录制 trace 和 composite；
    /// 两者相同时先录制 thin G-buffer。
    pub fn record_event(
        &mut self,
        event: RenderPassEvent,
        builder: &mut RenderGraphBuilder<'_>,
        frame: &FrameContext<'_>,
    ) -> Result<(), SsrError> {
        if event == RenderPassEvent::THIN_GBUFFER {
            self.record_thin_gbuffer(builder, frame)?;
        }
        if event == self.settings.injection_point {
            let reflection_map = self.record_trace(builder, frame)?;
            self.record_composite(builder, frame, reflection_map)?;
        }
        Ok(())
    }

    /// graph 执行之后结束本帧
    pub fn retire(&mut self, report: &RgExecuteReport) -> Result<SsrFrameOutcome, SsrError> {
        self.advance(SsrFrameState::CompositeRecorded, SsrFrameState::Retired)?;

        let skipped = report
            .skipped
            .iter()
            .filter(|s| SSR_PASS_NAMES.contains(&s.name.as_str()))
            .map(|s| {
                log::warn!("SSR pass '{}' skipped: {}", s.name, s.reason);
                s.name.clone()
            })
            .collect();

        Ok(SsrFrameOutcome {
            applied: self.programs.is_some() && report.was_executed(COMPOSITE_PASS_NAME),
            skipped,
        })
    }
}
