use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::SsrError;

/// 屏幕空间 ray march 的方式
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TracingMode {
    /// 固定步长线性步进
    LinearTracing = 0,
    /// 借助 min/max 深度金字塔跳过不可能命中的区间，命中结果与线性步进一致
    #[default]
    HiZTracing = 1,
}

/// pass 注入点
///
/// 数值越小越早执行，比较大小即比较先后。
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RenderPassEvent {
    BeforeRendering = 0,
    BeforeRenderingShadows = 50,
    AfterRenderingShadows = 100,
    BeforeRenderingPrePasses = 150,
    AfterRenderingPrePasses = 200,
    BeforeRenderingGbuffer = 210,
    AfterRenderingGbuffer = 220,
    BeforeRenderingDeferredLights = 230,
    AfterRenderingDeferredLights = 240,
    BeforeRenderingOpaques = 250,
    AfterRenderingOpaques = 300,
    BeforeRenderingSkybox = 350,
    AfterRenderingSkybox = 400,
    BeforeRenderingTransparents = 450,
    AfterRenderingTransparents = 500,
    BeforeRenderingPostProcessing = 550,
    AfterRenderingPostProcessing = 600,
    AfterRendering = 1000,
}

impl RenderPassEvent {
    /// 按先后顺序排列的全部事件
    pub const ALL: [Self; 18] = [
        Self::BeforeRendering,
        Self::BeforeRenderingShadows,
        Self::AfterRenderingShadows,
        Self::BeforeRenderingPrePasses,
        Self::AfterRenderingPrePasses,
        Self::BeforeRenderingGbuffer,
        Self::AfterRenderingGbuffer,
        Self::BeforeRenderingDeferredLights,
        Self::AfterRenderingDeferredLights,
        Self::BeforeRenderingOpaques,
        Self::AfterRenderingOpaques,
        Self::BeforeRenderingSkybox,
        Self::AfterRenderingSkybox,
        Self::BeforeRenderingTransparents,
        Self::AfterRenderingTransparents,
        Self::BeforeRenderingPostProcessing,
        Self::AfterRenderingPostProcessing,
        Self::AfterRendering,
    ];

    /// thin G-buffer 固定在不透明物体之后录制
    pub const THIN_GBUFFER: Self = Self::AfterRenderingOpaques;
}

/// SSR 参数
///
/// 作者期配置，可以从 TOML 读取。必须经过 `validate` 才能用于构建 `SsrFeature`。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsrSettings {
    /// trace + composite 的注入点
    pub injection_point: RenderPassEvent,
    /// 最大步进次数，>= 1
    pub max_steps: u32,
    /// 命中判定的表面厚度，>= 0
    pub thickness: f32,
    /// 每一步在 view space 中的长度，> 0
    pub step_size: f32,
    /// 反射颜色强度，[0, 1]
    pub intensity: f32,
    /// 屏幕边缘淡出距离（UV 单位），[0, 10]，0 表示不淡出
    ///
    /// 反射 UV 到最近屏幕边界的距离最大为 0.5（屏幕中心），所以大于 0.5 的值会让
    /// 所有命中都被衰减：默认值 1.0 在屏幕中心的衰减系数为 `smoothstep(0.5) = 0.5`，
    /// 越靠近边界越暗。只想淡出边缘一圈时取 0.1 ~ 0.3。
    pub edge_fade: f32,
    pub tracing_mode: TracingMode,
}

impl Default for SsrSettings {
    fn default() -> Self {
        Self {
            injection_point: RenderPassEvent::AfterRenderingPostProcessing,
            max_steps: 50,
            thickness: 0.1,
            step_size: 0.1,
            intensity: 0.1,
            edge_fade: 1.0,
            tracing_mode: TracingMode::HiZTracing,
        }
    }
}

impl SsrSettings {
    pub const INTENSITY_RANGE: (f32, f32) = (0.0, 1.0);
    pub const EDGE_FADE_RANGE: (f32, f32) = (0.0, 10.0);

    /// 校验参数组合，所有错误在录制任何一帧之前暴露
    pub fn validate(self) -> Result<ValidatedSsrSettings, SsrError> {
        let invalid = |field: &'static str, reason: String| Err(SsrError::Configuration { field, reason });

        if self.max_steps == 0 {
            return invalid("max_steps", "must be at least 1".to_string());
        }
        if !self.thickness.is_finite() || self.thickness < 0.0 {
            return invalid("thickness", format!("must be a finite value >= 0, got {}", self.thickness));
        }
        if !self.step_size.is_finite() || self.step_size <= 0.0 {
            return invalid("step_size", format!("must be a finite value > 0, got {}", self.step_size));
        }
        let (lo, hi) = Self::INTENSITY_RANGE;
        if !(lo..=hi).contains(&self.intensity) {
            return invalid("intensity", format!("must be in [{lo}, {hi}], got {}", self.intensity));
        }
        let (lo, hi) = Self::EDGE_FADE_RANGE;
        if !(lo..=hi).contains(&self.edge_fade) {
            return invalid("edge_fade", format!("must be in [{lo}, {hi}], got {}", self.edge_fade));
        }
        if self.injection_point < RenderPassEvent::THIN_GBUFFER {
            return invalid(
                "injection_point",
                format!("{:?} is earlier than the thin G-buffer pass ({:?})", self.injection_point, RenderPassEvent::THIN_GBUFFER),
            );
        }

        Ok(ValidatedSsrSettings(self))
    }
}

/// 通过校验的参数，只能由 `SsrSettings::validate` 构造
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedSsrSettings(SsrSettings);

impl Deref for ValidatedSsrSettings {
    type Target = SsrSettings;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ValidatedSsrSettings {
    pub fn into_inner(self) -> SsrSettings {
        self.0
    }
}
