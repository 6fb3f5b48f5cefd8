//! 着色程序契约
//!
//! 程序本体由后端提供（GPU shader 或 CPU kernel），这里只约定名字、pass 编号、
//! 输入槽位、uniform 布局和输出格式。

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec4};
use mgssr_render_graph::gfx::{GfxProgram, GfxProgramLibrary, ShaderTagId};
use mgssr_render_graph::render_graph::RgGlobalTextureKey;

use crate::{SsrCamera, SsrError, SsrSettings, TracingMode};

/// SSR 主程序：pass 0 为 trace，pass 1 为 composite
pub const SSR_PROGRAM: &str = "Hidden/mg_ssr_shader";
pub const TRACE_PASS: u32 = 0;
pub const COMPOSITE_PASS: u32 = 1;

/// thin G-buffer 的覆盖程序
pub const THIN_GBUFFER_PROGRAM: &str = "SSR/ThinGBuffer";

/// thin G-buffer 发布到帧内全局纹理表使用的 key
pub const THIN_GBUFFER_KEY: RgGlobalTextureKey = RgGlobalTextureKey::new("_SsrThinGBuffer");

pub const THIN_GBUFFER_FORMAT: vk::Format = vk::Format::R16G16_UNORM;
pub const REFLECTION_MAP_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;

/// thin G-buffer 的 G 通道是 unorm，物体厚度按该范围归一化
pub const THIN_GBUFFER_THICKNESS_RANGE: f32 = 10.0;

/// thin G-buffer 只绘制带这些 pass 标签的物体
pub const THIN_GBUFFER_SHADER_TAGS: [ShaderTagId; 3] = [
    ShaderTagId("SRPDefaultUnlit"),
    ShaderTagId("UniversalForward"),
    ShaderTagId("UniversalForwardOnly"),
];

/// 反射图中表示未命中的值：`(u, v, hit, _)`
pub const REFLECTION_MISS: Vec4 = Vec4::new(-1.0, -1.0, 0.0, 0.0);

/// trace pass 的 uniform
///
/// 输入槽位：0 = 深度，1 = 世界空间法线，2 = thin G-buffer（`has_thin_gbuffer == 0` 时忽略）。
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct TraceUniforms {
    pub view: Mat4,
    pub projection: Mat4,
    pub inv_projection: Mat4,
    pub screen_size: Vec2,
    pub num_steps: u32,
    pub thickness: f32,
    pub step_size: f32,
    /// `TracingMode` 的数值
    pub tracing_mode: u32,
    pub has_thin_gbuffer: u32,
    pub thin_thickness_range: f32,
}

impl TraceUniforms {
    /// `has_thin_gbuffer` 由 trace pass 在 setup 时根据全局纹理表填写
    pub fn new(settings: &SsrSettings, camera: &SsrCamera, width: u32, height: u32) -> Self {
        Self {
            view: camera.view,
            projection: camera.projection,
            inv_projection: camera.projection.inverse(),
            screen_size: Vec2::new(width as f32, height as f32),
            num_steps: settings.max_steps,
            thickness: settings.thickness,
            step_size: settings.step_size,
            tracing_mode: settings.tracing_mode as u32,
            has_thin_gbuffer: 0,
            thin_thickness_range: THIN_GBUFFER_THICKNESS_RANGE,
        }
    }

    pub fn tracing_mode(&self) -> TracingMode {
        if self.tracing_mode == TracingMode::LinearTracing as u32 {
            TracingMode::LinearTracing
        } else {
            TracingMode::HiZTracing
        }
    }
}

/// composite pass 的 uniform
///
/// 输入槽位：0 = ColorCopy，1 = 反射图。
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct CompositeUniforms {
    pub intensity: f32,
    pub edge_fade: f32,
    pub _pad: [f32; 2],
}

/// thin G-buffer 覆盖程序的 uniform
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct ThinGBufferUniforms {
    pub thickness_range: f32,
    pub _pad: [f32; 3],
}

/// 已解析的 SSR 程序
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SsrPrograms {
    pub ssr: GfxProgram,
    pub thin_gbuffer: GfxProgram,
}

impl SsrPrograms {
    pub fn resolve(library: &dyn GfxProgramLibrary) -> Result<Self, SsrError> {
        let ssr = library.find_program(SSR_PROGRAM).ok_or(SsrError::Resolution { name: SSR_PROGRAM })?;
        if ssr.pass_count() <= COMPOSITE_PASS {
            log::error!("program '{}' has {} passes, expected at least {}", SSR_PROGRAM, ssr.pass_count(), COMPOSITE_PASS + 1);
            return Err(SsrError::Resolution { name: SSR_PROGRAM });
        }
        let thin_gbuffer =
            library.find_program(THIN_GBUFFER_PROGRAM).ok_or(SsrError::Resolution { name: THIN_GBUFFER_PROGRAM })?;

        Ok(Self { ssr, thin_gbuffer })
    }
}
