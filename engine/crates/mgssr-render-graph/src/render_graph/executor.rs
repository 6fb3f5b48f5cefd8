//! RenderGraph 构建器和执行器
//!
//! 提供 `RenderGraphBuilder` 用于构建渲染图，
//! `CompiledGraph` 用于缓存编译结果并执行渲染。

use std::collections::HashSet;

use ash::vk;
use itertools::Itertools;
use slotmap::SecondaryMap;

use crate::gfx::{GfxDevice, GfxImageBarrier, GfxImageHandle};
use crate::render_graph::pass::{RgLambdaPass, RgPassExecutorWrapper};
use crate::render_graph::{
    DependencyGraph, PassBarriers, RgError, RgGlobalTextureKey, RgGlobalTextures, RgImageBarrierDesc, RgImageDesc,
    RgImageHandle, RgImageResource, RgImageState, RgPass, RgPassBuilder, RgPassContext, RgPassNode,
    RgResourceRegistry, RgTransientArena,
};

/// RenderGraph 构建器
///
/// 用于声明式构建渲染图。
///
/// # 使用流程
///
/// 1. 创建 builder: `RenderGraphBuilder::new()`
/// 2. 导入外部资源: `builder.import_image(...)`
/// 3. 添加 Pass: `builder.add_pass("name", pass)`
/// 4. 编译: `builder.compile()?`
/// 5. 执行: `compiled.execute(&mut device)`
///
/// # 生命周期
///
/// `'a` 是 Pass 可以借用的外部资源的生命周期。
/// 这允许 Pass 直接引用外部的 program、renderer list 等资源，
/// 而不需要使用 Rc/Arc 包装。
pub struct RenderGraphBuilder<'a> {
    /// 资源注册表
    resources: RgResourceRegistry,
    /// 帧内全局纹理表
    globals: RgGlobalTextures,

    /// Pass 节点列表（按添加顺序）
    passes: Vec<RgPassNode<'a>>,

    /// 执行结束后需要转换到的最终状态
    exports: Vec<(RgImageHandle, RgImageState)>,

    /// setup 阶段记录的错误
    errors: Vec<RgError>,
}

impl Default for RenderGraphBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> RenderGraphBuilder<'a> {
    /// 创建新的 RenderGraph 构建器
    pub fn new() -> Self {
        Self {
            resources: RgResourceRegistry::new(),
            globals: RgGlobalTextures::new(),
            passes: Vec::new(),
            exports: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// 导入外部图像资源
    ///
    /// # 参数
    /// - `name`: 资源调试名称
    /// - `image_handle`: 物理图像句柄
    /// - `desc`: 图像描述（尺寸、格式）
    /// - `initial_state`: 图像的初始状态
    ///
    /// # 返回
    /// RenderGraph 内部的图像句柄
    pub fn import_image(
        &mut self,
        name: impl Into<String>,
        image_handle: GfxImageHandle,
        desc: RgImageDesc,
        initial_state: RgImageState,
    ) -> RgImageHandle {
        self.resources.register_image(RgImageResource::imported(name, image_handle, desc, initial_state))
    }

    /// 在 graph 层面声明临时图像
    ///
    /// 与 `RgPassBuilder::create_image` 相同，但句柄可以先于 pass 创建，
    /// 便于把同一个临时图像交给多个 pass。
    pub fn create_image(&mut self, name: impl Into<String>, desc: RgImageDesc) -> RgImageHandle {
        self.resources.register_image(RgImageResource::transient(name, desc))
    }

    /// 声明导入图像在 graph 执行结束后的状态
    pub fn export_image(&mut self, handle: RgImageHandle, final_state: RgImageState) -> &mut Self {
        self.exports.push((handle, final_state));
        self
    }

    /// 添加 Pass
    ///
    /// # 参数
    /// - `name`: Pass 名称（用于调试和性能分析）
    /// - `pass`: 实现了 `RgPass` trait 的 Pass 对象
    ///
    /// # 返回
    /// 返回 `&mut Self` 以支持链式调用
    pub fn add_pass<P: RgPass + 'a>(&mut self, name: impl Into<String>, mut pass: P) -> &mut Self {
        let name = name.into();

        // 创建 PassBuilder 供 Pass 声明依赖
        let mut builder = RgPassBuilder {
            name: name.clone(),
            image_reads: Vec::new(),
            image_writes: Vec::new(),
            never_cull: false,
            published: Vec::new(),
            resources: &mut self.resources,
            globals: &mut self.globals,
            errors: &mut self.errors,
        };

        // 调用 Pass 的 setup 方法
        pass.setup(&mut builder);

        let node = RgPassNode {
            name,
            image_reads: builder.image_reads,
            image_writes: builder.image_writes,
            never_cull: builder.never_cull,
            published: builder.published,
            executor: Box::new(RgPassExecutorWrapper { pass }),
        };

        self.passes.push(node);
        self
    }

    /// 以闭包形式添加 Pass
    pub fn add_pass_lambda<S, E>(&mut self, name: impl Into<String>, setup: S, exec: E) -> &mut Self
    where
        S: FnMut(&mut RgPassBuilder) + 'a,
        E: Fn(&mut RgPassContext<'_>) -> Result<(), RgError> + 'a,
    {
        self.add_pass(name, RgLambdaPass { setup, exec })
    }

    /// 查询已发布的全局纹理
    #[inline]
    pub fn global_image(&self, key: RgGlobalTextureKey) -> Option<RgImageHandle> {
        self.globals.get(key)
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// 编译渲染图
    ///
    /// 执行声明校验、依赖分析、拓扑排序、裁剪和 barrier 计算。
    pub fn compile(mut self) -> Result<CompiledGraph<'a>, RgError> {
        let _span = profiling_span("RenderGraphBuilder::compile");

        if !self.errors.is_empty() {
            return Err(self.errors.swap_remove(0));
        }
        self.validate_handles()?;

        let pass_count = self.passes.len();

        // 收集每个 Pass 的读写资源句柄
        let image_reads = self.passes.iter().map(|p| p.image_reads.iter().map(|s| s.0).collect_vec()).collect_vec();
        let image_writes = self.passes.iter().map(|p| p.image_writes.iter().map(|s| s.0).collect_vec()).collect_vec();

        // 依赖分析
        let dep_graph = DependencyGraph::analyze(pass_count, &image_reads, &image_writes);

        // 拓扑排序
        let sorted = dep_graph.topological_sort().map_err(|cycle| {
            let names = cycle.iter().map(|&i| self.passes[i].name.clone()).collect_vec();
            log::error!("RenderGraph: cycle detected involving passes: {:?}", names);
            RgError::Cycle(names)
        })?;

        // 裁剪：根 = never_cull / 发布全局纹理 / 写入导入资源
        let roots = self
            .passes
            .iter()
            .map(|p| {
                p.never_cull
                    || !p.published.is_empty()
                    || p.image_writes
                        .iter()
                        .any(|(h, _)| self.resources.get_image(*h).is_some_and(|r| r.is_imported()))
            })
            .collect_vec();
        let live = dep_graph.live_passes(&roots);

        let (execution_order, culled): (Vec<usize>, Vec<usize>) = sorted.into_iter().partition(|&i| live[i]);
        for &i in &culled {
            log::debug!("RenderGraph: pass '{}' culled", self.passes[i].name);
        }

        // 计算每个 Pass 的 barriers
        let barriers = self.compute_barriers(&execution_order);

        Ok(CompiledGraph {
            resources: self.resources,
            globals: self.globals,
            passes: self.passes,
            execution_order,
            culled,
            barriers,
            exports: self.exports,
            dep_graph,
        })
    }

    fn validate_handles(&self) -> Result<(), RgError> {
        for pass in &self.passes {
            for (handle, _) in pass.image_reads.iter().chain(pass.image_writes.iter()) {
                if !self.resources.contains_image(*handle) {
                    return Err(RgError::UnknownImage {
                        pass: pass.name.clone(),
                        image: *handle,
                    });
                }
            }
        }
        for (handle, _) in &self.exports {
            if !self.resources.contains_image(*handle) {
                return Err(RgError::UnknownImage {
                    pass: "<export>".to_string(),
                    image: *handle,
                });
            }
        }
        Ok(())
    }

    /// 计算每个 Pass 需要的 barriers
    ///
    /// 模拟 pass 的执行顺序，跟踪资源的状态变化，生成必要的 barriers
    fn compute_barriers(&self, execution_order: &[usize]) -> Vec<PassBarriers> {
        let mut barriers = vec![PassBarriers::new(); self.passes.len()];
        let mut image_states: SecondaryMap<RgImageHandle, RgImageState> = SecondaryMap::new();

        for &pass_idx in execution_order {
            barriers[pass_idx] = PassBarriers::for_pass(&self.passes[pass_idx], &mut image_states, &self.resources);
        }

        barriers
    }
}

/// 被跳过的 pass
#[derive(Clone, Debug, PartialEq)]
pub struct RgSkippedPass {
    pub name: String,
    pub reason: String,
}

/// 一次执行的结果
///
/// 单个 pass 的失败不会中断整个 graph：失败的 pass 以及读取其输出的 pass 被跳过，
/// 其余 pass 照常执行。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RgExecuteReport {
    /// 实际执行的 pass（按执行顺序）
    pub executed: Vec<String>,
    /// 编译时被裁剪的 pass
    pub culled: Vec<String>,
    /// 执行时被跳过的 pass
    pub skipped: Vec<RgSkippedPass>,
}

impl RgExecuteReport {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.skipped.is_empty()
    }

    #[inline]
    pub fn was_executed(&self, name: &str) -> bool {
        self.executed.iter().any(|n| n == name)
    }

    #[inline]
    pub fn was_skipped(&self, name: &str) -> bool {
        self.skipped.iter().any(|s| s.name == name)
    }
}

/// 编译后的渲染图
///
/// 包含执行顺序、裁剪结果和预计算的 barriers。
///
/// # 生命周期
///
/// `'a` 是 Pass 借用的外部资源的生命周期。
/// CompiledGraph 的生命周期不能超过这些外部资源。
pub struct CompiledGraph<'a> {
    /// 资源注册表
    resources: RgResourceRegistry,
    globals: RgGlobalTextures,
    /// Pass 节点列表
    passes: Vec<RgPassNode<'a>>,
    /// 执行顺序（拓扑排序后，不含被裁剪的 pass）
    execution_order: Vec<usize>,
    /// 被裁剪的 pass
    culled: Vec<usize>,
    /// 每个 Pass 的 barriers（按 pass 索引），假设所有 pass 都执行成功
    barriers: Vec<PassBarriers>,
    exports: Vec<(RgImageHandle, RgImageState)>,
    /// 依赖图（用于调试）
    dep_graph: DependencyGraph,
}

// getters
impl CompiledGraph<'_> {
    /// 获取执行顺序
    pub fn execution_order(&self) -> &[usize] {
        &self.execution_order
    }

    /// 执行顺序中的 pass 名称
    pub fn execution_order_names(&self) -> Vec<&str> {
        self.execution_order.iter().map(|&i| self.passes[i].name.as_str()).collect()
    }

    /// 被裁剪的 pass 名称
    pub fn culled_pass_names(&self) -> Vec<&str> {
        self.culled.iter().map(|&i| self.passes[i].name.as_str()).collect()
    }

    /// 获取 Pass 数量
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// 获取 Pass 名称
    pub fn pass_name(&self, index: usize) -> &str {
        &self.passes[index].name
    }

    pub fn pass_index(&self, name: &str) -> Option<usize> {
        self.passes.iter().position(|p| p.name == name)
    }

    pub fn barriers(&self, pass_index: usize) -> &PassBarriers {
        &self.barriers[pass_index]
    }

    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.dep_graph
    }

    pub fn resources(&self) -> &RgResourceRegistry {
        &self.resources
    }

    #[inline]
    pub fn global_image(&self, key: RgGlobalTextureKey) -> Option<RgImageHandle> {
        self.globals.get(key)
    }
}

impl CompiledGraph<'_> {
    /// 执行渲染图
    ///
    /// 临时资源在第一次使用前分配，执行结束（包括失败）时统一释放。
    /// barrier 按实际执行情况重新推导，被跳过的 pass 不会推进资源状态。
    pub fn execute(&self, device: &mut dyn GfxDevice) -> RgExecuteReport {
        let _span = profiling_span("CompiledGraph::execute");

        let mut report = RgExecuteReport {
            culled: self.culled.iter().map(|&i| self.passes[i].name.clone()).collect(),
            ..Default::default()
        };

        // 构建物理资源查询表
        let mut image_handles: SecondaryMap<RgImageHandle, GfxImageHandle> = SecondaryMap::new();
        for (handle, resource) in self.resources.iter_images() {
            if let Some(image) = resource.physical_handle() {
                image_handles.insert(handle, image);
            }
        }

        let mut arena = RgTransientArena::new(device);
        let mut image_states: SecondaryMap<RgImageHandle, RgImageState> = SecondaryMap::new();
        // 内容无效的临时图像（生产者失败或被跳过）
        let mut invalid_images: HashSet<RgImageHandle> = HashSet::new();

        for &pass_idx in &self.execution_order {
            let pass = &self.passes[pass_idx];
            let _pass_span = profiling_span("RenderGraph::pass");

            if let Some(reason) = self.prepare_pass(pass, &mut arena, &mut image_handles, &invalid_images) {
                log::warn!("RenderGraph: pass '{}' skipped: {}", pass.name, reason);
                self.invalidate_outputs(pass, &mut invalid_images);
                report.skipped.push(RgSkippedPass {
                    name: pass.name.clone(),
                    reason,
                });
                continue;
            }

            // 插入 barriers
            let pass_barriers = PassBarriers::for_pass(pass, &mut image_states, &self.resources);
            let device = arena.device();
            Self::record_barriers(device, &pass_barriers.image_barriers, &image_handles);

            let encoder = device.as_encoder();
            encoder.begin_label(&pass.name);
            let mut ctx = RgPassContext {
                cmd: &mut *encoder,
                pass_name: &pass.name,
                image_handles: &image_handles,
            };
            let result = pass.executor.execute(&mut ctx);
            encoder.end_label();

            match result {
                Ok(()) => report.executed.push(pass.name.clone()),
                Err(err) => {
                    log::error!("RenderGraph: pass '{}' failed: {}", pass.name, err);
                    self.invalidate_outputs(pass, &mut invalid_images);
                    report.skipped.push(RgSkippedPass {
                        name: pass.name.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        // 导出资源转换到最终状态
        let export_barriers = self
            .exports
            .iter()
            .filter(|(handle, _)| image_handles.contains_key(*handle))
            .filter_map(|(handle, final_state)| {
                let resource = self.resources.get_image(*handle)?;
                let crt_state = image_states.get(*handle).copied().unwrap_or(resource.initial_state);
                let desc =
                    RgImageBarrierDesc::new(*handle, crt_state, *final_state).with_aspect(resource.infer_aspect());
                desc.needs_barrier().then_some(desc)
            })
            .collect_vec();
        Self::record_barriers(arena.device(), &export_barriers, &image_handles);

        report
    }

    /// 为 pass 准备物理资源
    ///
    /// # 返回
    /// - `None`: 可以执行
    /// - `Some(reason)`: 必须跳过
    fn prepare_pass(
        &self,
        pass: &RgPassNode<'_>,
        arena: &mut RgTransientArena<'_>,
        image_handles: &mut SecondaryMap<RgImageHandle, GfxImageHandle>,
        invalid_images: &HashSet<RgImageHandle>,
    ) -> Option<String> {
        if let Some((handle, _)) = pass.image_reads.iter().find(|(h, _)| invalid_images.contains(h)) {
            return Some(format!("input '{}' was not produced", self.resources.image_name(*handle)));
        }

        for handle in pass.touched_images() {
            if image_handles.contains_key(handle) {
                continue;
            }
            let Some(resource) = self.resources.get_image(handle) else {
                return Some(format!("unknown image {:?}", handle));
            };
            match arena.allocate(&resource.name, &resource.desc) {
                Ok(image) => {
                    image_handles.insert(handle, image);
                }
                Err(err) => return Some(err.to_string()),
            }
        }
        None
    }

    /// 把 pass 写入的临时图像标记为无效
    ///
    /// 导入资源保留之前的内容，不视为无效。
    fn invalidate_outputs(&self, pass: &RgPassNode<'_>, invalid_images: &mut HashSet<RgImageHandle>) {
        for (handle, _) in &pass.image_writes {
            if self.resources.get_image(*handle).is_some_and(|r| !r.is_imported()) {
                invalid_images.insert(*handle);
            }
        }
    }

    /// 录制 barriers
    fn record_barriers(
        device: &mut dyn GfxDevice,
        barriers: &[RgImageBarrierDesc],
        image_handles: &SecondaryMap<RgImageHandle, GfxImageHandle>,
    ) {
        let image_barriers: Vec<GfxImageBarrier> = barriers
            .iter()
            .filter(|desc| desc.needs_barrier())
            .filter_map(|desc| Some(desc.to_gfx_barrier(*image_handles.get(desc.handle)?)))
            .collect();

        if !image_barriers.is_empty() {
            device.image_barriers(&image_barriers);
        }
    }
}

#[cfg(feature = "profiling")]
fn profiling_span(name: &'static str) -> Option<tracy_client::Span> {
    tracy_client::Client::running().map(|client| client.span_alloc(Some(name), "", file!(), line!(), 0))
}

#[cfg(not(feature = "profiling"))]
#[inline]
fn profiling_span(_name: &'static str) {}

// 调试方法
impl CompiledGraph<'_> {
    /// 打印执行计划（用于调试）
    ///
    /// 输出详细的调试信息，包括：
    /// - 每个 Pass 的执行顺序与被裁剪的 pass
    /// - 每个 Pass 的 image 读写信息（包含资源名称）
    /// - 每个 Pass 的 barrier 详细信息（layout 转换、目标资源名称）
    pub fn print_execution_plan(&self) {
        log::info!("╔══════════════════════════════════════════════════════════════════╗");
        log::info!("║              RenderGraph Execution Plan                          ║");
        log::info!("╠══════════════════════════════════════════════════════════════════╣");
        log::info!(
            "║ Total Passes: {}  |  Execution Order: [{}]",
            self.passes.len(),
            self.execution_order_names().join(" → ")
        );
        if !self.culled.is_empty() {
            log::info!("║ Culled: [{}]", self.culled_pass_names().join(", "));
        }
        log::info!("╚══════════════════════════════════════════════════════════════════╝");

        for (order, &pass_idx) in self.execution_order.iter().enumerate() {
            let pass = &self.passes[pass_idx];
            let barriers = &self.barriers[pass_idx];

            log::info!("");
            log::info!("┌─────────────────────────────────────────────────────────────────┐");
            log::info!("│ [{}/{}] Pass: \"{}\"", order + 1, self.execution_order.len(), pass.name);
            log::info!("├─────────────────────────────────────────────────────────────────┤");

            if !pass.image_reads.is_empty() {
                log::info!("│ Image Reads:");
                for (handle, state) in &pass.image_reads {
                    log::info!(
                        "│   📖 \"{}\" @ {:?} (stage: {}, access: {})",
                        self.resources.image_name(*handle),
                        state.layout,
                        Self::format_pipeline_stage(state.stage),
                        Self::format_access_flags(state.access)
                    );
                }
            }

            if !pass.image_writes.is_empty() {
                log::info!("│ Image Writes:");
                for (handle, state) in &pass.image_writes {
                    log::info!(
                        "│   ✏️  \"{}\" @ {:?} (stage: {}, access: {})",
                        self.resources.image_name(*handle),
                        state.layout,
                        Self::format_pipeline_stage(state.stage),
                        Self::format_access_flags(state.access)
                    );
                }
            }

            for key in &pass.published {
                log::info!("│   🌐 publishes global \"{}\"", key.name());
            }

            if barriers.has_barriers() {
                log::info!("├─────────────────────────────────────────────────────────────────┤");
                log::info!("│ Barriers: {} image", barriers.image_barrier_count());

                for barrier in &barriers.image_barriers {
                    let layout_change = if barrier.src_state.layout != barrier.dst_state.layout {
                        format!("{:?} → {:?}", barrier.src_state.layout, barrier.dst_state.layout)
                    } else {
                        format!("{:?} (no layout change)", barrier.src_state.layout)
                    };
                    log::info!("│   🔒 Image \"{}\":", self.resources.image_name(barrier.handle));
                    log::info!("│       Layout: {}", layout_change);
                    log::info!(
                        "│       Stage:  {} → {}",
                        Self::format_pipeline_stage(barrier.src_state.stage),
                        Self::format_pipeline_stage(barrier.dst_state.stage)
                    );
                    log::info!(
                        "│       Access: {} → {}",
                        Self::format_access_flags(barrier.src_state.access),
                        Self::format_access_flags(barrier.dst_state.access)
                    );
                    log::info!("│       Aspect: {:?}", barrier.aspect);
                }
            } else {
                log::info!("│ No barriers required");
            }

            log::info!("└─────────────────────────────────────────────────────────────────┘");
        }

        log::info!("");
        log::info!("═══════════════════════ End of Execution Plan ═══════════════════════");
    }

    /// 格式化 PipelineStageFlags2 为可读字符串
    fn format_pipeline_stage(stage: vk::PipelineStageFlags2) -> String {
        const NAMES: &[(vk::PipelineStageFlags2, &str)] = &[
            (vk::PipelineStageFlags2::TOP_OF_PIPE, "TOP_OF_PIPE"),
            (vk::PipelineStageFlags2::BOTTOM_OF_PIPE, "BOTTOM_OF_PIPE"),
            (vk::PipelineStageFlags2::VERTEX_SHADER, "VERTEX_SHADER"),
            (vk::PipelineStageFlags2::FRAGMENT_SHADER, "FRAGMENT_SHADER"),
            (vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, "COLOR_ATTACHMENT_OUTPUT"),
            (vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS, "EARLY_FRAGMENT_TESTS"),
            (vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS, "LATE_FRAGMENT_TESTS"),
            (vk::PipelineStageFlags2::COMPUTE_SHADER, "COMPUTE_SHADER"),
            (vk::PipelineStageFlags2::TRANSFER, "TRANSFER"),
        ];

        let stages = NAMES.iter().filter(|(flag, _)| stage.contains(*flag)).map(|(_, name)| *name).collect_vec();
        if stages.is_empty() { format!("{:?}", stage) } else { stages.join(" | ") }
    }

    /// 格式化 AccessFlags2 为可读字符串
    fn format_access_flags(access: vk::AccessFlags2) -> String {
        if access == vk::AccessFlags2::NONE {
            return "NONE".to_string();
        }

        const NAMES: &[(vk::AccessFlags2, &str)] = &[
            (vk::AccessFlags2::SHADER_SAMPLED_READ, "SHADER_SAMPLED_READ"),
            (vk::AccessFlags2::SHADER_STORAGE_READ, "STORAGE_READ"),
            (vk::AccessFlags2::SHADER_STORAGE_WRITE, "STORAGE_WRITE"),
            (vk::AccessFlags2::COLOR_ATTACHMENT_READ, "COLOR_ATTACH_READ"),
            (vk::AccessFlags2::COLOR_ATTACHMENT_WRITE, "COLOR_ATTACH_WRITE"),
            (vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ, "DEPTH_ATTACH_READ"),
            (vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE, "DEPTH_ATTACH_WRITE"),
            (vk::AccessFlags2::TRANSFER_READ, "TRANSFER_READ"),
            (vk::AccessFlags2::TRANSFER_WRITE, "TRANSFER_WRITE"),
            (vk::AccessFlags2::MEMORY_READ, "MEMORY_READ"),
            (vk::AccessFlags2::MEMORY_WRITE, "MEMORY_WRITE"),
        ];

        let flags = NAMES.iter().filter(|(flag, _)| access.contains(*flag)).map(|(_, name)| *name).collect_vec();
        if flags.is_empty() { format!("{:?}", access) } else { flags.join(" | ") }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use slotmap::SlotMap;

    use super::*;
    use crate::gfx::{GfxCommandEncoder, GfxError, GfxFullscreenDraw, GfxRendererListDraw};

    /// 只记录调用的设备
    #[derive(Default)]
    struct MockDevice {
        images: SlotMap<GfxImageHandle, String>,
        log: Vec<String>,
        barriers: Vec<GfxImageBarrier>,
        created: usize,
        destroyed: usize,
        fail_alloc: Option<&'static str>,
    }

    impl GfxCommandEncoder for MockDevice {
        fn image_barriers(&mut self, barriers: &[GfxImageBarrier]) {
            self.barriers.extend_from_slice(barriers);
        }
        fn begin_label(&mut self, name: &str) {
            self.log.push(format!("begin {name}"));
        }
        fn end_label(&mut self) {
            self.log.push("end".to_string());
        }
        fn copy_image(&mut self, _src: GfxImageHandle, _dst: GfxImageHandle) -> Result<(), GfxError> {
            self.log.push("copy".to_string());
            Ok(())
        }
        fn draw_renderer_list(&mut self, _draw: &GfxRendererListDraw<'_>) -> Result<(), GfxError> {
            Ok(())
        }
        fn draw_fullscreen(&mut self, _draw: &GfxFullscreenDraw<'_>) -> Result<(), GfxError> {
            Ok(())
        }
    }

    impl GfxDevice for MockDevice {
        fn create_image(&mut self, name: &str, desc: &RgImageDesc) -> Result<GfxImageHandle, GfxError> {
            if self.fail_alloc == Some(name) {
                return Err(GfxError::InvalidExtent {
                    name: name.to_string(),
                    width: desc.width,
                    height: desc.height,
                });
            }
            self.created += 1;
            Ok(self.images.insert(name.to_string()))
        }
        fn destroy_image(&mut self, image: GfxImageHandle) {
            if self.images.remove(image).is_some() {
                self.destroyed += 1;
            }
        }
        fn as_encoder(&mut self) -> &mut dyn GfxCommandEncoder {
            self
        }
    }

    const KEY: RgGlobalTextureKey = RgGlobalTextureKey::new("_TestGlobal");

    fn desc() -> RgImageDesc {
        RgImageDesc::new_2d(4, 4, vk::Format::R16G16B16A16_SFLOAT)
    }

    fn import_color(builder: &mut RenderGraphBuilder<'_>, device: &mut MockDevice) -> RgImageHandle {
        let physical = device.images.insert("color".to_string());
        builder.import_image("color", physical, desc(), RgImageState::COLOR_ATTACHMENT_WRITE)
    }

    #[test]
    fn test_unread_transient_producer_is_culled() {
        let mut device = MockDevice::default();
        let mut builder = RenderGraphBuilder::new();
        let color = import_color(&mut builder, &mut device);

        builder.add_pass_lambda(
            "orphan",
            |b| {
                let t = b.create_image("orphan-output", desc());
                b.write_image(t, RgImageState::COLOR_ATTACHMENT_WRITE);
            },
            |_| Ok(()),
        );
        builder.add_pass_lambda(
            "present",
            move |b| {
                b.write_image(color, RgImageState::COLOR_ATTACHMENT_WRITE);
            },
            |_| Ok(()),
        );

        let graph = builder.compile().unwrap();
        assert_eq!(graph.execution_order_names(), vec!["present"]);
        assert_eq!(graph.culled_pass_names(), vec!["orphan"]);

        let report = graph.execute(&mut device);
        assert_eq!(report.executed, vec!["present".to_string()]);
        assert_eq!(report.culled, vec!["orphan".to_string()]);
        assert_eq!(device.created, 0);
    }

    #[test]
    fn test_never_cull_and_global_publish_keep_passes() {
        let mut device = MockDevice::default();
        let mut builder = RenderGraphBuilder::new();

        builder.add_pass_lambda(
            "pinned",
            |b| {
                let t = b.create_image("pinned-output", desc());
                b.write_image(t, RgImageState::COLOR_ATTACHMENT_WRITE);
                b.never_cull();
            },
            |_| Ok(()),
        );
        builder.add_pass_lambda(
            "publisher",
            |b| {
                let t = b.create_image("published", desc());
                b.write_image(t, RgImageState::COLOR_ATTACHMENT_WRITE);
                b.publish_global(KEY, t);
            },
            |_| Ok(()),
        );

        let graph = builder.compile().unwrap();
        assert!(graph.global_image(KEY).is_some());
        let report = graph.execute(&mut device);
        assert_eq!(report.executed, vec!["pinned".to_string(), "publisher".to_string()]);
        assert!(report.culled.is_empty());
        // 临时资源在执行结束后全部释放
        assert_eq!(device.created, 2);
        assert_eq!(device.destroyed, 2);
    }

    #[test]
    fn test_duplicate_global_fails_compile() {
        let mut builder = RenderGraphBuilder::new();
        for name in ["first", "second"] {
            builder.add_pass_lambda(
                name,
                |b| {
                    let t = b.create_image("published", desc());
                    b.write_image(t, RgImageState::COLOR_ATTACHMENT_WRITE);
                    b.publish_global(KEY, t);
                },
                |_| Ok(()),
            );
        }

        match builder.compile() {
            Err(RgError::DuplicateGlobal { key, first, second }) => {
                assert_eq!(key, "_TestGlobal");
                assert_eq!(first, "first");
                assert_eq!(second, "second");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("duplicate global must not compile"),
        }
    }

    #[test]
    fn test_global_reader_is_ordered_after_publisher() {
        let mut device = MockDevice::default();
        let mut builder = RenderGraphBuilder::new();
        let color = import_color(&mut builder, &mut device);

        builder.add_pass_lambda(
            "publisher",
            |b| {
                let t = b.create_image("published", desc());
                b.write_image(t, RgImageState::COLOR_ATTACHMENT_WRITE);
                b.publish_global(KEY, t);
            },
            |_| Ok(()),
        );
        builder.add_pass_lambda(
            "consumer",
            move |b| {
                if let Some(global) = b.global_image(KEY) {
                    b.read_image(global, RgImageState::SHADER_READ_FRAGMENT);
                }
                b.write_image(color, RgImageState::COLOR_ATTACHMENT_WRITE);
            },
            |_| Ok(()),
        );

        let graph = builder.compile().unwrap();
        let consumer = graph.pass_index("consumer").unwrap();
        assert_eq!(graph.dependency_graph().get_predecessors(consumer), vec![0]);
        assert_eq!(graph.execution_order_names(), vec!["publisher", "consumer"]);
    }

    #[test]
    fn test_failed_pass_skips_dependents_only() {
        let intermediate = Cell::new(None);
        let intermediate = &intermediate;
        let mut device = MockDevice::default();
        let mut builder = RenderGraphBuilder::new();
        let color = import_color(&mut builder, &mut device);

        builder.add_pass_lambda(
            "producer",
            move |b| {
                let t = b.create_image("intermediate", desc());
                intermediate.set(Some(b.write_image(t, RgImageState::COLOR_ATTACHMENT_WRITE)));
            },
            |ctx| Err(RgError::Gfx(GfxError::ProgramNotFound(ctx.pass_name().to_string()))),
        );
        builder.add_pass_lambda(
            "consumer",
            move |b| {
                if let Some(t) = intermediate.get() {
                    b.read_image(t, RgImageState::SHADER_READ_FRAGMENT);
                }
                b.write_image(color, RgImageState::COLOR_ATTACHMENT_WRITE);
            },
            |_| Ok(()),
        );
        builder.add_pass_lambda(
            "independent",
            move |b| {
                b.read_write_image(color, RgImageState::COLOR_ATTACHMENT_READ_WRITE);
            },
            |_| Ok(()),
        );

        let graph = builder.compile().unwrap();
        let report = graph.execute(&mut device);

        assert_eq!(report.executed, vec!["independent".to_string()]);
        assert!(report.was_skipped("producer"));
        assert!(report.was_skipped("consumer"));
        assert!(!report.is_success());
        assert_eq!(device.created, device.destroyed);
    }

    #[test]
    fn test_allocation_failure_skips_pass() {
        let mut device = MockDevice {
            fail_alloc: Some("too-big"),
            ..Default::default()
        };
        let mut builder = RenderGraphBuilder::new();
        builder.add_pass_lambda(
            "allocates",
            |b| {
                let t = b.create_image("too-big", desc());
                b.write_image(t, RgImageState::COLOR_ATTACHMENT_WRITE);
                b.never_cull();
            },
            |_| Ok(()),
        );

        let report = builder.compile().unwrap().execute(&mut device);
        assert!(report.executed.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.contains("too-big"));
    }

    #[test]
    fn test_depth_transitions_between_passes() {
        let mut device = MockDevice::default();
        let mut builder = RenderGraphBuilder::new();
        let color = import_color(&mut builder, &mut device);
        let depth_physical = device.images.insert("depth".to_string());
        let depth = builder.import_image(
            "depth",
            depth_physical,
            RgImageDesc::new_2d(4, 4, vk::Format::D32_SFLOAT),
            RgImageState::DEPTH_ATTACHMENT_WRITE,
        );
        builder.export_image(depth, RgImageState::DEPTH_ATTACHMENT_WRITE);

        builder.add_pass_lambda(
            "depth-test",
            move |b| {
                b.read_image(depth, RgImageState::DEPTH_ATTACHMENT_READ_ONLY);
                b.write_image(color, RgImageState::COLOR_ATTACHMENT_WRITE);
            },
            |_| Ok(()),
        );
        builder.add_pass_lambda(
            "depth-sample",
            move |b| {
                b.read_image(depth, RgImageState::SHADER_READ_FRAGMENT);
                b.write_image(color, RgImageState::COLOR_ATTACHMENT_WRITE);
            },
            |_| Ok(()),
        );

        let graph = builder.compile().unwrap();
        let sample = graph.pass_index("depth-sample").unwrap();
        let depth_barrier = graph.barriers(sample).image_barriers.iter().find(|b| b.handle == depth).unwrap();
        assert_eq!(depth_barrier.src_state, RgImageState::DEPTH_ATTACHMENT_READ_ONLY);
        assert_eq!(depth_barrier.aspect, vk::ImageAspectFlags::DEPTH);

        graph.execute(&mut device);
        let depth_layouts = device
            .barriers
            .iter()
            .filter(|b| b.image == depth_physical)
            .map(|b| (b.old_layout, b.new_layout))
            .collect_vec();
        assert_eq!(
            depth_layouts,
            vec![
                (vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL, vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL),
                (vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
                (vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            ]
        );
        assert_eq!(device.log, vec!["begin depth-test", "end", "begin depth-sample", "end"]);
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let mut other = RenderGraphBuilder::new();
        let mut device = MockDevice::default();
        let foreign = import_color(&mut other, &mut device);
        // 让 foreign 在本 builder 的 slotmap 中越界
        let _ = other.import_image("pad", GfxImageHandle::default(), desc(), RgImageState::UNDEFINED);

        let mut builder = RenderGraphBuilder::new();
        builder.add_pass_lambda(
            "reads-foreign",
            move |b| {
                b.read_image(foreign, RgImageState::SHADER_READ_FRAGMENT);
                b.never_cull();
            },
            |_| Ok(()),
        );

        assert!(matches!(builder.compile(), Err(RgError::UnknownImage { .. })));
    }
}
