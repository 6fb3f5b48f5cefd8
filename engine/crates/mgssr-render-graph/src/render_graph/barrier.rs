//! Barrier 自动计算
//!
//! 根据资源状态转换自动生成 image memory barrier。

use ash::vk;
use slotmap::SecondaryMap;

use crate::gfx::{GfxImageBarrier, GfxImageHandle};
use crate::render_graph::{RgImageHandle, RgImageState, RgPassNode, RgResourceRegistry};

/// 图像 Barrier 描述
#[derive(Clone, Debug, PartialEq)]
pub struct RgImageBarrierDesc {
    /// 资源句柄（RenderGraph 内部）
    pub handle: RgImageHandle,
    /// 源状态
    pub src_state: RgImageState,
    /// 目标状态
    pub dst_state: RgImageState,
    /// 图像 aspect（COLOR / DEPTH / STENCIL）
    pub aspect: vk::ImageAspectFlags,
}

impl RgImageBarrierDesc {
    /// 创建新的图像 barrier 描述
    pub fn new(handle: RgImageHandle, src_state: RgImageState, dst_state: RgImageState) -> Self {
        Self {
            handle,
            src_state,
            dst_state,
            aspect: vk::ImageAspectFlags::COLOR,
        }
    }

    /// 设置 aspect
    pub fn with_aspect(mut self, aspect: vk::ImageAspectFlags) -> Self {
        self.aspect = aspect;
        self
    }

    /// 检查是否需要 barrier
    ///
    /// 如果 layout 相同且两侧都是只读，不需要 barrier
    pub fn needs_barrier(&self) -> bool {
        // Layout 不同一定需要 barrier
        if self.src_state.layout != self.dst_state.layout {
            return true;
        }

        // 有写操作需要 barrier（确保可见性）
        self.src_state.is_write() || self.dst_state.is_write()
    }

    /// 转换为 GfxImageBarrier
    pub fn to_gfx_barrier(&self, image: GfxImageHandle) -> GfxImageBarrier {
        GfxImageBarrier::new(image)
            .layout_transfer(self.src_state.layout, self.dst_state.layout)
            .src_mask(self.src_state.stage, self.src_state.src_access())
            .dst_mask(self.dst_state.stage, self.dst_state.access)
            .image_aspect_flag(self.aspect)
    }
}

/// Pass 执行前需要的 Barrier 集合
#[derive(Clone, Debug, Default)]
pub struct PassBarriers {
    /// 图像 barriers
    pub image_barriers: Vec<RgImageBarrierDesc>,
}

impl PassBarriers {
    /// 创建空的 barrier 集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加图像 barrier
    pub fn add_image_barrier(&mut self, barrier: RgImageBarrierDesc) {
        if barrier.needs_barrier() {
            self.image_barriers.push(barrier);
        }
    }

    /// 检查是否有 barrier
    pub fn has_barriers(&self) -> bool {
        !self.image_barriers.is_empty()
    }

    /// 获取图像 barrier 数量
    pub fn image_barrier_count(&self) -> usize {
        self.image_barriers.len()
    }

    /// 计算 pass 需要的 barriers，并把 `image_states` 推进到 pass 之后的状态
    ///
    /// 同一图像在一个 pass 中既读又写时，以写入状态为准。
    pub fn for_pass(
        pass: &RgPassNode<'_>,
        image_states: &mut SecondaryMap<RgImageHandle, RgImageState>,
        resources: &RgResourceRegistry,
    ) -> Self {
        let mut barriers = Self::new();

        // (handle, is_write, required_state)，保持声明顺序以便结果稳定
        let mut usage: Vec<(RgImageHandle, bool, RgImageState)> = Vec::new();
        for (handle, state) in &pass.image_reads {
            if !usage.iter().any(|(h, _, _)| h == handle) {
                usage.push((*handle, false, *state));
            }
        }
        for (handle, state) in &pass.image_writes {
            match usage.iter_mut().find(|(h, _, _)| h == handle) {
                Some(entry) => *entry = (*handle, true, *state),
                None => usage.push((*handle, true, *state)),
            }
        }

        for (handle, is_write, required_state) in usage {
            let Some(resource) = resources.get_image(handle) else {
                continue;
            };
            let crt_state = image_states.get(handle).copied().unwrap_or(resource.initial_state);

            barriers.add_image_barrier(
                RgImageBarrierDesc::new(handle, crt_state, required_state).with_aspect(resource.infer_aspect()),
            );

            // 如果是写入或 layout 改变，更新状态
            if is_write || crt_state.layout != required_state.layout {
                image_states.insert(handle, required_state);
            }
        }

        barriers
    }
}
