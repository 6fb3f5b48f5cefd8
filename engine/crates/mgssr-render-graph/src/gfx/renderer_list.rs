use std::cmp::Ordering;

use itertools::Itertools;

use crate::gfx::GfxMeshHandle;

/// 着色器 pass 标签
///
/// renderer list 只收集带有指定标签的物体。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderTagId(pub &'static str);

/// 渲染队列范围（闭区间）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderQueueRange {
    pub min: u32,
    pub max: u32,
}

impl RenderQueueRange {
    pub const ALL: Self = Self { min: 0, max: 5000 };
    pub const OPAQUE: Self = Self { min: 0, max: 2500 };
    pub const TRANSPARENT: Self = Self { min: 2501, max: 5000 };

    #[inline]
    pub fn contains(&self, queue: u32) -> bool {
        (self.min..=self.max).contains(&queue)
    }
}

/// 排序方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortingCriteria {
    #[default]
    None,
    /// 不透明物体：由近到远，减少 overdraw
    CommonOpaque,
    /// 透明物体：由远到近
    CommonTransparent,
}

/// 宿主提交的一个绘制项
#[derive(Clone, Debug)]
pub struct DrawItem {
    pub mesh: GfxMeshHandle,
    pub model: glam::Mat4,
    pub render_queue: u32,
    pub shader_tag: ShaderTagId,
    /// 每个物体的实例参数，由覆盖程序自行解释
    pub object_params: glam::Vec4,
}

/// renderer list 的构建参数
pub struct RendererListDesc<'a> {
    pub shader_tags: &'a [ShaderTagId],
    pub queue_range: RenderQueueRange,
    pub sorting: SortingCriteria,
    pub camera_position: glam::Vec3,
}

/// 过滤、排序之后的绘制列表
#[derive(Clone, Debug, Default)]
pub struct RendererList {
    draws: Vec<DrawItem>,
}

impl RendererList {
    /// 从宿主的裁剪结果中构建 renderer list
    pub fn build(items: &[DrawItem], desc: &RendererListDesc<'_>) -> Self {
        let camera_distance = |item: &DrawItem| item.model.w_axis.truncate().distance_squared(desc.camera_position);

        let mut draws = items
            .iter()
            .filter(|item| desc.queue_range.contains(item.render_queue))
            .filter(|item| desc.shader_tags.contains(&item.shader_tag))
            .cloned()
            .collect_vec();

        match desc.sorting {
            SortingCriteria::None => {}
            SortingCriteria::CommonOpaque => draws.sort_by(|a, b| {
                a.render_queue
                    .cmp(&b.render_queue)
                    .then_with(|| camera_distance(a).partial_cmp(&camera_distance(b)).unwrap_or(Ordering::Equal))
            }),
            SortingCriteria::CommonTransparent => draws.sort_by(|a, b| {
                a.render_queue
                    .cmp(&b.render_queue)
                    .then_with(|| camera_distance(b).partial_cmp(&camera_distance(a)).unwrap_or(Ordering::Equal))
            }),
        }

        Self { draws }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.draws.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &DrawItem> {
        self.draws.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn item(queue: u32, tag: &'static str, z: f32) -> DrawItem {
        DrawItem {
            mesh: GfxMeshHandle::from(KeyData::from_ffi(1)),
            model: glam::Mat4::from_translation(glam::vec3(0.0, 0.0, z)),
            render_queue: queue,
            shader_tag: ShaderTagId(tag),
            object_params: glam::Vec4::ZERO,
        }
    }

    #[test]
    fn test_opaque_filter_and_front_to_back() {
        let items = vec![
            item(2000, "UniversalForward", -10.0),
            item(3000, "UniversalForward", -1.0),
            item(2000, "UniversalForward", -2.0),
            item(2000, "ShadowCaster", -3.0),
        ];
        let desc = RendererListDesc {
            shader_tags: &[ShaderTagId("UniversalForward")],
            queue_range: RenderQueueRange::OPAQUE,
            sorting: SortingCriteria::CommonOpaque,
            camera_position: glam::Vec3::ZERO,
        };

        let list = RendererList::build(&items, &desc);

        assert_eq!(list.len(), 2);
        let zs = list.iter().map(|d| d.model.w_axis.z).collect_vec();
        assert_eq!(zs, vec![-2.0, -10.0]);
    }
}
