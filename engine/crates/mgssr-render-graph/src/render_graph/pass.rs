//! Pass 定义和构建器
//!
//! 提供 `RgPass` trait 用于声明式定义渲染 Pass，
//! 以及 `RgPassBuilder` 用于在 setup 阶段声明资源依赖。

use slotmap::SecondaryMap;

use crate::gfx::{GfxCommandEncoder, GfxImageHandle};
use crate::render_graph::{
    RgError, RgGlobalTextureKey, RgGlobalTextures, RgImageDesc, RgImageHandle, RgImageResource, RgImageState,
    RgResourceRegistry,
};

/// Pass 执行时的上下文
///
/// 提供 Pass 执行所需的资源访问和命令录制接口。
pub struct RgPassContext<'a> {
    /// 命令录制接口
    pub cmd: &'a mut dyn GfxCommandEncoder,

    pub(crate) pass_name: &'a str,
    /// 物理资源查询表（执行时填充）
    pub(crate) image_handles: &'a SecondaryMap<RgImageHandle, GfxImageHandle>,
}

impl RgPassContext<'_> {
    /// 获取图像的物理句柄
    ///
    /// 只有本 pass 在 setup 中声明过的图像才保证有物理资源。
    #[inline]
    pub fn get_image(&self, handle: RgImageHandle) -> Result<GfxImageHandle, RgError> {
        self.image_handles.get(handle).copied().ok_or(RgError::MissingPhysicalImage(handle))
    }

    #[inline]
    pub fn pass_name(&self) -> &str {
        self.pass_name
    }
}

/// Pass 构建器
///
/// 在 `RgPass::setup()` 中使用，声明 Pass 的资源依赖。
pub struct RgPassBuilder<'a> {
    /// Pass 名称
    pub(crate) name: String,

    /// 图像读取列表
    pub(crate) image_reads: Vec<(RgImageHandle, RgImageState)>,
    /// 图像写入列表
    pub(crate) image_writes: Vec<(RgImageHandle, RgImageState)>,

    /// 不参与裁剪
    pub(crate) never_cull: bool,
    /// 本 pass 发布的全局纹理
    pub(crate) published: Vec<RgGlobalTextureKey>,

    /// 资源注册表引用（用于创建临时资源）
    pub(crate) resources: &'a mut RgResourceRegistry,
    pub(crate) globals: &'a mut RgGlobalTextures,
    /// setup 阶段产生的错误，在 compile 时统一报告
    pub(crate) errors: &'a mut Vec<RgError>,
}

impl RgPassBuilder<'_> {
    /// 声明读取图像
    ///
    /// # 参数
    /// - `handle`: 要读取的图像句柄
    /// - `state`: 期望的图像状态（用于自动生成 barrier）
    ///
    /// # 返回
    /// 返回相同的句柄（语义上表示读取后的引用）
    #[inline]
    pub fn read_image(&mut self, handle: RgImageHandle, state: RgImageState) -> RgImageHandle {
        self.image_reads.push((handle, state));
        handle
    }

    /// 声明写入图像
    ///
    /// # 参数
    /// - `handle`: 要写入的图像句柄
    /// - `state`: 写入时的图像状态
    ///
    /// # 返回
    /// 返回相同的句柄（依赖通过 Pass 顺序确定）
    pub fn write_image(&mut self, handle: RgImageHandle, state: RgImageState) -> RgImageHandle {
        self.image_writes.push((handle, state));
        handle
    }

    /// 声明读写图像（同时读取和写入）
    pub fn read_write_image(&mut self, handle: RgImageHandle, state: RgImageState) -> RgImageHandle {
        self.read_image(handle, state);
        self.write_image(handle, state)
    }

    /// 创建临时图像
    ///
    /// 图像在第一次被使用前分配，graph 执行完毕后自动销毁。
    pub fn create_image(&mut self, name: impl Into<String>, desc: RgImageDesc) -> RgImageHandle {
        self.resources.register_image(RgImageResource::transient(name, desc))
    }

    /// 查询已声明图像的描述
    #[inline]
    pub fn image_desc(&self, handle: RgImageHandle) -> Option<&RgImageDesc> {
        self.resources.get_image(handle).map(|r| &r.desc)
    }

    /// 标记该 pass 不参与裁剪
    ///
    /// 即使没有任何 pass 读取它的输出也会执行。
    pub fn never_cull(&mut self) {
        self.never_cull = true;
    }

    /// 在本 pass 完成后把 `handle` 发布为全局纹理
    ///
    /// 发布本身即是一种“外部可见”的副作用，因此发布者不会被裁剪。
    /// 同一帧内重复发布同一个 key 会在 compile 时报 `RgError::DuplicateGlobal`。
    pub fn publish_global(&mut self, key: RgGlobalTextureKey, handle: RgImageHandle) {
        match self.globals.publish(key, handle, &self.name) {
            Ok(()) => self.published.push(key),
            Err(first) => {
                log::error!("global texture '{}' published twice ('{}', '{}')", key.name(), first, self.name);
                self.errors.push(RgError::DuplicateGlobal {
                    key: key.name(),
                    first,
                    second: self.name.clone(),
                });
            }
        }
    }

    /// 查询之前的 pass 发布的全局纹理
    ///
    /// 只是查询，读取依赖仍需通过 `read_image` 声明。
    #[inline]
    pub fn global_image(&self, key: RgGlobalTextureKey) -> Option<RgImageHandle> {
        self.globals.get(key)
    }
}

/// Pass 节点数据（编译后使用）
pub struct RgPassNode<'a> {
    /// Pass 名称
    pub name: String,

    /// 图像读取
    pub image_reads: Vec<(RgImageHandle, RgImageState)>,
    /// 图像写入
    pub image_writes: Vec<(RgImageHandle, RgImageState)>,

    pub never_cull: bool,
    pub published: Vec<RgGlobalTextureKey>,

    /// 执行回调（类型擦除的 Pass 实现）
    pub(crate) executor: Box<dyn RgPassExecutor + 'a>,
}

impl RgPassNode<'_> {
    /// 本 pass 访问的所有图像（去重，读在前）
    pub fn touched_images(&self) -> Vec<RgImageHandle> {
        let mut images: Vec<RgImageHandle> = Vec::new();
        for (handle, _) in self.image_reads.iter().chain(self.image_writes.iter()) {
            if !images.contains(handle) {
                images.push(*handle);
            }
        }
        images
    }
}

/// 类型擦除的 Pass 执行器 trait
pub(crate) trait RgPassExecutor {
    /// 执行 Pass
    fn execute(&self, ctx: &mut RgPassContext<'_>) -> Result<(), RgError>;
}

/// 包装用户 Pass 实现的执行器
pub(crate) struct RgPassExecutorWrapper<P: RgPass> {
    pub pass: P,
}

impl<P: RgPass> RgPassExecutor for RgPassExecutorWrapper<P> {
    fn execute(&self, ctx: &mut RgPassContext<'_>) -> Result<(), RgError> {
        self.pass.execute(ctx)
    }
}

/// RgPass trait
///
/// 定义渲染图中的一个 Pass。用户需要实现此 trait 来创建自定义 Pass。
///
/// # 线程安全
///
/// Pass 不需要是 Send + Sync，因为 RenderGraph 在单线程中构建和执行。
/// Pass 可以借用外部资源，生命周期由 RenderGraphBuilder 的生命周期参数约束。
pub trait RgPass {
    /// 声明 Pass 的资源依赖
    ///
    /// 在此方法中使用 `RgPassBuilder` 声明读取和写入的资源。
    fn setup(&mut self, builder: &mut RgPassBuilder);

    /// 执行 Pass 的渲染逻辑
    ///
    /// 返回错误时该 pass 被视为跳过，依赖它的 pass 也会被跳过。
    fn execute(&self, ctx: &mut RgPassContext<'_>) -> Result<(), RgError>;
}

/// 闭包形式的 Pass
pub(crate) struct RgLambdaPass<S, E> {
    pub setup: S,
    pub exec: E,
}

impl<S, E> RgPass for RgLambdaPass<S, E>
where
    S: FnMut(&mut RgPassBuilder),
    E: Fn(&mut RgPassContext<'_>) -> Result<(), RgError>,
{
    fn setup(&mut self, builder: &mut RgPassBuilder) {
        (self.setup)(builder)
    }

    fn execute(&self, ctx: &mut RgPassContext<'_>) -> Result<(), RgError> {
        (self.exec)(ctx)
    }
}
