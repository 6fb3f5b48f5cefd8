use crate::gfx::GfxProgramHandle;

/// 已解析的着色程序
///
/// 只有通过 `GfxProgramLibrary::find_program` 才能得到，因此持有一个 `GfxProgram`
/// 就意味着程序已经存在，不会出现“空材质”的执行。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GfxProgram {
    handle: GfxProgramHandle,
    name: String,
    pass_count: u32,
}

impl GfxProgram {
    /// 仅供后端在解析成功后构造
    pub fn new(handle: GfxProgramHandle, name: impl Into<String>, pass_count: u32) -> Self {
        Self {
            handle,
            name: name.into(),
            pass_count,
        }
    }

    #[inline]
    pub fn handle(&self) -> GfxProgramHandle {
        self.handle
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn pass_count(&self) -> u32 {
        self.pass_count
    }
}

/// 按名字查找着色程序
pub trait GfxProgramLibrary {
    fn find_program(&self, name: &str) -> Option<GfxProgram>;
}
