use slotmap::new_key_type;

new_key_type! {
    /// 物理 Image Handle
    ///
    /// 由 `GfxDevice` 分配，指向后端持有的一张图像。
    pub struct GfxImageHandle;

    /// Mesh Handle，指向后端持有的几何数据
    pub struct GfxMeshHandle;

    /// 已解析的着色程序 Handle
    pub struct GfxProgramHandle;
}
