use std::path::{Path, PathBuf};

/// 统一路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
///
/// # 使用示例
/// ```ignore
/// let settings = MgssrPath::config_path("ssr.toml");   // config/ssr.toml
/// let out = MgssrPath::output_path("ssr.png");         // target/mgssr-output/ssr.png
/// ```
pub struct MgssrPath {}
// 核心路径
impl MgssrPath {
    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        // 从当前包的位置推导workspace目录
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.parent().map(Path::to_path_buf).unwrap_or_else(|| manifest_dir.to_path_buf())
    }

    pub fn target_path() -> PathBuf {
        Self::workspace_path().join("target")
    }
}
// 根目录下
impl MgssrPath {
    /// 获取 `config/` 目录下的文件路径
    pub fn config_path(filename: &str) -> PathBuf {
        Self::workspace_path().join("config").join(filename)
    }

    /// 获取 demo 输出目录下的文件路径
    pub fn output_path(filename: &str) -> PathBuf {
        Self::target_path().join("mgssr-output").join(filename)
    }
}
