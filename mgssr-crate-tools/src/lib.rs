//! mgssr 工具集
//!
//! 提供日志初始化、工作区路径管理、TOML 配置加载等通用工具。
//!
//! # MgssrPath
//! 基于工作区根目录的统一路径管理，避免硬编码相对路径。
//!
//! # 配置加载
//! 作者期配置（例如 SSR 参数）以 TOML 文件保存，通过 `config::load_toml` 读取。

pub mod config;
pub mod init_log;
pub mod resource;
