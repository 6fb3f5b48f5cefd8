//! 帧内全局纹理表
//!
//! 某些 pass 的输出需要被“按名字”绑定（例如作为所有后续程序可见的全局纹理）。
//! 这里用显式的、只在一个 graph 内有效的注册表代替进程级的全局状态：
//! 发布者在 setup 阶段发布，读取者在 setup 阶段查询并声明真实的读依赖。

use std::collections::HashMap;

use crate::render_graph::RgImageHandle;

/// 全局纹理的强类型 key
///
/// 只能以常量形式声明，避免在各处手写字符串。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgGlobalTextureKey {
    name: &'static str,
}

impl RgGlobalTextureKey {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[derive(Clone, Debug)]
struct GlobalEntry {
    image: RgImageHandle,
    publisher: String,
}

/// 全局纹理表
///
/// 每个 key 每帧只允许一个写入者。
#[derive(Default, Clone, Debug)]
pub struct RgGlobalTextures {
    entries: HashMap<RgGlobalTextureKey, GlobalEntry>,
}

impl RgGlobalTextures {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发布纹理
    ///
    /// # 返回
    /// - `Ok(())`: 发布成功
    /// - `Err(first_publisher)`: 该 key 已被发布，返回第一个发布者的名字
    pub fn publish(&mut self, key: RgGlobalTextureKey, image: RgImageHandle, publisher: &str) -> Result<(), String> {
        if let Some(entry) = self.entries.get(&key) {
            return Err(entry.publisher.clone());
        }
        self.entries.insert(
            key,
            GlobalEntry {
                image,
                publisher: publisher.to_string(),
            },
        );
        Ok(())
    }

    #[inline]
    pub fn get(&self, key: RgGlobalTextureKey) -> Option<RgImageHandle> {
        self.entries.get(&key).map(|e| e.image)
    }

    #[inline]
    pub fn publisher(&self, key: RgGlobalTextureKey) -> Option<&str> {
        self.entries.get(&key).map(|e| e.publisher.as_str())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    const KEY: RgGlobalTextureKey = RgGlobalTextureKey::new("_TestGlobal");

    #[test]
    fn test_single_writer_per_key() {
        let mut images: SlotMap<RgImageHandle, ()> = SlotMap::with_key();
        let a = images.insert(());
        let b = images.insert(());

        let mut globals = RgGlobalTextures::new();
        assert!(globals.publish(KEY, a, "first").is_ok());
        assert_eq!(globals.publish(KEY, b, "second"), Err("first".to_string()));
        assert_eq!(globals.get(KEY), Some(a));
        assert_eq!(globals.publisher(KEY), Some("first"));
    }

    #[test]
    fn test_unpublished_key_is_none() {
        let globals = RgGlobalTextures::new();
        assert!(globals.get(RgGlobalTextureKey::new("_Missing")).is_none());
        assert!(globals.is_empty());
    }
}
