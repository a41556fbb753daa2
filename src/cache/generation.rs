use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::infrastructure::Response;

/// 一代缓存：一个版本号对应的一组 (请求键 → 响应)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheGeneration {
    id: String,
    entries: BTreeMap<String, Response>,
    #[serde(default)]
    size: usize,
}

impl CacheGeneration {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entries: BTreeMap::new(),
            size: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, key: &str) -> Option<&Response> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// 写入（覆盖）一个条目，返回被覆盖条目的大小
    pub fn put(&mut self, key: impl Into<String>, response: Response) -> usize {
        let added = response.size();
        let replaced = self
            .entries
            .insert(key.into(), response)
            .map(|old| old.size())
            .unwrap_or(0);
        self.size = self.size + added - replaced;
        replaced
    }

    /// 覆盖 `key` 后占用大小的变化量（只增不减部分）
    pub fn growth_for(&self, key: &str, response: &Response) -> usize {
        let old = self.entries.get(key).map(|r| r.size()).unwrap_or(0);
        response.size().saturating_sub(old)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// 反序列化后重新计算大小（快照里的 size 不可信）
    pub(crate) fn recompute_size(&mut self) {
        self.size = self.entries.values().map(Response::size).sum();
    }
}
