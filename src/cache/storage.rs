//! 缓存存储：管理多代缓存，并负责配额和快照持久化

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::generation::CacheGeneration;
use crate::error::{AppError, AppResult, CacheError};
use crate::infrastructure::Response;

/// 默认配额 50 MB
pub const DEFAULT_QUOTA_BYTES: usize = 50 * 1024 * 1024;

/// 缓存存储
#[derive(Debug)]
pub struct CacheStorage {
    generations: BTreeMap<String, CacheGeneration>,
    quota: usize,
}

impl CacheStorage {
    pub fn new(quota: usize) -> Self {
        Self {
            generations: BTreeMap::new(),
            quota,
        }
    }

    pub fn quota(&self) -> usize {
        self.quota
    }

    pub fn usage(&self) -> usize {
        self.generations.values().map(CacheGeneration::size).sum()
    }

    pub fn available(&self) -> usize {
        self.quota.saturating_sub(self.usage())
    }

    pub fn has(&self, id: &str) -> bool {
        self.generations.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&CacheGeneration> {
        self.generations.get(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.generations.keys().cloned().collect()
    }

    /// 放入一整代（同名代会被替换）
    pub fn insert_generation(&mut self, generation: CacheGeneration) -> Result<(), CacheError> {
        let existing = self
            .generations
            .get(generation.id())
            .map(CacheGeneration::size)
            .unwrap_or(0);
        let available = self.quota.saturating_sub(self.usage() - existing);

        if generation.size() > available {
            return Err(CacheError::QuotaExceeded {
                needed: generation.size(),
                available,
            });
        }

        self.generations
            .insert(generation.id().to_string(), generation);
        Ok(())
    }

    /// 向已存在的某一代写入单个条目
    pub fn put(&mut self, id: &str, key: &str, response: Response) -> Result<(), CacheError> {
        let available = self.available();
        let generation = self
            .generations
            .get_mut(id)
            .ok_or_else(|| CacheError::UnknownGeneration(id.to_string()))?;

        let growth = generation.growth_for(key, &response);
        if growth > available {
            return Err(CacheError::QuotaExceeded {
                needed: growth,
                available,
            });
        }

        generation.put(key, response);
        Ok(())
    }

    pub fn match_in(&self, id: &str, key: &str) -> Option<Response> {
        self.generations
            .get(id)
            .and_then(|generation| generation.get(key))
            .cloned()
    }

    pub fn delete(&mut self, id: &str) -> bool {
        self.generations.remove(id).is_some()
    }

    /// 只保留 `keep`，返回被删除的代
    pub fn retain_only(&mut self, keep: &str) -> Vec<String> {
        let removed: Vec<String> = self
            .generations
            .keys()
            .filter(|id| id.as_str() != keep)
            .cloned()
            .collect();
        for id in &removed {
            self.generations.remove(id);
        }
        removed
    }

    pub(crate) fn cloned_generations(&self) -> Vec<CacheGeneration> {
        self.generations.values().cloned().collect()
    }
}

/// 缓存快照（落盘格式）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub active: Option<String>,
    pub waiting: Option<String>,
    pub generations: Vec<CacheGeneration>,
}

impl CacheSnapshot {
    /// 写入快照文件（先写临时文件再改名）
    pub async fn save(&self, path: &Path) -> AppResult<()> {
        let shown = path.display().to_string();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::file_write_failed(&shown, e))?;
        }

        let content = serde_json::to_vec(self)
            .map_err(|e| AppError::Other(format!("无法序列化缓存快照: {}", e)))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| AppError::file_write_failed(&shown, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| AppError::file_write_failed(&shown, e))?;

        debug!("缓存快照已保存: {}", shown);
        Ok(())
    }

    /// 读取快照；文件不存在或内容损坏时返回 `None`
    pub async fn load(path: &Path) -> Option<Self> {
        let content = match tokio::fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("无法读取缓存快照 {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice::<CacheSnapshot>(&content) {
            Ok(mut snapshot) => {
                for generation in &mut snapshot.generations {
                    generation.recompute_size();
                }
                Some(snapshot)
            }
            Err(e) => {
                warn!("缓存快照已损坏，忽略 {}: {}", path.display(), e);
                None
            }
        }
    }
}
