//! 题目标记存储 - 业务能力层
//!
//! 只负责本地的"标记 / 取消标记 / 导出"，远端提交由 FlagClient 负责

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rand::Rng;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{FlagExport, FlagRecord, Question, QuestionSnapshot};

pub const FLAGS_FILE: &str = "c17_flags.json";
pub const DEVICE_ID_FILE: &str = "c17_device_id";
pub const EXPORT_FILE: &str = "flags_export.json";

/// 标记存储
///
/// 职责：
/// - 维护 题目 id → 标记 的本地记录
/// - 维护本设备的持久 id
/// - 每次修改立即写盘
pub struct FlagStore {
    dir: PathBuf,
    flags: BTreeMap<String, FlagRecord>,
    device_id: String,
}

impl FlagStore {
    /// 打开（或创建）数据目录下的标记存储
    ///
    /// # 参数
    /// - `dir`: 数据目录
    ///
    /// # 返回
    /// 标记文件损坏时按空记录处理；设备 id 不存在时生成并保存
    pub async fn open(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::file_write_failed(dir.display().to_string(), e))?;

        let flags = load_flags(&dir.join(FLAGS_FILE)).await;
        let device_id = load_or_create_device_id(&dir.join(DEVICE_ID_FILE)).await?;
        debug!("标记存储: {} 条记录, 设备 {}", flags.len(), device_id);

        Ok(Self {
            dir,
            flags,
            device_id,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn is_flagged(&self, id: &str) -> bool {
        self.flags.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&FlagRecord> {
        self.flags.get(id)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// 保存标记，覆盖同一题目之前的标记
    pub async fn save(&mut self, question: &Question, text: &str) -> AppResult<FlagRecord> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Other("标记内容不能为空".to_string()));
        }

        let record = FlagRecord {
            text: text.to_string(),
            saved_at: Utc::now(),
            question_snapshot: QuestionSnapshot::from(question),
        };
        self.flags.insert(question.id.clone(), record.clone());
        self.persist().await?;

        info!("🚩 已标记题目 {}", question.id);
        Ok(record)
    }

    /// 取消标记
    ///
    /// # 返回
    /// 原来是否有标记
    pub async fn clear(&mut self, id: &str) -> AppResult<bool> {
        if self.flags.remove(id).is_none() {
            return Ok(false);
        }
        self.persist().await?;
        info!("已取消标记 {}", id);
        Ok(true)
    }

    /// 导出全部标记到数据目录下的 `flags_export.json`
    ///
    /// # 返回
    /// 导出文件路径与条数
    pub async fn export(&self, app_version: &str) -> AppResult<(PathBuf, usize)> {
        let rows: Vec<FlagExport> = self
            .flags
            .values()
            .map(|record| FlagExport {
                snapshot: record.question_snapshot.clone(),
                flag_text: record.text.clone(),
                saved_at: record.saved_at,
                device_id: self.device_id.clone(),
                app_version: app_version.to_string(),
            })
            .collect();

        let path = self.dir.join(EXPORT_FILE);
        let json = serde_json::to_string_pretty(&rows)
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
        fs::write(&path, json)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

        info!("📤 已导出 {} 条标记到 {}", rows.len(), path.display());
        Ok((path, rows.len()))
    }

    async fn persist(&self) -> AppResult<()> {
        let path = self.dir.join(FLAGS_FILE);
        let json = serde_json::to_string_pretty(&self.flags)
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
        fs::write(&path, json)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))
    }
}

async fn load_flags(path: &Path) -> BTreeMap<String, FlagRecord> {
    let Ok(content) = fs::read_to_string(path).await else {
        return BTreeMap::new();
    };
    match serde_json::from_str(&content) {
        Ok(flags) => flags,
        Err(e) => {
            warn!("⚠️ 标记文件 {} 已损坏，忽略: {}", path.display(), e);
            BTreeMap::new()
        }
    }
}

async fn load_or_create_device_id(path: &Path) -> AppResult<String> {
    if let Ok(existing) = fs::read_to_string(path).await {
        let existing = existing.trim();
        if !existing.is_empty() {
            return Ok(existing.to_string());
        }
    }

    let id = generate_device_id(&mut rand::thread_rng(), Utc::now().timestamp_millis());
    fs::write(path, &id)
        .await
        .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
    Ok(id)
}

/// 生成 `dev-<随机 base36><时间戳 base36>` 形式的设备 id
pub fn generate_device_id<R: Rng>(rng: &mut R, now_millis: i64) -> String {
    let random: u64 = rng.gen();
    format!(
        "dev-{}{}",
        to_base36(random % 36u64.pow(10)),
        to_base36(now_millis.max(0) as u64)
    )
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
