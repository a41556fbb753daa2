use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::cache::{RoutingPolicy, DEFAULT_QUOTA_BYTES};
use crate::error::{AppError, AppResult, ConfigError, FileError};
use crate::models::{QuestionSource, StudyMode};

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "study.toml";

/// 程序配置文件
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 应用版本（随标记上报）
    pub app_version: String,
    /// 站点根地址，相对路径都按它解析
    pub base_url: String,
    // --- 离线缓存 ---
    pub cache_prefix: String,
    pub cache_version: String,
    /// 安装时预取的资源
    pub assets: Vec<String>,
    /// 网络优先的数据文件
    pub volatile_files: Vec<String>,
    /// worker 自身的脚本，永不缓存
    pub worker_script: String,
    pub cache_quota_bytes: usize,
    /// 安装完成后是否立即激活
    pub auto_activate: bool,
    // --- 题库 ---
    pub sources: Vec<QuestionSource>,
    pub shuffle: bool,
    pub default_mode: StudyMode,
    pub show_reference: bool,
    // --- 本地数据与标记 ---
    pub data_dir: String,
    /// 标记提交地址，为空时只保存在本地
    pub flag_endpoint: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_version: "v1.2.1".to_string(),
            base_url: "http://localhost:8080/".to_string(),
            cache_prefix: "c17-study-cache-".to_string(),
            cache_version: "v12.32".to_string(),
            assets: [
                "./",
                "./index.html",
                "./style.css",
                "./app.js",
                "./questions.json",
                "./questions_mc.json",
                "./manifest.json",
                "./service-worker.js",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            volatile_files: vec!["questions.json".to_string(), "questions_mc.json".to_string()],
            worker_script: "service-worker.js".to_string(),
            cache_quota_bytes: DEFAULT_QUOTA_BYTES,
            auto_activate: false,
            sources: vec![
                QuestionSource::free_response("questions.json"),
                QuestionSource::multiple_choice("questions_mc.json"),
            ],
            shuffle: true,
            default_mode: StudyMode::Flashcard,
            show_reference: false,
            data_dir: ".study".to_string(),
            flag_endpoint: String::new(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 默认值 + 环境变量
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// 从 TOML 文件读取，缺省字段取默认值
    pub async fn from_file(path: &Path) -> AppResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        Self::from_toml(&content).map_err(|e| match e {
            AppError::File(FileError::TomlParseFailed { source, .. }) => {
                AppError::File(FileError::TomlParseFailed {
                    path: path.display().to_string(),
                    source,
                })
            }
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 配置文件（`STUDY_CONFIG`，默认 `study.toml`，不存在则跳过）+ 环境变量
    pub async fn load() -> AppResult<Self> {
        let path = std::env::var("STUDY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let path = PathBuf::from(path);

        let mut config = if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!("读取配置文件 {}", path.display());
            Self::from_file(&path).await?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.base_url()?;
        Ok(config)
    }

    /// 用环境变量覆盖；无法解析的值保留原值
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, current: T) -> T {
            match raw {
                Some(v) => v.trim().parse().unwrap_or_else(|_| {
                    warn!("环境变量 {}='{}' 无法解析，保留原值", key, v);
                    current
                }),
                None => current,
            }
        }

        if let Some(v) = lookup("STUDY_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("STUDY_CACHE_VERSION") {
            self.cache_version = v;
        }
        if let Some(v) = lookup("STUDY_DATA_DIR") {
            self.data_dir = v;
        }
        if let Some(v) = lookup("STUDY_FLAG_ENDPOINT") {
            self.flag_endpoint = v;
        }
        if let Some(v) = lookup("STUDY_APP_VERSION") {
            self.app_version = v;
        }
        if let Some(v) = lookup("STUDY_SOURCES") {
            match v
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(QuestionSource::parse_spec)
                .collect::<Result<Vec<_>, ConfigError>>()
            {
                Ok(sources) => self.sources = sources,
                Err(e) => warn!("STUDY_SOURCES 无法解析，保留原值: {}", e),
            }
        }
        self.shuffle = parse_or("STUDY_SHUFFLE", lookup("STUDY_SHUFFLE"), self.shuffle);
        self.default_mode = parse_or("STUDY_MODE", lookup("STUDY_MODE"), self.default_mode);
        self.auto_activate = parse_or("STUDY_AUTO_ACTIVATE", lookup("STUDY_AUTO_ACTIVATE"), self.auto_activate);
        self.cache_quota_bytes = parse_or("STUDY_CACHE_QUOTA", lookup("STUDY_CACHE_QUOTA"), self.cache_quota_bytes);
        self.verbose_logging = parse_or("VERBOSE_LOGGING", lookup("VERBOSE_LOGGING"), self.verbose_logging);
    }

    /// 当前缓存代的 id，例如 `c17-study-cache-v12.32`
    pub fn generation_id(&self) -> String {
        format!("{}{}", self.cache_prefix, self.cache_version)
    }

    /// 解析站点根地址；补全末尾的 `/`，保证相对路径落在同一目录下
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|e| ConfigError::InvalidBaseUrl {
            value: self.base_url.clone(),
            message: e.to_string(),
        })
    }

    pub fn routing_policy(&self) -> RoutingPolicy {
        RoutingPolicy::new(self.worker_script.clone(), self.volatile_files.clone())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    /// 缓存快照文件
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir().join("cache.json")
    }
}
