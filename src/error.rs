use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 网络请求失败（不可达或非 2xx 状态）
    Fetch(FetchError),
    /// 响应内容无法解析
    Parse(ParseError),
    /// 缓存写入或生命周期错误
    Cache(CacheError),
    /// 文件操作错误
    File(FileError),
    /// 配置错误
    Config(ConfigError),
    /// 离线 worker 通道已关闭
    Worker(String),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Fetch(e) => write!(f, "网络错误: {}", e),
            AppError::Parse(e) => write!(f, "解析错误: {}", e),
            AppError::Cache(e) => write!(f, "缓存错误: {}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Worker(msg) => write!(f, "worker 错误: {}", msg),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Fetch(e) => Some(e),
            AppError::Parse(e) => Some(e),
            AppError::Cache(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Worker(_) | AppError::Other(_) => None,
        }
    }
}

/// 网络请求错误
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// 网络不可达
    #[error("请求 {url} 失败: {message}")]
    Network { url: String, message: String },
    /// 服务器返回非成功状态
    #[error("请求 {url} 返回状态码 {status}")]
    Status { url: String, status: u16 },
    /// 非法 URL
    #[error("无法解析 URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

/// 响应解析错误
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 不是合法的 JSON
    #[error("{url} 不是合法的 JSON: {source}")]
    InvalidJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    /// 顶层不是数组
    #[error("{url} 的顶层结构必须是数组")]
    NotAList { url: String },
}

/// 题目记录校验错误（只影响单条记录，不向上传播）
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// 记录结构无法识别
    #[error("第 {index} 条记录格式错误: {reason}")]
    Malformed { index: usize, reason: String },
    /// 题干为空
    #[error("第 {index} 条记录题干为空")]
    EmptyQuestion { index: usize },
    /// 选项数量不足
    #[error("第 {index} 条记录只有 {count} 个有效选项")]
    TooFewChoices { index: usize, count: usize },
    /// 缺少正确答案
    #[error("第 {index} 条记录缺少 correctKey")]
    MissingCorrectKey { index: usize },
    /// 正确答案不在选项中
    #[error("第 {index} 条记录的 correctKey '{key}' 不在选项中")]
    UnknownCorrectKey { index: usize, key: String },
}

/// 缓存错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// 超出存储配额
    #[error("超出缓存配额: 需要 {needed} 字节, 剩余 {available} 字节")]
    QuotaExceeded { needed: usize, available: usize },
    /// 代不存在
    #[error("缓存代 {0} 不存在")]
    UnknownGeneration(String),
    /// 当前没有等待激活的代
    #[error("当前没有等待激活的缓存代")]
    NothingWaiting,
    /// 安装中止
    #[error("缓存代 {generation} 安装中止 ({asset}): {reason}")]
    InstallAborted {
        generation: String,
        asset: String,
        reason: String,
    },
}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 读取文件失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// TOML 解析失败
    TomlParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::ReadFailed { path, source } => {
                write!(f, "读取文件失败 ({}): {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "写入文件失败 ({}): {}", path, source)
            }
            FileError::TomlParseFailed { path, source } => {
                write!(f, "TOML解析失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. }
            | FileError::WriteFailed { source, .. }
            | FileError::TomlParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
        }
    }
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 基础 URL 无法解析
    InvalidBaseUrl { value: String, message: String },
    /// 数据源类型未知
    UnknownSourceKind { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidBaseUrl { value, message } => {
                write!(f, "基础 URL '{}' 无法解析: {}", value, message)
            }
            ConfigError::UnknownSourceKind { value } => {
                write!(f, "未知的数据源类型: {}", value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从常见错误类型转换 ==========

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        AppError::Fetch(err)
    }
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        AppError::Parse(err)
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::Cache(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: String::new(), // TOML错误通常不包含路径信息
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// worker 已退出
    pub fn worker_gone() -> Self {
        AppError::Worker("离线 worker 已停止".to_string())
    }

    /// 是否为网络层失败（用于决定是否回退到缓存）
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, AppError::Fetch(_))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
