//! 离线缓存层
//!
//! - `generation` - 一代缓存（版本号 → 条目）
//! - `storage` - 多代存储、配额与快照
//! - `routing` - 请求分类
//! - `asset_cache` - 安装 / 激活 / 拦截请求

pub mod asset_cache;
pub mod generation;
pub mod routing;
pub mod storage;

pub use asset_cache::{AssetCache, InstallOutcome};
pub use generation::CacheGeneration;
pub use routing::{RouteKind, RoutingPolicy};
pub use storage::{CacheSnapshot, CacheStorage, DEFAULT_QUOTA_BYTES};
