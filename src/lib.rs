//! # Flashcard Study
//!
//! 一个可离线使用的刷题（闪卡 / 选择题）应用核心
//!
//! ## 架构设计
//!
//! 本系统分为五层：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 只暴露"发请求、拿响应"的能力
//! - `HttpTransport` - 基于 reqwest 的真实网络
//! - `MemoryTransport` - 内存路由，可切换离线
//!
//! ### ② 离线缓存层（Cache）
//! - `cache/` - 按版本分代的资源缓存
//! - `AssetCache` - 安装 / 激活 / 按路由策略拦截请求
//!
//! ### ③ Worker 层
//! - `worker/` - 独立任务中运行的离线 worker，只通过消息通信
//! - `OfflineWorker` - 唯一持有 AssetCache
//! - `WorkerHandle` - 页面侧句柄，本身也是一个 Transport
//!
//! ### ④ 业务能力层（Services / Clients）
//! - `QuestionStore` - 加载并规范化题库，单个数据源失败不影响整体
//! - `FilterEngine` - 筛选、乱序、循环游标
//! - `UpdateController` - 更新发布状态机，每次激活只重载一次
//! - `FlagStore` / `FlagClient` - 本地标记与远端提交
//!
//! ### ⑤ 展示层（App）
//! - `App` - 终端交互，把命令转成对上述服务的调用
//!
//! ## 模块结构

pub mod app;
pub mod cache;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;
pub mod worker;

// 重新导出常用类型
pub use app::{App, Command};
pub use cache::{AssetCache, InstallOutcome};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{HttpTransport, MemoryTransport, Request, Response, Transport};
pub use models::{FilterState, Question, QuestionKind, QuestionSource, SourceKind, StudyMode};
pub use services::{FilterEngine, QuestionStore, UpdateController};
pub use worker::{OfflineWorker, WorkerHandle};
