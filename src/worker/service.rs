//! 离线 worker 事件循环
//!
//! worker 和页面是两个独立的任务，只通过通道通信：
//! - 页面 → worker：`WorkerCommand`（拦截请求、安装、控制消息）
//! - worker → 页面：`WorkerEvent` 广播

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::messages::{ControlMessage, WorkerEvent};
use crate::cache::{AssetCache, InstallOutcome};
use crate::error::{AppError, AppResult, FetchError};
use crate::infrastructure::{Request, Response, Transport};

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 16;

/// 页面发给 worker 的命令
pub enum WorkerCommand {
    Fetch {
        request: Request,
        reply: oneshot::Sender<AppResult<Response>>,
    },
    Install {
        generation: String,
        assets: Vec<String>,
        reply: oneshot::Sender<AppResult<InstallOutcome>>,
    },
    Message(JsonValue),
}

/// 离线 worker
///
/// 职责：
/// - 唯一持有 AssetCache
/// - 每个拦截到的请求单独起任务处理，互不阻塞
/// - 生命周期变化后广播事件并保存快照
pub struct OfflineWorker {
    cache: Arc<AssetCache>,
    events: broadcast::Sender<WorkerEvent>,
    snapshot_path: Option<PathBuf>,
}

impl OfflineWorker {
    pub fn new(cache: AssetCache) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            cache: Arc::new(cache),
            events,
            snapshot_path: None,
        }
    }

    /// 每次激活或安装后把缓存写到 `path`
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// 启动事件循环，返回页面侧句柄
    pub fn spawn(self) -> (WorkerHandle, JoinHandle<()>) {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        let handle = WorkerHandle {
            commands,
            events: self.events.clone(),
        };
        let join = tokio::spawn(Arc::new(self).run(rx));
        (handle, join)
    }

    async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<WorkerCommand>) {
        info!("🛠️ 离线 worker 已启动");

        while let Some(command) = rx.recv().await {
            match command {
                WorkerCommand::Fetch { request, reply } => {
                    let worker = Arc::clone(&self);
                    tokio::spawn(async move {
                        let result = worker.cache.handle(&request).await;
                        let _ = reply.send(result);
                    });
                }
                WorkerCommand::Install {
                    generation,
                    assets,
                    reply,
                } => {
                    let worker = Arc::clone(&self);
                    tokio::spawn(async move {
                        let result = worker.install(&generation, &assets).await;
                        let _ = reply.send(result);
                    });
                }
                WorkerCommand::Message(value) => self.on_message(&value).await,
            }
        }

        info!("离线 worker 已停止");
    }

    async fn install(&self, generation: &str, assets: &[String]) -> AppResult<InstallOutcome> {
        let outcome = self.cache.install(generation, assets).await?;
        match outcome {
            InstallOutcome::Waiting => {
                self.emit(WorkerEvent::UpdateReady {
                    generation: generation.to_string(),
                });
            }
            InstallOutcome::Activated => {
                self.emit(WorkerEvent::ControllerChange {
                    generation: generation.to_string(),
                });
            }
            InstallOutcome::AlreadyActive => return Ok(outcome),
        }
        self.persist().await;
        Ok(outcome)
    }

    async fn on_message(&self, value: &JsonValue) {
        match ControlMessage::parse(value) {
            Some(ControlMessage::GetCacheVersion) => {
                let cache = self.cache.active_generation().await;
                self.emit(WorkerEvent::CacheVersion { cache });
            }
            Some(ControlMessage::SkipWaiting) => match self.cache.activate_waiting().await {
                Ok(generation) => {
                    self.emit(WorkerEvent::ControllerChange { generation });
                    self.persist().await;
                }
                Err(e) => warn!("SKIP_WAITING 被忽略: {}", e),
            },
            None => warn!("忽略无法识别的消息: {}", value),
        }
    }

    fn emit(&self, event: WorkerEvent) {
        debug!("worker 事件: {:?}", event);
        // 没有订阅者时发送失败，属于正常情况
        let _ = self.events.send(event);
    }

    async fn persist(&self) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        if let Err(e) = self.cache.snapshot().await.save(path).await {
            warn!("⚠️ 缓存快照保存失败: {}", e);
        }
    }
}

/// 页面侧的 worker 句柄
#[derive(Clone)]
pub struct WorkerHandle {
    commands: mpsc::Sender<WorkerCommand>,
    events: broadcast::Sender<WorkerEvent>,
}

impl WorkerHandle {
    /// 订阅 worker 事件（只能收到订阅之后发出的事件）
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.events.subscribe()
    }

    async fn send(&self, command: WorkerCommand) -> AppResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AppError::worker_gone())
    }

    /// 经由 worker 拦截发出请求
    pub async fn fetch(&self, request: Request) -> AppResult<Response> {
        let (reply, rx) = oneshot::channel();
        self.send(WorkerCommand::Fetch { request, reply }).await?;
        rx.await.map_err(|_| AppError::worker_gone())?
    }

    pub async fn install(
        &self,
        generation: impl Into<String>,
        assets: Vec<String>,
    ) -> AppResult<InstallOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(WorkerCommand::Install {
            generation: generation.into(),
            assets,
            reply,
        })
        .await?;
        rx.await.map_err(|_| AppError::worker_gone())?
    }

    /// 发送未经校验的原始消息，由 worker 决定是否接受
    pub async fn post_message(&self, value: JsonValue) -> AppResult<()> {
        self.send(WorkerCommand::Message(value)).await
    }

    pub async fn post(&self, message: ControlMessage) -> AppResult<()> {
        self.post_message(message.to_value()).await
    }
}

#[async_trait]
impl Transport for WorkerHandle {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        match WorkerHandle::fetch(self, request.clone()).await {
            Ok(response) => Ok(response),
            Err(AppError::Fetch(e)) => Err(e),
            Err(other) => Err(FetchError::Network {
                url: request.url.to_string(),
                message: other.to_string(),
            }),
        }
    }
}
