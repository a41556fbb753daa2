use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{info, warn};

use crate::cache::{AssetCache, CacheSnapshot, InstallOutcome};
use crate::clients::{FlagClient, SubmitOutcome};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{HttpTransport, Transport};
use crate::models::{FilterState, StudyMode, ALL_CATEGORIES};
use crate::services::{
    grade, Direction, FilterEngine, FlagStore, PracticeStats, QuestionStore, UpdateAction,
    UpdateController, Verdict,
};
use crate::utils::logging::{log_questions_loaded, log_startup};
use crate::worker::{ControlMessage, OfflineWorker, WorkerEvent, WorkerHandle};

/// 等待 worker 回复的上限
const EVENT_WAIT: Duration = Duration::from_secs(5);

const HELP: &str = "\
命令:
  n / next          下一题        p / prev      上一题
  f / flip          翻面          ref           显示/隐藏参考
  shuffle on|off    乱序开关      reshuffle     重新打乱
  mode fc|mc        切换模式      cat [名称]    列出/切换分类
  check <答案>      作答判分      stats         正确率
  flag <说明>       标记当前题    unflag        取消标记
  export            导出标记      reload        重新加载题库
  update            立即更新      version       缓存版本
  help              帮助          quit          退出";

/// 用户命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Next,
    Prev,
    Flip,
    Shuffle(bool),
    Reshuffle,
    Mode(StudyMode),
    Categories,
    Category(String),
    Check(String),
    Stats,
    Flag(String),
    Unflag,
    Export,
    Reference,
    Reload,
    Update,
    Version,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        let command = match head.to_ascii_lowercase().as_str() {
            "" | "n" | "next" => Command::Next,
            "p" | "prev" => Command::Prev,
            "f" | "flip" => Command::Flip,
            "shuffle" => match rest {
                "on" => Command::Shuffle(true),
                "off" => Command::Shuffle(false),
                _ => return Err("用法: shuffle on|off".to_string()),
            },
            "reshuffle" => Command::Reshuffle,
            "mode" => Command::Mode(rest.parse()?),
            "cat" | "category" => match rest {
                "" => Command::Categories,
                name => Command::Category(name.to_string()),
            },
            "check" | "a" => Command::Check(rest.to_string()),
            "stats" => Command::Stats,
            "flag" => Command::Flag(rest.to_string()),
            "unflag" => Command::Unflag,
            "export" => Command::Export,
            "ref" | "reference" => Command::Reference,
            "reload" => Command::Reload,
            "update" => Command::Update,
            "version" => Command::Version,
            "h" | "help" | "?" => Command::Help,
            "q" | "quit" | "exit" => Command::Quit,
            other => return Err(format!("未知命令: {}（输入 help 查看帮助）", other)),
        };
        Ok(command)
    }
}

/// 应用主结构
///
/// 展示层：持有 worker 句柄与所有页面侧状态，把用户命令转成对各服务的调用
pub struct App {
    config: Config,
    worker: WorkerHandle,
    events: broadcast::Receiver<WorkerEvent>,
    store: QuestionStore,
    engine: FilterEngine,
    updates: UpdateController,
    flags: FlagStore,
    flag_client: FlagClient,
    stats: PracticeStats,
    flipped: bool,
    show_reference: bool,
}

impl App {
    /// 初始化应用（真实网络）
    pub async fn initialize(config: Config) -> AppResult<Self> {
        Self::with_transport(config, Arc::new(HttpTransport::new())).await
    }

    /// 使用指定传输初始化应用
    ///
    /// 顺序：恢复缓存快照 → 启动 worker → 安装当前版本 → 加载题库
    pub async fn with_transport(config: Config, transport: Arc<dyn Transport>) -> AppResult<Self> {
        let base_url = config.base_url()?;
        let generation = config.generation_id();
        log_startup(&config.app_version, &generation);

        let mut cache = AssetCache::new(
            transport,
            base_url.clone(),
            config.routing_policy(),
            config.cache_quota_bytes,
        )
        .with_auto_activate(config.auto_activate);
        if let Some(snapshot) = CacheSnapshot::load(&config.snapshot_path()).await {
            cache = cache.restore(snapshot);
        }

        let (worker, _join) = OfflineWorker::new(cache)
            .with_snapshot(config.snapshot_path())
            .spawn();
        let events = worker.subscribe();

        match worker.install(generation.as_str(), config.assets.clone()).await {
            Ok(InstallOutcome::AlreadyActive) => info!("✓ 缓存 {} 已是最新", generation),
            Ok(InstallOutcome::Activated) => info!("✓ 缓存 {} 已安装并启用", generation),
            Ok(InstallOutcome::Waiting) => info!("🆕 缓存 {} 已安装，等待激活", generation),
            Err(e) => warn!("⚠️ 缓存 {} 安装失败，继续使用现有缓存: {}", generation, e),
        }

        let flags = FlagStore::open(config.data_dir()).await?;
        let flag_client = FlagClient::new(
            &config.flag_endpoint,
            Arc::new(worker.clone()),
            config.app_version.clone(),
        )?;

        let mut app = Self {
            store: QuestionStore::new(base_url),
            engine: FilterEngine::new(FilterState::new(
                config.default_mode,
                ALL_CATEGORIES,
                config.shuffle,
            )),
            updates: UpdateController::new(),
            flags,
            flag_client,
            stats: PracticeStats::default(),
            flipped: false,
            show_reference: config.show_reference,
            worker,
            events,
            config,
        };
        app.reload().await;
        for message in app.pump_events().await {
            println!("{}", message);
        }
        Ok(app)
    }

    pub fn engine(&self) -> &FilterEngine {
        &self.engine
    }

    pub fn store(&self) -> &QuestionStore {
        &self.store
    }

    pub fn updates(&self) -> &UpdateController {
        &self.updates
    }

    pub fn flags(&self) -> &FlagStore {
        &self.flags
    }

    pub fn stats(&self) -> &PracticeStats {
        &self.stats
    }

    /// 运行交互循环，直到 quit 或输入结束
    pub async fn run(&mut self) -> AppResult<()> {
        println!("{}\n", self.render());
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match Command::parse(&line) {
                        Ok(Command::Quit) => break,
                        Ok(command) => match self.execute(command).await {
                            Ok(output) => println!("{}\n", output),
                            Err(e) => println!("❌ {}\n", e),
                        },
                        Err(message) => println!("{}\n", message),
                    }
                }
                event = self.events.recv() => match event {
                    Ok(event) => {
                        if let Some(message) = self.handle_event(event).await {
                            println!("{}\n", message);
                        }
                    }
                    Err(RecvError::Lagged(n)) => warn!("丢失了 {} 条 worker 事件", n),
                    Err(RecvError::Closed) => return Err(AppError::worker_gone()),
                },
            }
        }

        info!("👋 再见");
        Ok(())
    }

    /// 执行一条命令，返回要展示的文本
    pub async fn execute(&mut self, command: Command) -> AppResult<String> {
        let output = match command {
            Command::Next => self.step(Direction::Next),
            Command::Prev => self.step(Direction::Prev),
            Command::Flip => {
                self.flipped = !self.flipped;
                self.render()
            }
            Command::Shuffle(enabled) => {
                self.engine.toggle_shuffle(enabled);
                self.flipped = false;
                self.render()
            }
            Command::Reshuffle => {
                if !self.engine.state().shuffle_enabled {
                    return Ok("乱序未开启（shuffle on）".to_string());
                }
                self.engine.reshuffle();
                self.flipped = false;
                self.render()
            }
            Command::Mode(mode) => {
                let state = self.engine.state().with_mode(mode).with_category(ALL_CATEGORIES);
                self.engine.set_filter(state);
                self.flipped = false;
                self.render()
            }
            Command::Categories => self.engine.categories().join(" | "),
            Command::Category(name) => {
                if !self.engine.categories().contains(&name) {
                    return Ok(format!("当前模式下没有分类: {}", name));
                }
                let state = self.engine.state().with_category(name);
                self.engine.set_filter(state);
                self.flipped = false;
                self.render()
            }
            Command::Check(input) => self.check(&input),
            Command::Stats => self.stats_line(),
            Command::Flag(text) => self.flag(&text).await?,
            Command::Unflag => {
                let Some(id) = self.engine.current().map(|q| q.id.clone()) else {
                    return Ok("没有当前题目".to_string());
                };
                if self.flags.clear(&id).await? {
                    format!("已取消标记 {}", id)
                } else {
                    format!("{} 没有标记", id)
                }
            }
            Command::Export => {
                if self.flags.is_empty() {
                    return Ok("没有可导出的标记".to_string());
                }
                let (path, count) = self.flags.export(&self.config.app_version).await?;
                format!("📤 已导出 {} 条标记到 {}", count, path.display())
            }
            Command::Reference => {
                self.show_reference = !self.show_reference;
                self.render()
            }
            Command::Reload => {
                self.reload().await;
                self.render()
            }
            Command::Update => {
                let Some(message) = self.updates.request_activation() else {
                    return Ok("当前没有待激活的新版本".to_string());
                };
                self.worker.post(message).await?;
                self.wait_for(|e| matches!(e, WorkerEvent::ControllerChange { .. }))
                    .await?
                    .join("\n")
            }
            Command::Version => {
                self.worker.post(ControlMessage::GetCacheVersion).await?;
                self.wait_for(|e| matches!(e, WorkerEvent::CacheVersion { .. }))
                    .await?
                    .join("\n")
            }
            Command::Help => HELP.to_string(),
            Command::Quit => String::new(),
        };
        Ok(output)
    }

    /// 重新加载题库并按当前筛选条件重算列表
    pub async fn reload(&mut self) {
        let total = self.store.load(&self.config.sources, &self.worker).await;
        log_questions_loaded(self.store.reports(), total);
        self.engine.refresh(self.store.questions());
        self.flipped = false;
    }

    /// 处理已到达但尚未处理的 worker 事件
    pub async fn pump_events(&mut self) -> Vec<String> {
        let mut messages = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if let Some(message) = self.handle_event(event).await {
                        messages.push(message);
                    }
                }
                Err(TryRecvError::Lagged(n)) => warn!("丢失了 {} 条 worker 事件", n),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        messages
    }

    async fn wait_for<F>(&mut self, done: F) -> AppResult<Vec<String>>
    where
        F: Fn(&WorkerEvent) -> bool,
    {
        let mut messages = Vec::new();
        loop {
            let event = match tokio::time::timeout(EVENT_WAIT, self.events.recv()).await {
                Err(_) => {
                    warn!("等待 worker 回复超时");
                    break;
                }
                Ok(Ok(event)) => event,
                Ok(Err(RecvError::Lagged(n))) => {
                    warn!("丢失了 {} 条 worker 事件", n);
                    continue;
                }
                Ok(Err(RecvError::Closed)) => return Err(AppError::worker_gone()),
            };
            let finished = done(&event);
            if let Some(message) = self.handle_event(event).await {
                messages.push(message);
            }
            if finished {
                break;
            }
        }
        Ok(messages)
    }

    async fn handle_event(&mut self, event: WorkerEvent) -> Option<String> {
        if let WorkerEvent::CacheVersion { cache } = &event {
            return Some(format!("📦 缓存版本: {}", cache.as_deref().unwrap_or("(无)")));
        }
        match self.updates.on_worker_event(&event)? {
            UpdateAction::ShowBanner { generation } => Some(format!(
                "🆕 新版本 {} 已就绪，输入 update 立即更新",
                generation
            )),
            UpdateAction::Reload { generation } => {
                self.reload().await;
                Some(format!("🔄 已切换到 {}\n{}", generation, self.render()))
            }
        }
    }

    fn step(&mut self, direction: Direction) -> String {
        self.engine.advance(direction);
        self.flipped = false;
        self.render()
    }

    fn check(&mut self, input: &str) -> String {
        let Some(question) = self.engine.current().cloned() else {
            return "没有当前题目".to_string();
        };
        let verdict = grade(&question, input);
        self.stats.record(&verdict);
        match verdict {
            Verdict::Blank => "请输入答案".to_string(),
            Verdict::Correct => format!("✅ 正确  {}", self.stats_line()),
            Verdict::Incorrect { expected } => {
                format!("❌ 正确答案: {}  {}", expected, self.stats_line())
            }
        }
    }

    fn stats_line(&self) -> String {
        format!(
            "正确率 {}% ({}/{})",
            self.stats.accuracy(),
            self.stats.correct,
            self.stats.attempts
        )
    }

    /// 先保存本地，再尝试远端提交；提交失败不影响本地记录
    async fn flag(&mut self, text: &str) -> AppResult<String> {
        let Some(question) = self.engine.current().cloned() else {
            return Ok("没有当前题目".to_string());
        };
        let record = self.flags.save(&question, text).await?;

        let message = match self
            .flag_client
            .submit(&question, &record.text, self.flags.device_id())
            .await
        {
            Ok(SubmitOutcome::LocalOnly) => format!("🚩 已标记 {}（仅保存在本地）", question.id),
            Ok(SubmitOutcome::Submitted { .. }) => format!("🚩 已标记并提交 {}", question.id),
            Err(e) => {
                warn!("标记提交失败: {}", e);
                format!("🚩 已标记 {}（本地已保存，提交失败: {}）", question.id, e)
            }
        };
        Ok(message)
    }

    /// 渲染当前卡片
    pub fn render(&self) -> String {
        if self.store.is_empty() {
            return "⚠️ 没有可用的题目数据：所有题库都加载失败，请检查网络后输入 reload".to_string();
        }
        let Some(question) = self.engine.current() else {
            return format!("没有符合条件的题目  {}", self.engine.counter_label());
        };

        let mut out = String::new();
        let category = if question.category.is_empty() {
            "未分类"
        } else {
            &question.category
        };
        let marker = if self.flags.is_flagged(&question.id) {
            "  🚩"
        } else {
            ""
        };
        let _ = writeln!(out, "[{}]  {}{}", category, self.engine.counter_label(), marker);
        let _ = writeln!(out, "Q: {}", question.question);

        let correct_key = question.correct_choice().map(|c| c.key.as_str());
        for choice in question.choices() {
            let tick = if self.flipped && Some(choice.key.as_str()) == correct_key {
                " ✓"
            } else {
                ""
            };
            let _ = writeln!(out, "   {}. {}{}", choice.key, choice.text, tick);
        }

        if self.flipped {
            let _ = writeln!(out, "A: {}", question.answer);
            if let Some(explanation) = question.explanation() {
                let _ = writeln!(out, "   {}", explanation);
            }
        }
        if self.show_reference && !question.reference.is_empty() {
            let _ = writeln!(out, "参考: {}", question.reference);
        }
        out.trim_end().to_string()
    }
}
