//! 离线资源缓存
//!
//! 负责多代缓存的安装、激活，以及按请求类别在网络和缓存之间做选择：
//! - worker 脚本：永远走网络
//! - 易变数据（题库）：网络优先，失败时回退到缓存
//! - 其他 GET：缓存优先，未命中时回源并顺手写入缓存（仅同源且 2xx）
//! - 非 GET：直接透传

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use url::Url;

use super::generation::CacheGeneration;
use super::routing::{RouteKind, RoutingPolicy};
use super::storage::{CacheSnapshot, CacheStorage};
use crate::error::{AppResult, CacheError};
use crate::infrastructure::{Request, Response, Transport};

/// 安装结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// 同版本已经处于活动状态，什么都没做
    AlreadyActive,
    /// 之前没有活动代（或开启了自动激活），新代已直接激活
    Activated,
    /// 新代已安装，等待激活
    Waiting,
}

#[derive(Debug)]
struct CacheState {
    storage: CacheStorage,
    active: Option<String>,
    waiting: Option<String>,
}

/// 离线资源缓存
pub struct AssetCache {
    transport: Arc<dyn Transport>,
    scope: Url,
    policy: RoutingPolicy,
    auto_activate: bool,
    state: RwLock<CacheState>,
}

impl AssetCache {
    /// 创建空缓存
    ///
    /// # 参数
    /// - `transport`: 实际发出网络请求的传输层
    /// - `scope`: worker 作用域，资源列表里的相对路径按它解析，同源判断也以它为准
    /// - `policy`: 请求分类策略
    /// - `quota`: 存储配额（字节）
    pub fn new(
        transport: Arc<dyn Transport>,
        scope: Url,
        policy: RoutingPolicy,
        quota: usize,
    ) -> Self {
        Self {
            transport,
            scope,
            policy,
            auto_activate: false,
            state: RwLock::new(CacheState {
                storage: CacheStorage::new(quota),
                active: None,
                waiting: None,
            }),
        }
    }

    /// 每次安装成功后立即激活，不进入等待
    pub fn with_auto_activate(mut self, enabled: bool) -> Self {
        self.auto_activate = enabled;
        self
    }

    /// 从快照恢复；超出配额或引用不存在的代会被丢弃
    pub fn restore(self, snapshot: CacheSnapshot) -> Self {
        let Self {
            transport,
            scope,
            policy,
            auto_activate,
            state,
        } = self;
        let mut state = state.into_inner();
        for generation in snapshot.generations {
            let id = generation.id().to_string();
            if let Err(e) = state.storage.insert_generation(generation) {
                warn!("恢复缓存代 {} 失败: {}", id, e);
            }
        }
        state.active = snapshot.active.filter(|id| state.storage.has(id));
        state.waiting = snapshot
            .waiting
            .filter(|id| state.storage.has(id) && state.active.as_deref() != Some(id.as_str()));

        info!(
            "📦 已恢复缓存: 活动代 {:?}, 等待代 {:?}",
            state.active, state.waiting
        );

        Self {
            transport,
            scope,
            policy,
            auto_activate,
            state: RwLock::new(state),
        }
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub async fn snapshot(&self) -> CacheSnapshot {
        let state = self.state.read().await;
        CacheSnapshot {
            active: state.active.clone(),
            waiting: state.waiting.clone(),
            generations: state.storage.cloned_generations(),
        }
    }

    pub async fn active_generation(&self) -> Option<String> {
        self.state.read().await.active.clone()
    }

    pub async fn waiting_generation(&self) -> Option<String> {
        self.state.read().await.waiting.clone()
    }

    pub async fn generation_ids(&self) -> Vec<String> {
        self.state.read().await.storage.ids()
    }

    /// 在活动代中查找
    pub async fn match_active(&self, request: &Request) -> Option<Response> {
        let state = self.state.read().await;
        let active = state.active.as_deref()?;
        state.storage.match_in(active, &request.cache_key())
    }

    /// 安装一代缓存
    ///
    /// 所有资源都必须成功（2xx）取回，任意一个失败则整代放弃，
    /// 之前的活动代保持不变。
    pub async fn install(&self, generation: &str, assets: &[String]) -> AppResult<InstallOutcome> {
        if self.active_generation().await.as_deref() == Some(generation) {
            debug!("缓存代 {} 已处于活动状态，跳过安装", generation);
            return Ok(InstallOutcome::AlreadyActive);
        }

        info!("⬇️ 开始安装缓存代 {} ({} 个资源)", generation, assets.len());

        let abort = |asset: &str, reason: String| {
            error!("❌ 缓存代 {} 安装失败 ({}): {}", generation, asset, reason);
            CacheError::InstallAborted {
                generation: generation.to_string(),
                asset: asset.to_string(),
                reason,
            }
        };

        let mut requests = Vec::with_capacity(assets.len());
        for asset in assets {
            let request =
                Request::resolve(&self.scope, asset).map_err(|e| abort(asset, e.to_string()))?;
            requests.push(request);
        }

        let results = join_all(requests.iter().map(|req| self.transport.fetch(req))).await;

        let mut staged = CacheGeneration::new(generation);
        for ((asset, request), result) in assets.iter().zip(&requests).zip(results) {
            let response = result.map_err(|e| abort(asset, e.to_string()))?;
            if !response.ok() {
                return Err(abort(asset, format!("HTTP {}", response.status)).into());
            }
            staged.put(request.cache_key(), response);
        }

        let mut state = self.state.write().await;
        state.storage.insert_generation(staged).map_err(|e| {
            error!("❌ 缓存代 {} 写入失败: {}", generation, e);
            e
        })?;

        // 同一时刻最多一个等待代
        if let Some(previous) = state.waiting.take() {
            if previous != generation {
                state.storage.delete(&previous);
                debug!("丢弃旧的等待代 {}", previous);
            }
        }

        if state.active.is_none() || self.auto_activate {
            Self::activate_locked(&mut state, generation)?;
            Ok(InstallOutcome::Activated)
        } else {
            state.waiting = Some(generation.to_string());
            info!("✓ 缓存代 {} 安装完成，等待激活", generation);
            Ok(InstallOutcome::Waiting)
        }
    }

    /// 激活指定代，并删除其余所有代
    pub async fn activate(&self, generation: &str) -> AppResult<Vec<String>> {
        let mut state = self.state.write().await;
        Ok(Self::activate_locked(&mut state, generation)?)
    }

    /// 立即激活等待中的代，返回其 id
    pub async fn activate_waiting(&self) -> AppResult<String> {
        let mut state = self.state.write().await;
        let waiting = state.waiting.clone().ok_or(CacheError::NothingWaiting)?;
        Self::activate_locked(&mut state, &waiting)?;
        Ok(waiting)
    }

    fn activate_locked(state: &mut CacheState, generation: &str) -> Result<Vec<String>, CacheError> {
        if !state.storage.has(generation) {
            return Err(CacheError::UnknownGeneration(generation.to_string()));
        }

        state.active = Some(generation.to_string());
        state.waiting = None;
        let removed = state.storage.retain_only(generation);

        info!("✅ 缓存代 {} 已激活，清理旧代 {:?}", generation, removed);
        Ok(removed)
    }

    /// 处理一次被拦截的请求
    pub async fn handle(&self, request: &Request) -> AppResult<Response> {
        let route = self.policy.classify(request);
        debug!("{} {} -> {:?}", request.method.as_str(), request.url, route);

        match route {
            RouteKind::Passthrough | RouteKind::WorkerScript => {
                Ok(self.transport.fetch(request).await?)
            }
            RouteKind::VolatileData => self.network_first(request).await,
            RouteKind::Static => self.cache_first(request).await,
        }
    }

    async fn network_first(&self, request: &Request) -> AppResult<Response> {
        match self.transport.fetch(request).await {
            Ok(response) if response.ok() => {
                self.store(request, &response).await;
                Ok(response)
            }
            Ok(response) => {
                warn!(
                    "{} 返回 HTTP {}，尝试使用缓存",
                    request.url, response.status
                );
                Ok(self.match_active(request).await.unwrap_or(response))
            }
            Err(e) => {
                warn!("{} 网络不可用，回退到缓存: {}", request.url, e);
                match self.match_active(request).await {
                    Some(cached) => Ok(cached),
                    None => Err(e.into()),
                }
            }
        }
    }

    async fn cache_first(&self, request: &Request) -> AppResult<Response> {
        if let Some(cached) = self.match_active(request).await {
            debug!("缓存命中: {}", request.url);
            return Ok(cached);
        }

        let response = self.transport.fetch(request).await?;
        if response.ok() && response.is_same_origin(&self.scope) {
            self.store(request, &response).await;
        }
        Ok(response)
    }

    /// 写入活动代；失败只记日志，不影响返回给调用方的响应
    async fn store(&self, request: &Request, response: &Response) {
        let mut state = self.state.write().await;
        let Some(active) = state.active.clone() else {
            debug!("没有活动代，跳过缓存写入: {}", request.url);
            return;
        };
        if let Err(e) = state
            .storage
            .put(&active, &request.cache_key(), response.clone())
        {
            warn!("⚠️ 缓存写入失败 {}: {}", request.url, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::storage::DEFAULT_QUOTA_BYTES;
    use crate::infrastructure::{MemoryTransport, RequestMethod};

    const BASE: &str = "https://app.test/";

    fn assets() -> Vec<String> {
        vec![
            "./".to_string(),
            "./index.html".to_string(),
            "./app.js".to_string(),
            "./questions.json".to_string(),
        ]
    }

    fn serve_shell(transport: &MemoryTransport, tag: &str) {
        transport.insert(BASE, 200, format!("root {}", tag));
        transport.insert("https://app.test/index.html", 200, format!("index {}", tag));
        transport.insert("https://app.test/app.js", 200, format!("app {}", tag));
        transport.insert("https://app.test/questions.json", 200, format!("[\"{}\"]", tag));
    }

    fn cache_with(transport: Arc<MemoryTransport>, quota: usize) -> AssetCache {
        AssetCache::new(
            transport,
            Url::parse(BASE).unwrap(),
            RoutingPolicy::default(),
            quota,
        )
    }

    fn get(url: &str) -> Request {
        Request::parse(RequestMethod::Get, url).unwrap()
    }

    #[tokio::test]
    async fn test_first_install_activates_immediately() {
        let transport = Arc::new(MemoryTransport::new());
        serve_shell(&transport, "g1");
        let cache = cache_with(transport.clone(), DEFAULT_QUOTA_BYTES);

        let outcome = cache.install("g1", &assets()).await.unwrap();
        assert_eq!(outcome, InstallOutcome::Activated);
        assert_eq!(cache.active_generation().await.as_deref(), Some("g1"));

        // 重复安装同一版本是空操作
        let again = cache.install("g1", &assets()).await.unwrap();
        assert_eq!(again, InstallOutcome::AlreadyActive);
    }

    #[tokio::test]
    async fn test_generation_isolation_until_activate() {
        let transport = Arc::new(MemoryTransport::new());
        serve_shell(&transport, "g1");
        let cache = cache_with(transport.clone(), DEFAULT_QUOTA_BYTES);
        cache.install("g1", &assets()).await.unwrap();

        serve_shell(&transport, "g2");
        let outcome = cache.install("g2", &assets()).await.unwrap();
        assert_eq!(outcome, InstallOutcome::Waiting);
        assert_eq!(cache.waiting_generation().await.as_deref(), Some("g2"));

        let index = get("https://app.test/index.html");
        assert_eq!(cache.handle(&index).await.unwrap().text(), "index g1");

        let removed = cache.activate("g2").await.unwrap();
        assert_eq!(removed, vec!["g1".to_string()]);
        assert_eq!(cache.handle(&index).await.unwrap().text(), "index g2");
        assert_eq!(cache.generation_ids().await, vec!["g2".to_string()]);
        assert!(cache.waiting_generation().await.is_none());
    }

    #[tokio::test]
    async fn test_newer_install_replaces_waiting_generation() {
        let transport = Arc::new(MemoryTransport::new());
        serve_shell(&transport, "g1");
        let cache = cache_with(transport.clone(), DEFAULT_QUOTA_BYTES);
        cache.install("g1", &assets()).await.unwrap();

        serve_shell(&transport, "g2");
        cache.install("g2", &assets()).await.unwrap();
        serve_shell(&transport, "g3");
        assert_eq!(
            cache.install("g3", &assets()).await.unwrap(),
            InstallOutcome::Waiting
        );

        assert_eq!(
            cache.generation_ids().await,
            vec!["g1".to_string(), "g3".to_string()]
        );
        assert_eq!(cache.waiting_generation().await.as_deref(), Some("g3"));
        assert_eq!(cache.active_generation().await.as_deref(), Some("g1"));

        assert_eq!(cache.activate_waiting().await.unwrap(), "g3");
        let index = get("https://app.test/index.html");
        assert_eq!(cache.handle(&index).await.unwrap().text(), "index g3");
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_generation() {
        let transport = Arc::new(MemoryTransport::new());
        serve_shell(&transport, "g1");
        let cache = cache_with(transport.clone(), DEFAULT_QUOTA_BYTES);
        cache.install("g1", &assets()).await.unwrap();

        serve_shell(&transport, "g2");
        transport.fail("https://app.test/app.js");
        let err = cache.install("g2", &assets()).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::AppError::Cache(CacheError::InstallAborted { .. })
        ));

        assert_eq!(cache.active_generation().await.as_deref(), Some("g1"));
        assert!(cache.waiting_generation().await.is_none());
        assert_eq!(cache.generation_ids().await, vec!["g1".to_string()]);
    }

    #[tokio::test]
    async fn test_install_aborts_on_http_error_status() {
        let transport = Arc::new(MemoryTransport::new());
        serve_shell(&transport, "g1");
        transport.remove("https://app.test/index.html");
        let cache = cache_with(transport.clone(), DEFAULT_QUOTA_BYTES);

        assert!(cache.install("g1", &assets()).await.is_err());
        assert!(cache.active_generation().await.is_none());
        assert!(cache.generation_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_install_over_quota_aborts() {
        let transport = Arc::new(MemoryTransport::new());
        serve_shell(&transport, "g1");
        let cache = cache_with(transport.clone(), 10);

        let err = cache.install("g1", &assets()).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::AppError::Cache(CacheError::QuotaExceeded { .. })
        ));
        assert!(cache.active_generation().await.is_none());
    }

    #[tokio::test]
    async fn test_network_first_refreshes_cache() {
        let transport = Arc::new(MemoryTransport::new());
        serve_shell(&transport, "g1");
        let cache = cache_with(transport.clone(), DEFAULT_QUOTA_BYTES);
        cache.install("g1", &assets()).await.unwrap();

        let questions = get("https://app.test/questions.json");
        transport.insert("https://app.test/questions.json", 200, "[\"fresh\"]");
        assert_eq!(cache.handle(&questions).await.unwrap().text(), "[\"fresh\"]");

        transport.set_offline(true);
        assert_eq!(cache.handle(&questions).await.unwrap().text(), "[\"fresh\"]");
    }

    #[tokio::test]
    async fn test_network_first_error_status_does_not_overwrite() {
        let transport = Arc::new(MemoryTransport::new());
        serve_shell(&transport, "g1");
        let cache = cache_with(transport.clone(), DEFAULT_QUOTA_BYTES);
        cache.install("g1", &assets()).await.unwrap();

        transport.insert("https://app.test/questions.json", 500, "oops");
        let questions = get("https://app.test/questions.json");
        assert_eq!(cache.handle(&questions).await.unwrap().text(), "[\"g1\"]");

        // 没有缓存时原样返回错误响应
        let other = get("https://app.test/questions_mc.json");
        transport.insert("https://app.test/questions_mc.json", 503, "");
        assert_eq!(cache.handle(&other).await.unwrap().status, 503);
    }

    #[tokio::test]
    async fn test_network_first_without_cache_propagates_error() {
        let transport = Arc::new(MemoryTransport::new());
        let cache = cache_with(transport.clone(), DEFAULT_QUOTA_BYTES);
        transport.set_offline(true);

        let err = cache
            .handle(&get("https://app.test/questions_mc.json"))
            .await
            .unwrap_err();
        assert!(err.is_fetch_failure());
    }

    #[tokio::test]
    async fn test_cache_first_fill_and_fallback() {
        let transport = Arc::new(MemoryTransport::new());
        serve_shell(&transport, "g1");
        let cache = cache_with(transport.clone(), DEFAULT_QUOTA_BYTES);
        cache.install("g1", &assets()).await.unwrap();

        transport.insert("https://app.test/style.css", 200, "body{}");
        let style = get("https://app.test/style.css");
        assert_eq!(cache.handle(&style).await.unwrap().text(), "body{}");
        assert_eq!(transport.hits("https://app.test/style.css"), 1);

        // 第二次命中缓存，不再请求网络
        transport.set_offline(true);
        assert_eq!(cache.handle(&style).await.unwrap().text(), "body{}");
        assert_eq!(transport.hits("https://app.test/style.css"), 1);

        let err = cache
            .handle(&get("https://app.test/missing.png"))
            .await
            .unwrap_err();
        assert!(err.is_fetch_failure());
    }

    #[tokio::test]
    async fn test_cache_first_skips_cross_origin_and_errors() {
        let transport = Arc::new(MemoryTransport::new());
        serve_shell(&transport, "g1");
        let cache = cache_with(transport.clone(), DEFAULT_QUOTA_BYTES);
        cache.install("g1", &assets()).await.unwrap();

        transport.insert("https://cdn.test/font.woff", 200, "font");
        let font = get("https://cdn.test/font.woff");
        cache.handle(&font).await.unwrap();
        assert!(cache.match_active(&font).await.is_none());

        let missing = get("https://app.test/nope.html");
        assert_eq!(cache.handle(&missing).await.unwrap().status, 404);
        assert!(cache.match_active(&missing).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_returns_response() {
        let transport = Arc::new(MemoryTransport::new());
        serve_shell(&transport, "g1");
        let quota: usize = ["root g1", "index g1", "app g1", "[\"g1\"]"]
            .iter()
            .map(|s| s.len())
            .sum::<usize>()
            * 2;
        let cache = cache_with(transport.clone(), quota);
        cache.install("g1", &assets()).await.unwrap();

        let big = "x".repeat(quota);
        transport.insert("https://app.test/big.bin", 200, big.clone());
        let request = get("https://app.test/big.bin");
        assert_eq!(cache.handle(&request).await.unwrap().text(), big);
        assert!(cache.match_active(&request).await.is_none());
    }

    #[tokio::test]
    async fn test_worker_script_and_post_bypass_cache() {
        let transport = Arc::new(MemoryTransport::new());
        serve_shell(&transport, "g1");
        transport.insert("https://app.test/service-worker.js", 200, "sw v1");
        let mut assets = assets();
        assets.push("./service-worker.js".to_string());
        let cache = cache_with(transport.clone(), DEFAULT_QUOTA_BYTES);
        cache.install("g1", &assets).await.unwrap();

        transport.insert("https://app.test/service-worker.js", 200, "sw v2");
        let script = get("https://app.test/service-worker.js");
        assert_eq!(cache.handle(&script).await.unwrap().text(), "sw v2");

        transport.set_offline(true);
        assert!(cache.handle(&script).await.is_err());

        let post = Request::parse(RequestMethod::Post, "https://app.test/index.html").unwrap();
        assert!(cache.handle(&post).await.is_err());
    }

    #[tokio::test]
    async fn test_restore_from_snapshot() {
        let transport = Arc::new(MemoryTransport::new());
        serve_shell(&transport, "g1");
        let cache = cache_with(transport.clone(), DEFAULT_QUOTA_BYTES);
        cache.install("g1", &assets()).await.unwrap();
        let snapshot = cache.snapshot().await;

        let offline = Arc::new(MemoryTransport::new());
        offline.set_offline(true);
        let restored = cache_with(offline, DEFAULT_QUOTA_BYTES).restore(snapshot);
        assert_eq!(restored.active_generation().await.as_deref(), Some("g1"));
        let index = get("https://app.test/index.html");
        assert_eq!(restored.handle(&index).await.unwrap().text(), "index g1");
    }

    #[tokio::test]
    async fn test_auto_activate_skips_waiting() {
        let transport = Arc::new(MemoryTransport::new());
        serve_shell(&transport, "g1");
        let cache = cache_with(transport.clone(), DEFAULT_QUOTA_BYTES).with_auto_activate(true);
        cache.install("g1", &assets()).await.unwrap();

        serve_shell(&transport, "g2");
        assert_eq!(
            cache.install("g2", &assets()).await.unwrap(),
            InstallOutcome::Activated
        );
        assert_eq!(cache.generation_ids().await, vec!["g2".to_string()]);
    }
}
