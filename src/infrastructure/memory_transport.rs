//! 内存传输：用固定路由模拟服务器，可随时切换为"离线"

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use url::Url;

use super::transport::{Request, Response, Transport};
use crate::error::FetchError;

#[derive(Default)]
struct Routes {
    responses: HashMap<String, (u16, Vec<u8>)>,
    failing: HashSet<String>,
    offline: bool,
    hits: HashMap<String, usize>,
    bodies: HashMap<String, Vec<u8>>,
}

/// 内存传输
///
/// 未注册的 URL 返回 404；`set_offline(true)` 后所有请求都以网络错误失败
#[derive(Default)]
pub struct MemoryTransport {
    routes: Mutex<Routes>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn routes(&self) -> MutexGuard<'_, Routes> {
        self.routes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn key(url: &str) -> String {
        match Url::parse(url) {
            Ok(mut parsed) => {
                parsed.set_fragment(None);
                parsed.to_string()
            }
            Err(_) => url.to_string(),
        }
    }

    /// 注册（或覆盖）一个响应
    pub fn insert(&self, url: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.routes()
            .responses
            .insert(Self::key(url), (status, body.into()));
    }

    pub fn insert_json(&self, url: &str, value: &serde_json::Value) {
        self.insert(url, 200, value.to_string());
    }

    pub fn remove(&self, url: &str) {
        self.routes().responses.remove(&Self::key(url));
    }

    /// 让单个 URL 以网络错误失败
    pub fn fail(&self, url: &str) {
        self.routes().failing.insert(Self::key(url));
    }

    pub fn restore(&self, url: &str) {
        self.routes().failing.remove(&Self::key(url));
    }

    pub fn set_offline(&self, offline: bool) {
        self.routes().offline = offline;
    }

    /// 某个 URL 实际被请求的次数（包括失败的请求）
    pub fn hits(&self, url: &str) -> usize {
        self.routes()
            .hits
            .get(&Self::key(url))
            .copied()
            .unwrap_or(0)
    }

    /// 最近一次发往该 URL 的请求体
    pub fn last_body(&self, url: &str) -> Option<Vec<u8>> {
        self.routes().bodies.get(&Self::key(url)).cloned()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let key = request.cache_key();
        let mut routes = self.routes();
        *routes.hits.entry(key.clone()).or_insert(0) += 1;
        if !request.body.is_empty() {
            routes.bodies.insert(key.clone(), request.body.clone());
        }

        if routes.offline || routes.failing.contains(&key) {
            return Err(FetchError::Network {
                url: key,
                message: "network unreachable".to_string(),
            });
        }

        let (status, body) = routes
            .responses
            .get(&key)
            .cloned()
            .unwrap_or((404, Vec::new()));

        Ok(Response::new(request.url.clone(), status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::RequestMethod;

    #[tokio::test]
    async fn test_routes_and_offline() {
        let transport = MemoryTransport::new();
        transport.insert("https://app.test/a.txt", 200, "hello");

        let req = Request::parse(RequestMethod::Get, "https://app.test/a.txt").unwrap();
        let res = transport.fetch(&req).await.unwrap();
        assert_eq!(res.text(), "hello");

        let missing = Request::parse(RequestMethod::Get, "https://app.test/b.txt").unwrap();
        assert_eq!(transport.fetch(&missing).await.unwrap().status, 404);

        transport.set_offline(true);
        assert!(transport.fetch(&req).await.is_err());
        assert_eq!(transport.hits("https://app.test/a.txt"), 2);
    }
}
