//! 请求分类：按路径后缀决定走哪条缓存策略

use crate::infrastructure::Request;

/// 请求类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// 非 GET 请求，不拦截
    Passthrough,
    /// worker 自身脚本，永远走网络
    WorkerScript,
    /// 易变数据文件（题库），网络优先
    VolatileData,
    /// 其他静态资源，缓存优先
    Static,
}

/// 路由策略
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    worker_script: String,
    volatile_files: Vec<String>,
}

impl RoutingPolicy {
    pub fn new(worker_script: impl Into<String>, volatile_files: Vec<String>) -> Self {
        Self {
            worker_script: worker_script.into(),
            volatile_files,
        }
    }

    pub fn classify(&self, request: &Request) -> RouteKind {
        if !request.is_get() {
            return RouteKind::Passthrough;
        }

        let path = request.path();
        if !self.worker_script.is_empty() && path.ends_with(&self.worker_script) {
            return RouteKind::WorkerScript;
        }
        if self
            .volatile_files
            .iter()
            .any(|name| !name.is_empty() && path.ends_with(name.as_str()))
        {
            return RouteKind::VolatileData;
        }
        RouteKind::Static
    }
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self::new(
            "service-worker.js",
            vec!["questions.json".to_string(), "questions_mc.json".to_string()],
        )
    }
}
