//! 题库加载服务 - 业务能力层
//!
//! 只负责"把若干题库文件变成一组规范化题目"，不关心筛选和展示

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{AppResult, FetchError, ParseError};
use crate::infrastructure::{Request, Transport};
use crate::models::{normalize, Question, QuestionSource};

/// 单个数据源的加载结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub url: String,
    pub loaded: usize,
    pub dropped: usize,
    /// 获取或解析失败的原因；失败时该数据源贡献空列表
    pub error: Option<String>,
}

/// 题库存储
///
/// 职责：
/// - 并发获取所有数据源，按数据源顺序拼接
/// - 单个数据源失败不影响其他数据源
/// - 每次加载整体替换，不与上一次合并
pub struct QuestionStore {
    base_url: Url,
    questions: Vec<Arc<Question>>,
    reports: Vec<SourceReport>,
}

impl QuestionStore {
    /// 创建新的题库存储
    ///
    /// # 参数
    /// - `base_url`: 相对路径的数据源按此解析
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            questions: Vec::new(),
            reports: Vec::new(),
        }
    }

    pub fn questions(&self) -> &[Arc<Question>] {
        &self.questions
    }

    pub fn reports(&self) -> &[SourceReport] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// 加载所有数据源
    ///
    /// # 参数
    /// - `sources`: 有序的数据源列表
    /// - `transport`: 请求经由的传输（通常是离线 worker）
    ///
    /// # 返回
    /// 返回本次加载后的题目总数；所有数据源都失败时为 0，不返回错误
    pub async fn load(&mut self, sources: &[QuestionSource], transport: &dyn Transport) -> usize {
        let fetches = sources
            .iter()
            .map(|source| fetch_source(&self.base_url, source, transport));
        let results = join_all(fetches).await;

        let mut questions = Vec::new();
        let mut reports = Vec::with_capacity(sources.len());

        for (source, result) in sources.iter().zip(results) {
            match result {
                Ok((loaded, dropped)) => {
                    info!("✓ {} 加载 {} 题（丢弃 {} 条）", source.url, loaded.len(), dropped);
                    reports.push(SourceReport {
                        url: source.url.clone(),
                        loaded: loaded.len(),
                        dropped,
                        error: None,
                    });
                    questions.extend(loaded.into_iter().map(Arc::new));
                }
                Err(e) => {
                    warn!("⚠️ 数据源 {} 加载失败，按空列表处理: {}", source.url, e);
                    reports.push(SourceReport {
                        url: source.url.clone(),
                        loaded: 0,
                        dropped: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        self.questions = questions;
        self.reports = reports;
        self.questions.len()
    }
}

async fn fetch_source(
    base_url: &Url,
    source: &QuestionSource,
    transport: &dyn Transport,
) -> AppResult<(Vec<Question>, usize)> {
    let request = Request::resolve(base_url, &source.url)?;
    let url = request.url.to_string();

    let response = transport.fetch(&request).await?;
    if !response.ok() {
        return Err(FetchError::Status {
            url,
            status: response.status,
        }
        .into());
    }

    let value: JsonValue = response
        .json()
        .map_err(|e| ParseError::InvalidJson { url: url.clone(), source: e })?;
    let records = match value {
        JsonValue::Array(records) => records,
        _ => return Err(ParseError::NotAList { url }.into()),
    };

    let mut questions = Vec::with_capacity(records.len());
    let mut dropped = 0;
    for (index, record) in records.iter().enumerate() {
        match normalize(source.kind, index, record) {
            Ok(question) => questions.push(question),
            Err(e) => {
                debug!("丢弃 {}: {}", url, e);
                dropped += 1;
            }
        }
    }

    Ok((questions, dropped))
}
