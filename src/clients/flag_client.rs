/// 标记提交客户端
///
/// 把本地标记转发给远端收集脚本（表单编码，`data=<json>`）
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use url::Url;

use crate::error::{AppError, AppResult, ConfigError, FetchError};
use crate::infrastructure::{Request, RequestMethod, Transport};
use crate::models::{FlagPayload, Question};
use crate::utils::logging::truncate_text;

/// 提交结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 未配置远端地址，只保存在本地
    LocalOnly,
    /// 远端已接收，附带响应文本
    Submitted { response: String },
}

/// 标记提交客户端
pub struct FlagClient {
    endpoint: Option<Url>,
    transport: Arc<dyn Transport>,
    app_version: String,
    user_agent: String,
}

impl FlagClient {
    /// 创建新的标记提交客户端
    ///
    /// # 参数
    /// - `endpoint`: 远端地址，空字符串表示不提交
    /// - `transport`: 发送请求所用的传输
    /// - `app_version`: 随负载上报的应用版本
    pub fn new(endpoint: &str, transport: Arc<dyn Transport>, app_version: impl Into<String>) -> AppResult<Self> {
        let endpoint = match endpoint.trim() {
            "" => None,
            raw => Some(Url::parse(raw).map_err(|e| ConfigError::InvalidBaseUrl {
                value: raw.to_string(),
                message: e.to_string(),
            })?),
        };
        Ok(Self {
            endpoint,
            transport,
            app_version: app_version.into(),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    /// 构造提交负载
    pub fn payload(&self, question: &Question, flag_text: &str, device_id: &str) -> FlagPayload {
        FlagPayload {
            id: question.id.clone(),
            category: question.category.clone(),
            question: question.question.clone(),
            answer: question.answer.clone(),
            reference: question.reference.clone(),
            flag_text: flag_text.to_string(),
            timestamp: Utc::now(),
            user_agent: self.user_agent.clone(),
            device_id: device_id.to_string(),
            app_version: self.app_version.clone(),
        }
    }

    /// 提交一条标记
    ///
    /// # 返回
    /// 未配置地址时返回 `LocalOnly`；非 2xx 视为失败
    pub async fn submit(&self, question: &Question, flag_text: &str, device_id: &str) -> AppResult<SubmitOutcome> {
        let Some(endpoint) = &self.endpoint else {
            debug!("未配置标记提交地址，仅保存在本地");
            return Ok(SubmitOutcome::LocalOnly);
        };

        let payload = self.payload(question, flag_text, device_id);
        let json = serde_json::to_string(&payload).map_err(|e| AppError::Other(e.to_string()))?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("data", &json)
            .finish();

        let request = Request::new(RequestMethod::Post, endpoint.clone())
            .with_header("Content-Type", "application/x-www-form-urlencoded;charset=UTF-8")
            .with_body(body);

        let response = self.transport.fetch(&request).await?;
        let text = response.text();
        if !response.ok() {
            warn!("标记提交失败: {} {}", response.status, truncate_text(&text, 300));
            return Err(FetchError::Status {
                url: endpoint.to_string(),
                status: response.status,
            }
            .into());
        }

        Ok(SubmitOutcome::Submitted { response: text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemoryTransport;
    use crate::models::QuestionKind;

    const ENDPOINT: &str = "https://script.test/exec";

    fn question() -> Question {
        Question {
            id: "FR_3".to_string(),
            category: "Cells".to_string(),
            question: "Powerhouse?".to_string(),
            answer: "Mitochondria".to_string(),
            reference: "p. 12".to_string(),
            kind: QuestionKind::FreeResponse,
        }
    }

    #[tokio::test]
    async fn test_unconfigured_endpoint_is_local_only() {
        let transport = Arc::new(MemoryTransport::new());
        let client = FlagClient::new("  ", transport.clone(), "v1.2.1").unwrap();
        assert!(!client.is_configured());
        assert_eq!(
            client.submit(&question(), "typo", "dev-1").await.unwrap(),
            SubmitOutcome::LocalOnly
        );
    }

    #[tokio::test]
    async fn test_submit_form_encoded_payload() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert(ENDPOINT, 200, r#"{"ok":true}"#);
        let client = FlagClient::new(ENDPOINT, transport.clone(), "v1.2.1").unwrap();

        let outcome = client.submit(&question(), "typo & more", "dev-abc").await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Submitted { .. }));

        let body = String::from_utf8(transport.last_body(ENDPOINT).unwrap()).unwrap();
        let (key, data) = url::form_urlencoded::parse(body.as_bytes()).next().unwrap();
        assert_eq!(key, "data");

        let payload: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(payload["id"], "FR_3");
        assert_eq!(payload["flagText"], "typo & more");
        assert_eq!(payload["deviceId"], "dev-abc");
        assert_eq!(payload["appVersion"], "v1.2.1");
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert(ENDPOINT, 403, "forbidden");
        let client = FlagClient::new(ENDPOINT, transport, "v1.2.1").unwrap();

        let err = client.submit(&question(), "typo", "dev-1").await.unwrap_err();
        assert!(err.is_fetch_failure());
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let transport = Arc::new(MemoryTransport::new());
        assert!(FlagClient::new("not a url", transport, "v1").is_err());
    }
}
