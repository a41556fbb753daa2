//! worker 与页面之间的消息
//!
//! 入站只接受两种控制消息，出站事件带 `type` 标签，收到无法识别的消息时忽略

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// 页面 → worker 的控制消息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// 查询当前缓存版本
    GetCacheVersion,
    /// 立即激活等待中的代
    SkipWaiting,
}

impl ControlMessage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMessage::GetCacheVersion => "GET_CACHE_VERSION",
            ControlMessage::SkipWaiting => "SKIP_WAITING",
        }
    }

    pub fn to_value(self) -> JsonValue {
        JsonValue::String(self.as_str().to_string())
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "GET_CACHE_VERSION" => Some(ControlMessage::GetCacheVersion),
            "SKIP_WAITING" => Some(ControlMessage::SkipWaiting),
            _ => None,
        }
    }

    /// 校验入站消息：接受裸字符串或 `{"type": "..."}` 对象
    pub fn parse(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(tag) => Self::from_tag(tag),
            JsonValue::Object(map) => map
                .get("type")
                .and_then(JsonValue::as_str)
                .and_then(Self::from_tag),
            _ => None,
        }
    }
}

/// worker → 页面 的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerEvent {
    /// 版本查询的回复；还没有活动代时为 `null`
    CacheVersion { cache: Option<String> },
    /// 新代安装完成，等待激活
    #[serde(rename = "SW_UPDATE_READY")]
    UpdateReady { generation: String },
    /// 新代已接管请求
    ControllerChange { generation: String },
}
