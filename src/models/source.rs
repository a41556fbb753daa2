use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 数据源类型，决定原始记录按哪种规则规范化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    FreeResponse,
    MultipleChoice,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::FreeResponse => "free-response",
            SourceKind::MultipleChoice => "multiple-choice",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "free-response" | "free" | "fr" => Ok(SourceKind::FreeResponse),
            "multiple-choice" | "mc" => Ok(SourceKind::MultipleChoice),
            other => Err(ConfigError::UnknownSourceKind {
                value: other.to_string(),
            }),
        }
    }
}

/// 一个题库文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSource {
    /// 相对基础 URL 的路径，或完整 URL
    pub url: String,
    pub kind: SourceKind,
}

impl QuestionSource {
    pub fn new(url: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    pub fn free_response(url: impl Into<String>) -> Self {
        Self::new(url, SourceKind::FreeResponse)
    }

    pub fn multiple_choice(url: impl Into<String>) -> Self {
        Self::new(url, SourceKind::MultipleChoice)
    }

    /// 解析 `路径:类型` 形式的描述，例如 `questions_mc.json:mc`
    pub fn parse_spec(value: &str) -> Result<Self, ConfigError> {
        match value.rsplit_once(':') {
            Some((url, kind)) if !url.trim().is_empty() => {
                Ok(Self::new(url.trim(), kind.parse()?))
            }
            _ => Err(ConfigError::UnknownSourceKind {
                value: value.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_spec() {
        assert_eq!(
            QuestionSource::parse_spec("questions_mc.json:mc").unwrap(),
            QuestionSource::multiple_choice("questions_mc.json")
        );
        assert_eq!(
            QuestionSource::parse_spec("https://cdn.test/q.json:free-response").unwrap(),
            QuestionSource::free_response("https://cdn.test/q.json")
        );
        assert!(QuestionSource::parse_spec("questions.json").is_err());
        assert!(QuestionSource::parse_spec("questions.json:essay").is_err());
    }
}
