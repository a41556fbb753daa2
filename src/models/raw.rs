//! 原始题库记录与规范化
//!
//! 题库文件是手工维护的 JSON，字段可能缺失或类型不一，这里先宽松地反序列化，
//! 再逐条校验；不合格的记录只丢弃该条。

use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::question::{Choice, Question, QuestionKind};
use super::source::SourceKind;
use crate::error::ValidationError;

#[derive(Debug, Deserialize)]
struct RawFreeResponse {
    #[serde(default, deserialize_with = "deserialize_scalar")]
    id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    question: Option<String>,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    answer: Option<String>,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChoice {
    #[serde(default, deserialize_with = "deserialize_scalar")]
    key: Option<String>,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMultipleChoice {
    #[serde(default, deserialize_with = "deserialize_scalar")]
    id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    question: Option<String>,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    answer: Option<String>,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    reference: Option<String>,
    #[serde(default)]
    choices: Vec<RawChoice>,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    correct_key: Option<String>,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    explanation: Option<String>,
}

// 文本字段可能是字符串、数字或布尔值，统一转成字符串；空白字符串视为缺失
fn deserialize_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct ScalarVisitor;

    impl<'de> Visitor<'de> for ScalarVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string, number or boolean")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            let trimmed = value.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(ScalarVisitor)
}

fn text(value: Option<String>) -> String {
    value.map(|s| s.trim().to_string()).unwrap_or_default()
}

fn malformed(index: usize, err: serde_json::Error) -> ValidationError {
    ValidationError::Malformed {
        index,
        reason: err.to_string(),
    }
}

/// 按数据源类型规范化一条原始记录
///
/// # 参数
/// - `kind`: 数据源类型
/// - `index`: 记录在该数据源原始数组中的位置（用于生成缺省 id）
/// - `value`: 原始 JSON
pub fn normalize(kind: SourceKind, index: usize, value: &JsonValue) -> Result<Question, ValidationError> {
    match kind {
        SourceKind::FreeResponse => normalize_free_response(index, value),
        SourceKind::MultipleChoice => normalize_multiple_choice(index, value),
    }
}

/// 问答题：题干非空；缺少 id 时生成 `FR_<index>`
pub fn normalize_free_response(index: usize, value: &JsonValue) -> Result<Question, ValidationError> {
    let raw = RawFreeResponse::deserialize(value).map_err(|e| malformed(index, e))?;

    let question = text(raw.question);
    if question.is_empty() {
        return Err(ValidationError::EmptyQuestion { index });
    }

    Ok(Question {
        id: raw.id.unwrap_or_else(|| format!("FR_{}", index)),
        category: text(raw.category),
        question,
        answer: text(raw.answer),
        reference: text(raw.reference),
        kind: QuestionKind::FreeResponse,
    })
}

/// 选择题：题干非空、至少两个有效选项、correctKey 存在且对应某个选项
///
/// 缺少 id 时生成 `MC_<index>`；缺少 answer 时取正确选项的文本
pub fn normalize_multiple_choice(index: usize, value: &JsonValue) -> Result<Question, ValidationError> {
    let raw = RawMultipleChoice::deserialize(value).map_err(|e| malformed(index, e))?;

    let question = text(raw.question);
    if question.is_empty() {
        return Err(ValidationError::EmptyQuestion { index });
    }

    let choices: Vec<Choice> = raw
        .choices
        .into_iter()
        .filter_map(|c| {
            c.key.map(|key| Choice {
                key,
                text: text(c.text),
            })
        })
        .collect();
    if choices.len() < 2 {
        return Err(ValidationError::TooFewChoices {
            index,
            count: choices.len(),
        });
    }

    let correct_key = raw
        .correct_key
        .ok_or(ValidationError::MissingCorrectKey { index })?;
    let correct_text = match choices.iter().find(|c| c.key == correct_key) {
        Some(choice) => choice.text.clone(),
        None => {
            return Err(ValidationError::UnknownCorrectKey {
                index,
                key: correct_key,
            })
        }
    };

    let answer = match text(raw.answer) {
        a if a.is_empty() => correct_text,
        a => a,
    };

    Ok(Question {
        id: raw.id.unwrap_or_else(|| format!("MC_{}", index)),
        category: text(raw.category),
        question,
        answer,
        reference: text(raw.reference),
        kind: QuestionKind::MultipleChoice {
            choices,
            correct_key,
            explanation: raw.explanation.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
        },
    })
}
