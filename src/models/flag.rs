use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::question::Question;

/// 标记时保存的题目快照，题库更新后仍能看到当时的内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSnapshot {
    pub id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub reference: String,
}

impl From<&Question> for QuestionSnapshot {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            category: q.category.clone(),
            question: q.question.clone(),
            answer: q.answer.clone(),
            reference: q.reference.clone(),
        }
    }
}

/// 本地保存的一条标记
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagRecord {
    pub text: String,
    pub saved_at: DateTime<Utc>,
    pub question_snapshot: QuestionSnapshot,
}

/// 导出文件中的一条记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagExport {
    #[serde(flatten)]
    pub snapshot: QuestionSnapshot,
    pub flag_text: String,
    pub saved_at: DateTime<Utc>,
    pub device_id: String,
    pub app_version: String,
}

/// 提交到远端的负载，字段与接收脚本约定一致
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagPayload {
    pub id: String,
    pub category: String,
    pub question: String,
    pub answer: String,
    pub reference: String,
    pub flag_text: String,
    pub timestamp: DateTime<Utc>,
    pub user_agent: String,
    pub device_id: String,
    pub app_version: String,
}
