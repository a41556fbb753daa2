use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 选择题选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub key: String,
    pub text: String,
}

/// 题目类型
///
/// 新增题型时，所有 `match` 都必须处理它
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    /// 问答题（翻卡片）
    FreeResponse,
    /// 选择题
    MultipleChoice {
        choices: Vec<Choice>,
        correct_key: String,
        explanation: Option<String>,
    },
}

/// 规范化之后的题目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: String,
    pub category: String,
    pub question: String,
    pub answer: String,
    pub reference: String,
    pub kind: QuestionKind,
}

impl Question {
    /// 该题目所属的学习模式
    pub fn mode(&self) -> StudyMode {
        match self.kind {
            QuestionKind::FreeResponse => StudyMode::Flashcard,
            QuestionKind::MultipleChoice { .. } => StudyMode::MultipleChoice,
        }
    }

    pub fn choices(&self) -> &[Choice] {
        match &self.kind {
            QuestionKind::FreeResponse => &[],
            QuestionKind::MultipleChoice { choices, .. } => choices,
        }
    }

    /// 选择题的正确选项；问答题返回 `None`
    pub fn correct_choice(&self) -> Option<&Choice> {
        match &self.kind {
            QuestionKind::FreeResponse => None,
            QuestionKind::MultipleChoice {
                choices,
                correct_key,
                ..
            } => choices.iter().find(|c| &c.key == correct_key),
        }
    }

    pub fn explanation(&self) -> Option<&str> {
        match &self.kind {
            QuestionKind::FreeResponse => None,
            QuestionKind::MultipleChoice { explanation, .. } => explanation.as_deref(),
        }
    }
}

/// 学习模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StudyMode {
    #[default]
    Flashcard,
    MultipleChoice,
}

impl StudyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyMode::Flashcard => "flashcard",
            StudyMode::MultipleChoice => "multiple-choice",
        }
    }

    /// 题目是否属于该模式
    pub fn matches(&self, question: &Question) -> bool {
        question.mode() == *self
    }
}

impl fmt::Display for StudyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flashcard" | "fr" | "free-response" => Ok(StudyMode::Flashcard),
            "multiple-choice" | "mc" => Ok(StudyMode::MultipleChoice),
            other => Err(format!("未知的学习模式: {}", other)),
        }
    }
}
