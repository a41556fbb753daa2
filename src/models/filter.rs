use serde::{Deserialize, Serialize};

use super::question::{Question, StudyMode};

/// 代表"全部分类"的选项
pub const ALL_CATEGORIES: &str = "all";

/// 筛选条件，整体替换，不做局部修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    pub mode: StudyMode,
    pub category: String,
    pub shuffle_enabled: bool,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            mode: StudyMode::Flashcard,
            category: ALL_CATEGORIES.to_string(),
            shuffle_enabled: false,
        }
    }
}

impl FilterState {
    pub fn new(mode: StudyMode, category: impl Into<String>, shuffle_enabled: bool) -> Self {
        Self {
            mode,
            category: category.into(),
            shuffle_enabled,
        }
    }

    pub fn with_mode(&self, mode: StudyMode) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }

    pub fn with_category(&self, category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..self.clone()
        }
    }

    pub fn with_shuffle(&self, shuffle_enabled: bool) -> Self {
        Self {
            shuffle_enabled,
            ..self.clone()
        }
    }

    pub fn is_all_categories(&self) -> bool {
        self.category == ALL_CATEGORIES
    }

    /// 题型匹配模式，且分类为 "all" 或与所选分类相同
    pub fn accepts(&self, question: &Question) -> bool {
        self.mode.matches(question) && (self.is_all_categories() || question.category == self.category)
    }
}
