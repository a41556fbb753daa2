//! 筛选 / 乱序 / 游标
//!
//! 可导航列表由"全部题目 + 筛选条件"推导而来，游标始终落在列表范围内

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::models::{FilterState, Question, StudyMode, ALL_CATEGORIES};

/// 导航方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

/// 筛选引擎
///
/// 持有全部题目的一份引用列表、当前筛选条件、可导航列表与游标。
/// 随机源可注入，测试里使用固定种子。
pub struct FilterEngine<R = StdRng> {
    all: Vec<Arc<Question>>,
    state: FilterState,
    list: Vec<Arc<Question>>,
    cursor: usize,
    rng: R,
}

impl FilterEngine<StdRng> {
    pub fn new(state: FilterState) -> Self {
        Self::with_rng(state, StdRng::from_entropy())
    }
}

impl<R: Rng> FilterEngine<R> {
    pub fn with_rng(state: FilterState, rng: R) -> Self {
        Self {
            all: Vec::new(),
            state,
            list: Vec::new(),
            cursor: 0,
            rng,
        }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// 当前可导航列表
    pub fn list(&self) -> &[Arc<Question>] {
        &self.list
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// 题库重新加载后调用：按当前条件重算列表，游标越界时归零
    pub fn refresh(&mut self, questions: &[Arc<Question>]) {
        self.all = questions.to_vec();
        self.recompute();
        if self.cursor >= self.list.len() {
            self.cursor = 0;
        }
    }

    /// 整体替换筛选条件，游标归零
    pub fn set_filter(&mut self, state: FilterState) {
        debug!("筛选条件: {:?}", state);
        self.state = state;
        self.recompute();
        self.cursor = 0;
    }

    /// 乱序开启时重新打乱当前列表（成员不变），游标归零
    pub fn reshuffle(&mut self) {
        if !self.state.shuffle_enabled {
            return;
        }
        self.list.shuffle(&mut self.rng);
        self.cursor = 0;
    }

    /// 开启时立即打乱；关闭时保持当前顺序，不恢复原始顺序
    pub fn toggle_shuffle(&mut self, enabled: bool) {
        self.state.shuffle_enabled = enabled;
        if enabled {
            self.reshuffle();
        }
    }

    /// 循环移动游标；列表为空时不动
    pub fn advance(&mut self, direction: Direction) {
        let len = self.list.len();
        if len == 0 {
            return;
        }
        self.cursor = match direction {
            Direction::Next => (self.cursor + 1) % len,
            Direction::Prev => (self.cursor + len - 1) % len,
        };
    }

    pub fn current(&self) -> Option<&Arc<Question>> {
        self.list.get(self.cursor)
    }

    /// 形如 `3 / 10` 的位置标签，空列表为 `0 / 0`
    pub fn counter_label(&self) -> String {
        if self.list.is_empty() {
            "0 / 0".to_string()
        } else {
            format!("{} / {}", self.cursor + 1, self.list.len())
        }
    }

    /// 当前模式下可选的分类
    pub fn categories(&self) -> Vec<String> {
        categories(&self.all, self.state.mode)
    }

    fn recompute(&mut self) {
        self.list = self
            .all
            .iter()
            .filter(|q| self.state.accepts(q))
            .cloned()
            .collect();
        if self.state.shuffle_enabled {
            self.list.shuffle(&mut self.rng);
        }
    }
}

/// 分类列表：按模式过滤、去空、去重、升序，首项固定为 "all"
pub fn categories(questions: &[Arc<Question>], mode: StudyMode) -> Vec<String> {
    let distinct: BTreeSet<&str> = questions
        .iter()
        .filter(|q| mode.matches(q))
        .map(|q| q.category.as_str())
        .filter(|c| !c.is_empty())
        .collect();

    std::iter::once(ALL_CATEGORIES.to_string())
        .chain(distinct.into_iter().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Choice, QuestionKind};
    use std::collections::HashMap;

    fn free(id: &str, category: &str) -> Arc<Question> {
        Arc::new(Question {
            id: id.to_string(),
            category: category.to_string(),
            question: format!("Q{}", id),
            answer: format!("A{}", id),
            reference: String::new(),
            kind: QuestionKind::FreeResponse,
        })
    }

    fn mc(id: &str, category: &str) -> Arc<Question> {
        Arc::new(Question {
            id: id.to_string(),
            category: category.to_string(),
            question: format!("Q{}?", id),
            answer: "foo".to_string(),
            reference: String::new(),
            kind: QuestionKind::MultipleChoice {
                choices: vec![
                    Choice {
                        key: "A".to_string(),
                        text: "foo".to_string(),
                    },
                    Choice {
                        key: "B".to_string(),
                        text: "bar".to_string(),
                    },
                ],
                correct_key: "A".to_string(),
                explanation: None,
            },
        })
    }

    fn engine(questions: &[Arc<Question>], state: FilterState) -> FilterEngine<StdRng> {
        let mut engine = FilterEngine::with_rng(state, StdRng::seed_from_u64(17));
        engine.refresh(questions);
        engine
    }

    fn ids<R: Rng>(engine: &FilterEngine<R>) -> Vec<String> {
        engine.list().iter().map(|q| q.id.clone()).collect()
    }

    fn five() -> Vec<Arc<Question>> {
        (1..=5).map(|i| free(&i.to_string(), "X")).collect()
    }

    #[test]
    fn test_cursor_wraparound() {
        let mut engine = engine(&five(), FilterState::default());
        assert_eq!(engine.cursor(), 0);

        engine.advance(Direction::Prev);
        assert_eq!(engine.cursor(), 4);
        assert_eq!(engine.counter_label(), "5 / 5");

        engine.advance(Direction::Next);
        assert_eq!(engine.cursor(), 0);

        for expected in [1, 2, 3, 4, 0] {
            engine.advance(Direction::Next);
            assert_eq!(engine.cursor(), expected);
        }

        let mut single = self::engine(&five()[..1], FilterState::default());
        single.advance(Direction::Prev);
        assert_eq!(single.cursor(), 0);
        single.advance(Direction::Next);
        assert_eq!(single.cursor(), 0);
    }

    #[test]
    fn test_advance_on_empty_list_is_noop() {
        let mut engine = engine(&[], FilterState::default());
        engine.advance(Direction::Next);
        engine.advance(Direction::Prev);
        assert_eq!(engine.cursor(), 0);
        assert!(engine.current().is_none());
        assert_eq!(engine.counter_label(), "0 / 0");
    }

    #[test]
    fn test_set_filter_resets_cursor() {
        let mut questions = five();
        questions.extend((6..=10).map(|i| free(&i.to_string(), "Y")));
        let mut engine = engine(&questions, FilterState::default().with_category("X"));
        for _ in 0..3 {
            engine.advance(Direction::Next);
        }
        assert_eq!(engine.cursor(), 3);

        engine.set_filter(FilterState::default().with_category("Y"));
        assert_eq!(engine.len(), 5);
        assert_eq!(engine.cursor(), 0);
        assert_eq!(engine.current().map(|q| q.id.as_str()), Some("6"));
    }

    #[test]
    fn test_filter_by_mode_and_category() {
        let questions = vec![free("1", "X"), mc("2", "X"), free("3", "Y"), mc("4", "Z")];
        let mut engine = engine(&questions, FilterState::default());
        assert_eq!(ids(&engine), vec!["1", "3"]);

        engine.set_filter(FilterState::new(StudyMode::MultipleChoice, "X", false));
        assert_eq!(ids(&engine), vec!["2"]);

        engine.set_filter(FilterState::new(StudyMode::MultipleChoice, "Y", false));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_categories_sorted_with_all_first() {
        let questions = vec![
            free("1", "Zeta"),
            free("2", "Alpha"),
            free("3", ""),
            free("4", "Alpha"),
            mc("5", "Mc only"),
        ];
        assert_eq!(
            categories(&questions, StudyMode::Flashcard),
            vec!["all", "Alpha", "Zeta"]
        );
        assert_eq!(
            categories(&questions, StudyMode::MultipleChoice),
            vec!["all", "Mc only"]
        );
    }

    #[test]
    fn test_shuffle_off_freezes_current_order() {
        let mut engine = engine(&five(), FilterState::default().with_shuffle(true));
        let shuffled = ids(&engine);

        engine.advance(Direction::Next);
        engine.toggle_shuffle(false);
        assert_eq!(ids(&engine), shuffled);
        assert_eq!(engine.cursor(), 1);

        // 乱序关闭时 reshuffle 不生效
        engine.reshuffle();
        assert_eq!(ids(&engine), shuffled);
    }

    #[test]
    fn test_reshuffle_keeps_membership() {
        let mut engine = engine(&five(), FilterState::default().with_shuffle(true));
        engine.advance(Direction::Next);
        engine.reshuffle();
        assert_eq!(engine.cursor(), 0);

        let mut members = ids(&engine);
        members.sort();
        assert_eq!(members, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_shuffle_uniformity() {
        let questions: Vec<Arc<Question>> = ["a", "b", "c"].iter().map(|id| free(id, "")).collect();
        let mut engine = engine(&questions, FilterState::default().with_shuffle(true));

        const TRIALS: usize = 60_000;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..TRIALS {
            engine.reshuffle();
            *counts.entry(ids(&engine).concat()).or_insert(0) += 1;
        }

        assert_eq!(counts.len(), 6);
        for (perm, count) in counts {
            let freq = count as f64 / TRIALS as f64;
            assert!(
                (freq - 1.0 / 6.0).abs() < 0.01,
                "排列 {} 的频率 {:.4} 偏离 1/6",
                perm,
                freq
            );
        }
    }

    #[test]
    fn test_refresh_keeps_cursor_in_range() {
        let mut engine = engine(&five(), FilterState::default());
        engine.advance(Direction::Next);
        engine.advance(Direction::Next);

        engine.refresh(&five());
        assert_eq!(engine.cursor(), 2);

        engine.refresh(&five()[..2]);
        assert_eq!(engine.cursor(), 0);
    }
}
