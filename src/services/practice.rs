//! 练习判分与统计

use serde::{Deserialize, Serialize};

use crate::models::{Question, QuestionKind};

/// 判分结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect { expected: String },
    /// 输入为空，不计入统计
    Blank,
}

/// 练习统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeStats {
    pub attempts: u32,
    pub correct: u32,
}

impl PracticeStats {
    pub fn record(&mut self, verdict: &Verdict) {
        match verdict {
            Verdict::Blank => {}
            Verdict::Correct => {
                self.attempts += 1;
                self.correct += 1;
            }
            Verdict::Incorrect { .. } => self.attempts += 1,
        }
    }

    /// 正确率（四舍五入的百分比），没有作答时为 0
    pub fn accuracy(&self) -> u32 {
        if self.attempts == 0 {
            return 0;
        }
        (self.correct as f64 * 100.0 / self.attempts as f64).round() as u32
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 判分
///
/// - 问答题：忽略大小写，相等或互相包含即算对
/// - 选择题：输入的选项 key 与 correctKey 相同（忽略大小写）
pub fn grade(question: &Question, input: &str) -> Verdict {
    let input = input.trim();
    if input.is_empty() {
        return Verdict::Blank;
    }

    let correct = match &question.kind {
        QuestionKind::FreeResponse => {
            let user = input.to_lowercase();
            let expected = question.answer.trim().to_lowercase();
            !expected.is_empty()
                && (user == expected || user.contains(&expected) || expected.contains(&user))
        }
        QuestionKind::MultipleChoice { correct_key, .. } => input.eq_ignore_ascii_case(correct_key),
    };

    if correct {
        Verdict::Correct
    } else {
        Verdict::Incorrect {
            expected: question.answer.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Choice;

    fn free(answer: &str) -> Question {
        Question {
            id: "1".to_string(),
            category: String::new(),
            question: "Q".to_string(),
            answer: answer.to_string(),
            reference: String::new(),
            kind: QuestionKind::FreeResponse,
        }
    }

    #[test]
    fn test_free_response_grading() {
        let q = free("Mitochondria");
        assert_eq!(grade(&q, "mitochondria"), Verdict::Correct);
        assert_eq!(grade(&q, "the mitochondria, obviously"), Verdict::Correct);
        assert_eq!(grade(&q, "mito"), Verdict::Correct);
        assert!(matches!(grade(&q, "ribosome"), Verdict::Incorrect { .. }));
        assert_eq!(grade(&q, "   "), Verdict::Blank);
    }

    #[test]
    fn test_multiple_choice_grading() {
        let q = Question {
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
                correct_key: "B".to_string(),
                explanation: None,
            },
            ..free("bar")
        };
        assert_eq!(grade(&q, "b"), Verdict::Correct);
        assert!(matches!(grade(&q, "A"), Verdict::Incorrect { .. }));
    }

    #[test]
    fn test_stats_accuracy() {
        let mut stats = PracticeStats::default();
        assert_eq!(stats.accuracy(), 0);

        stats.record(&Verdict::Correct);
        stats.record(&Verdict::Incorrect {
            expected: "x".to_string(),
        });
        stats.record(&Verdict::Correct);
        stats.record(&Verdict::Blank);

        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.correct, 2);
        assert_eq!(stats.accuracy(), 67);

        stats.reset();
        assert_eq!(stats, PracticeStats::default());
    }
}
