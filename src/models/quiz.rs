//! 题库数据结构
//!
//! 题目和选项在解析时构建一次，开始测试前可以被整体打乱，
//! 测试结束后除了汇总报告（写入本地历史）之外全部丢弃。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 答案选项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizOption {
    /// 选项字母（A-J，超出后退化为数字）
    pub letter: String,
    pub text: String,
    pub is_correct: bool,
    /// 在源文件中的原始位置（打乱后仍可追溯）
    pub original_index: usize,
}

/// 单个题目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// 题号（从 1 开始，按解析顺序分配）
    pub id: u32,
    pub text: String,
    pub options: Vec<QuizOption>,
}

impl Question {
    /// 找到标记为正确的选项
    pub fn correct_option(&self) -> Option<&QuizOption> {
        self.options.iter().find(|o| o.is_correct)
    }

    pub fn has_correct_option(&self) -> bool {
        self.options.iter().any(|o| o.is_correct)
    }
}

/// 测试模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuizMode {
    /// 训练模式：无计时
    Training,
    /// 考试模式：计时，到时自动交卷
    Exam,
}

impl std::fmt::Display for QuizMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuizMode::Training => write!(f, "训练"),
            QuizMode::Exam => write!(f, "考试"),
        }
    }
}

/// 测试设置
#[derive(Debug, Clone)]
pub struct QuizSettings {
    pub mode: QuizMode,
    /// 考试模式时长（分钟），训练模式忽略
    pub time_limit_minutes: u32,
    pub shuffle_questions: bool,
    pub shuffle_answers: bool,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            mode: QuizMode::Training,
            time_limit_minutes: 90,
            shuffle_questions: true,
            shuffle_answers: true,
        }
    }
}

/// 单题作答结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question: String,
    pub user_answer: Option<String>,
    pub correct_answer: Option<String>,
    pub is_correct: bool,
    pub is_unanswered: bool,
}

/// 一次测试的汇总报告
///
/// 写入本地历史（最多保留 50 条）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizReport {
    pub file_name: String,
    pub date: DateTime<Utc>,
    pub mode: QuizMode,
    pub total_questions: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub unanswered: usize,
    /// 正确率（四舍五入到整数百分比）
    pub percentage: u32,
    pub time_taken_secs: i64,
    pub question_results: Vec<QuestionOutcome>,
}

impl QuizReport {
    /// 70% 及以上视为通过
    pub fn passed(&self) -> bool {
        self.percentage >= 70
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_option_lookup() {
        let q = Question {
            id: 1,
            text: "测试题".to_string(),
            options: vec![
                QuizOption {
                    letter: "A".to_string(),
                    text: "错误".to_string(),
                    is_correct: false,
                    original_index: 0,
                },
                QuizOption {
                    letter: "B".to_string(),
                    text: "正确".to_string(),
                    is_correct: true,
                    original_index: 1,
                },
            ],
        };
        assert!(q.has_correct_option());
        assert_eq!(q.correct_option().unwrap().letter, "B");
    }

    #[test]
    fn test_pass_threshold() {
        let mut report = QuizReport {
            file_name: "demo.txt".to_string(),
            date: Utc::now(),
            mode: QuizMode::Training,
            total_questions: 10,
            correct: 7,
            incorrect: 3,
            unanswered: 0,
            percentage: 70,
            time_taken_secs: 60,
            question_results: Vec::new(),
        };
        assert!(report.passed());
        report.percentage = 69;
        assert!(!report.passed());
    }
}
