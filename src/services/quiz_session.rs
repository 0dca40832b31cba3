//! 测试会话 - 业务能力层
//!
//! 管一次答题：按设置打乱题目/选项、记录作答和标记、到时交卷、算分出报告。

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::models::quiz::{
    Question, QuestionOutcome, QuizMode, QuizReport, QuizSettings,
};

/// 测试会话
pub struct QuizSession {
    file_name: String,
    settings: QuizSettings,
    /// 展示顺序的题目（已按设置打乱）
    questions: Vec<Question>,
    /// 展示序号（1 开始）→ 所选选项下标
    answers: HashMap<usize, usize>,
    /// 标记待复查的题目展示序号
    marked: HashSet<usize>,
    started_at: DateTime<Utc>,
    /// 考试模式的交卷时限
    deadline: Option<DateTime<Utc>>,
}

impl QuizSession {
    /// 开始一次测试
    ///
    /// # 参数
    /// - `questions`: 解析出的题目（已通过校验）
    /// - `settings`: 模式与打乱设置
    /// - `rng`: 随机数源（测试里用固定种子）
    pub fn start(
        file_name: impl Into<String>,
        mut questions: Vec<Question>,
        settings: QuizSettings,
        rng: &mut impl Rng,
    ) -> Self {
        if settings.shuffle_questions {
            questions.shuffle(rng);
        }
        if settings.shuffle_answers {
            for q in &mut questions {
                q.options.shuffle(rng);
            }
        }

        let started_at = Utc::now();
        let deadline = match settings.mode {
            QuizMode::Exam => {
                Some(started_at + Duration::minutes(settings.time_limit_minutes as i64))
            }
            QuizMode::Training => None,
        };

        info!(
            "🚀 开始测试: {} 道题, 模式: {}",
            questions.len(),
            settings.mode
        );

        Self {
            file_name: file_name.into(),
            settings,
            questions,
            answers: HashMap::new(),
            marked: HashSet::new(),
            started_at,
            deadline,
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// 按展示序号取题（1 开始）
    pub fn question(&self, display_id: usize) -> Option<&Question> {
        self.questions.get(display_id.checked_sub(1)?)
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn is_marked(&self, display_id: usize) -> bool {
        self.marked.contains(&display_id)
    }

    /// 作答（重复作答覆盖之前的选择）
    pub fn select_answer(&mut self, display_id: usize, option_index: usize) -> bool {
        let valid = self
            .question(display_id)
            .map(|q| option_index < q.options.len())
            .unwrap_or(false);
        if valid {
            self.answers.insert(display_id, option_index);
        }
        valid
    }

    /// 切换"待复查"标记
    pub fn toggle_mark(&mut self, display_id: usize) {
        if !self.marked.remove(&display_id) {
            self.marked.insert(display_id);
        }
    }

    /// 考试模式下时间是否已用完
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline.map(|d| now >= d).unwrap_or(false)
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        self.deadline.map(|d| (d - now).num_seconds().max(0))
    }

    /// 交卷并生成报告
    ///
    /// 未作答的题目计入"跳过"。
    pub fn finish(self, now: DateTime<Utc>) -> QuizReport {
        let mut correct = 0;
        let mut incorrect = 0;
        let mut unanswered = 0;

        let question_results: Vec<QuestionOutcome> = self
            .questions
            .iter()
            .enumerate()
            .map(|(idx, q)| {
                let user_answer = self.answers.get(&(idx + 1)).copied();
                let chosen = user_answer.and_then(|i| q.options.get(i));
                let is_correct = chosen.map(|o| o.is_correct).unwrap_or(false);
                let is_unanswered = user_answer.is_none();

                if is_unanswered {
                    unanswered += 1;
                } else if is_correct {
                    correct += 1;
                } else {
                    incorrect += 1;
                }

                QuestionOutcome {
                    question: q.text.clone(),
                    user_answer: chosen.map(|o| o.text.clone()),
                    correct_answer: q.correct_option().map(|o| o.text.clone()),
                    is_correct,
                    is_unanswered,
                }
            })
            .collect();

        let total = self.questions.len();
        let percentage = if total > 0 {
            ((correct as f64 / total as f64) * 100.0).round() as u32
        } else {
            0
        };

        let report = QuizReport {
            file_name: self.file_name,
            date: now,
            mode: self.settings.mode,
            total_questions: total,
            correct,
            incorrect,
            unanswered,
            percentage,
            time_taken_secs: (now - self.started_at).num_seconds(),
            question_results,
        };

        info!(
            "📊 测试结束: {}% (对 {} / 错 {} / 跳过 {})",
            report.percentage, report.correct, report.incorrect, report.unanswered
        );
        report
    }
}
