//! 题库测试交互循环 - 编排层
//!
//! 解析题库文件 → 询问设置 → 逐题作答 → 输出报告并写入本地历史。
//! 与病例系统相互独立，不需要登录。

use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::context::AppContext;
use crate::models::quiz::{QuizMode, QuizReport, QuizSettings};
use crate::orchestrator::app::prompt;
use crate::services::{QuizParser, QuizSession};
use crate::utils::logging::truncate_text;

/// 跑一次题库测试
pub async fn run_quiz(app: &AppContext, path: &Path) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    // 解析失败（格式不对、缺正确答案）直接带着具体题号报出去
    let questions = QuizParser::new().parse_file(path)?;
    println!("\n📄 {}: 解析出 {} 道题目", file_name, questions.len());

    show_history(app);

    let settings = ask_settings(app.config.quiz_exam_minutes);
    let mut session = QuizSession::start(
        file_name,
        questions,
        settings,
        &mut rand::thread_rng(),
    );

    let total = session.len();
    let mut current = 1usize;
    while current <= total {
        // 考试模式到时自动交卷，未答的题按跳过计
        let now = Utc::now();
        if session.is_expired(now) {
            println!("\n⏱ 时间到，自动交卷");
            break;
        }
        if let Some(remaining) = session.remaining_seconds(now) {
            println!("\n⏱ 剩余 {}", format_time(remaining));
        }

        let question = session.question(current).expect("display id in range");
        println!(
            "\n[{}/{}]{} {}",
            current,
            total,
            if session.is_marked(current) { " 🚩" } else { "" },
            question.text
        );
        for option in &question.options {
            println!("  {}) {}", option.letter, option.text);
        }

        let input = match prompt("答案 (字母 / /mark / /prev / /skip / /finish): ") {
            Some(input) if !input.is_empty() => input,
            Some(_) => continue,
            None => break,
        };

        match input.as_str() {
            "/finish" => break,
            "/skip" => current += 1,
            "/prev" => current = current.saturating_sub(1).max(1),
            "/mark" => session.toggle_mark(current),
            answer => {
                let question = session.question(current).expect("display id in range");
                let answer = answer.to_uppercase();
                let picked = question.options.iter().position(|o| o.letter == answer);
                match picked {
                    Some(index) => {
                        session.select_answer(current, index);
                        current += 1;
                    }
                    None => println!("没有选项 {}", answer),
                }
            }
        }
    }

    let report = session.finish(Utc::now());
    print_report(&report);

    app.store
        .push_quiz_report(report, app.config.quiz_history_limit);
    info!("✓ 结果已写入本地历史");
    Ok(())
}

/// 询问测试设置
fn ask_settings(default_exam_minutes: u32) -> QuizSettings {
    let mode = match prompt("模式 (1 训练 / 2 考试, 默认 1): ").as_deref() {
        Some("2") => QuizMode::Exam,
        _ => QuizMode::Training,
    };

    let time_limit_minutes = if mode == QuizMode::Exam {
        prompt(&format!("考试时长分钟 (默认 {}): ", default_exam_minutes))
            .and_then(|s| s.parse().ok())
            .filter(|&m| (1..=300).contains(&m))
            .unwrap_or(default_exam_minutes)
    } else {
        default_exam_minutes
    };

    let shuffle_questions = !matches!(prompt("打乱题目? (Y/n): ").as_deref(), Some("n") | Some("N"));
    let shuffle_answers = !matches!(prompt("打乱选项? (Y/n): ").as_deref(), Some("n") | Some("N"));

    QuizSettings {
        mode,
        time_limit_minutes,
        shuffle_questions,
        shuffle_answers,
    }
}

/// 展示最近的测试历史（最多 5 条）
fn show_history(app: &AppContext) {
    let history = app.store.load_quiz_history();
    if history.is_empty() {
        return;
    }
    println!("\n📊 最近的测试:");
    for record in history.iter().take(5) {
        println!(
            "  {} — {}% ({})",
            record.file_name,
            record.percentage,
            record.date.format("%Y-%m-%d")
        );
    }
}

fn print_report(report: &QuizReport) {
    println!("\n{}", "=".repeat(60));
    println!(
        "📊 {}: {}% — {}",
        report.file_name,
        report.percentage,
        if report.passed() { "通过 ✅" } else { "未通过 ❌" }
    );
    println!(
        "对 {} / 错 {} / 跳过 {} | 用时 {}",
        report.correct,
        report.incorrect,
        report.unanswered,
        format_time(report.time_taken_secs)
    );

    for (idx, outcome) in report.question_results.iter().enumerate() {
        if outcome.is_correct {
            continue;
        }
        println!(
            "\n#{} {} {}",
            idx + 1,
            if outcome.is_unanswered { "—" } else { "✗" },
            truncate_text(&outcome.question, 80)
        );
        if let Some(answer) = &outcome.user_answer {
            println!("  你的答案: {}", answer);
        }
        if let Some(correct) = &outcome.correct_answer {
            println!("  正确答案: {}", correct);
        }
    }
    println!("{}", "=".repeat(60));
}

fn format_time(seconds: i64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
