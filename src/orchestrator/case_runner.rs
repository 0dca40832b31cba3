//! 病例交互循环 - 编排层
//!
//! 在终端里驱动一个病例的四个阶段。每个阶段一组命令，
//! 流程守卫都在 CaseSession 里，这里只负责把拒绝翻译成提示。

use anyhow::Result;
use tracing::info;

use crate::clients::{DiagnosticClient, TreatmentClient};
use crate::context::AppContext;
use crate::error::user_facing_message;
use crate::models::diagnostics::{DiagnosticCatalog, SimulationReport};
use crate::models::treatment::{CaseReport, Diagnosis, TreatmentCatalog, TreatmentCheck};
use crate::orchestrator::app::prompt;
use crate::utils::logging::truncate_text;
use crate::workflow::{CaseSession, PhaseState};

/// 驱动一个病例直到退出
pub async fn run_case(app: &AppContext, case_id: &str) -> Result<()> {
    let mut session = CaseSession::load(app, case_id).await?;

    println!("\n{}", "=".repeat(60));
    println!(
        "病例: {}",
        session.case().title.as_deref().unwrap_or(case_id)
    );
    if let Some(description) = &session.case().description {
        println!("{}", description);
    }
    println!("{}", "=".repeat(60));

    // 目录惰性加载，进入对应阶段才去拉
    let mut diagnostic_catalog: Option<DiagnosticCatalog> = None;
    let mut treatment_catalog: Option<TreatmentCatalog> = None;

    loop {
        let proceed = match session.phase() {
            PhaseState::Interview { .. } => interview_turn(app, &mut session).await?,
            PhaseState::Diagnostics(_) => {
                if diagnostic_catalog.is_none() {
                    diagnostic_catalog =
                        Some(DiagnosticClient::new().catalog(&app.http).await?);
                }
                diagnostics_turn(app, &mut session, diagnostic_catalog.as_ref().unwrap()).await?
            }
            PhaseState::Treatment(_) => {
                if treatment_catalog.is_none() {
                    treatment_catalog = Some(TreatmentClient::new().catalog(&app.http).await?);
                }
                treatment_turn(app, &mut session, treatment_catalog.as_ref().unwrap()).await?
            }
            PhaseState::Results(report) => {
                print_final_report(report);
                results_turn(app, &mut session)?
            }
        };

        if !proceed {
            info!("👋 离开病例 {}", case_id);
            return Ok(());
        }
    }
}

/// 问诊阶段的一轮；返回 false 表示退出病例
async fn interview_turn(app: &AppContext, session: &mut CaseSession) -> Result<bool> {
    if session.transcript().is_empty() {
        println!("\n👤 患者进入诊室。开始问诊（输入问题，/finish 结束问诊，/exit 退出）");
    }
    if session.show_finish_hint() {
        println!(
            "💡 已提问 {} 轮，可以 /finish 进入检查阶段",
            session.progress().questions_count
        );
    }

    let input = match prompt("👨‍⚕️ > ") {
        Some(input) if !input.is_empty() => input,
        Some(_) => return Ok(true),
        None => return Ok(false),
    };

    match input.as_str() {
        "/exit" => return Ok(false),
        "/draft" => {
            if let Err(e) = session.save_draft(app).await {
                println!("❌ {}", user_facing_message(&e));
            }
        }
        "/finish" => match session.finish_interview() {
            Ok(()) => println!("\n🔬 进入诊断阶段"),
            Err(e) => println!("❌ {}", e),
        },
        question => match session.ask(app, question).await {
            Ok(reply) => {
                println!("👤 {}", reply);
                if let Some(balance) = session.last_balance() {
                    println!("   (医币余额: {})", balance);
                }
            }
            Err(e) => println!("❌ {}", user_facing_message(&e)),
        },
    }
    Ok(true)
}

/// 诊断阶段的一轮
async fn diagnostics_turn(
    app: &AppContext,
    session: &mut CaseSession,
    catalog: &DiagnosticCatalog,
) -> Result<bool> {
    if session.simulation_report().is_none() {
        print_diagnostic_catalog(catalog);
        println!(
            "已选 {} / {} 项。命令: /pick <id> 勾选, /run 出结果, /back 返回问诊, /draft, /exit",
            session.selected_tests().len(),
            session.ctx().test_limit
        );
    } else {
        println!("命令: /next 进入治疗, /reset 改选检查, /back 返回问诊, /exit");
    }

    let input = match prompt("🔬 > ") {
        Some(input) if !input.is_empty() => input,
        Some(_) => return Ok(true),
        None => return Ok(false),
    };

    let (command, arg) = split_command(&input);
    match command {
        "/exit" => return Ok(false),
        "/back" => {
            if let Err(e) = session.back_to_interview() {
                println!("❌ {}", e);
            }
        }
        "/draft" => {
            if let Err(e) = session.save_draft(app).await {
                println!("❌ {}", user_facing_message(&e));
            }
        }
        "/pick" => match session.toggle_test(arg) {
            Ok(true) => println!("✓ 已勾选 {}", arg),
            Ok(false) => println!("已取消 {}", arg),
            Err(e) => println!("❌ {}", e),
        },
        "/reset" => {
            if let Err(e) = session.reset_diagnostics() {
                println!("❌ {}", e);
            }
        }
        "/run" => match session.run_diagnostics(app).await {
            Ok(report) => print_simulation_report(report),
            Err(e) => println!("❌ {}", user_facing_message(&e)),
        },
        "/next" => match session.proceed_to_treatment() {
            Ok(()) => println!("\n💊 进入治疗阶段"),
            Err(e) => println!("❌ {}", e),
        },
        _ => println!("未知命令: {}", command),
    }
    Ok(true)
}

/// 治疗阶段的一轮
async fn treatment_turn(
    app: &AppContext,
    session: &mut CaseSession,
    catalog: &TreatmentCatalog,
) -> Result<bool> {
    {
        let state = session.treatment().expect("treatment phase");
        if state.check.is_none() {
            print_treatment_catalog(catalog);
            println!(
                "诊断: {} | 处方 {} 药物。命令: /diag <诊断>, /med <id>, /dose <id> <剂量> <频次> <疗程>,\n\
                 /regime <id>, /diet <id>, /nonmed <id>, /check 检查方案, /back, /draft, /exit",
                if state.diagnosis.main.is_empty() {
                    "(未填写)"
                } else {
                    &state.diagnosis.main
                },
                state.plan.medications.len()
            );
        } else {
            println!("方案已检查。命令: /done 完成接诊, /change 改方案, /back, /exit");
        }
    }

    let input = match prompt("💊 > ") {
        Some(input) if !input.is_empty() => input,
        Some(_) => return Ok(true),
        None => return Ok(false),
    };

    let (command, arg) = split_command(&input);
    match command {
        "/exit" => return Ok(false),
        "/back" => {
            if let Err(e) = session.back_to_diagnostics() {
                println!("❌ {}", e);
            }
        }
        "/draft" => {
            if let Err(e) = session.save_draft(app).await {
                println!("❌ {}", user_facing_message(&e));
            }
        }
        "/diag" => {
            let result = session.set_diagnosis(Diagnosis {
                main: arg.to_string(),
                ..Default::default()
            });
            match result {
                Ok(()) => println!("✓ 诊断: {}", arg),
                Err(e) => println!("❌ {}", e),
            }
        }
        "/regime" => match session.select_regime(arg) {
            Ok(()) => println!("✓ режим: {}", arg),
            Err(e) => println!("❌ {}", e),
        },
        "/med" => match crate::models::treatment::find_item(catalog, arg) {
            Some(item) => {
                let item = item.clone();
                match session.toggle_medication(&item) {
                    Ok(true) => println!("✓ 加入处方: {}", item.name),
                    Ok(false) => println!("已移出处方: {}", item.name),
                    Err(e) => println!("❌ {}", e),
                }
            }
            None => println!("目录里没有 {}", arg),
        },
        "/dose" => {
            let mut parts = arg.splitn(4, ' ');
            let id = parts.next().unwrap_or("");
            let dose = parts.next().unwrap_or("");
            let frequency = parts.next().unwrap_or("");
            let duration = parts.next().unwrap_or("");
            match session.set_medication_details(id, dose, frequency, duration) {
                Ok(true) => println!("✓ 已更新 {}", id),
                Ok(false) => println!("处方里没有 {}", id),
                Err(e) => println!("❌ {}", e),
            }
        }
        "/diet" => match session.toggle_diet(arg) {
            Ok(selected) => println!("{} 饮食 {}", if selected { "✓" } else { "已取消" }, arg),
            Err(e) => println!("❌ {}", e),
        },
        "/nonmed" => match session.toggle_non_medication(arg) {
            Ok(selected) => println!("{} 非药物 {}", if selected { "✓" } else { "已取消" }, arg),
            Err(e) => println!("❌ {}", e),
        },
        "/check" => match session.check_treatment(app, catalog).await {
            Ok(check) => print_treatment_check(check),
            Err(e) => println!("❌ {}", user_facing_message(&e)),
        },
        "/change" => {
            if let Err(e) = session.clear_check() {
                println!("❌ {}", e);
            }
        }
        "/done" => match session.complete_case(app).await {
            Ok(_) => println!("\n🏁 接诊完成"),
            Err(e) => println!("❌ {}", user_facing_message(&e)),
        },
        _ => println!("未知命令: {}", command),
    }
    Ok(true)
}

/// 结果阶段的一轮
fn results_turn(app: &AppContext, session: &mut CaseSession) -> Result<bool> {
    let input = match prompt("命令: /retry 重做, /exit 退出 > ") {
        Some(input) => input,
        None => return Ok(false),
    };
    match input.as_str() {
        "/retry" => {
            if let Err(e) = session.retry(app) {
                println!("❌ {}", e);
            }
        }
        "/exit" => return Ok(false),
        _ => {}
    }
    Ok(true)
}

// ========== 输出辅助 ==========

fn split_command(input: &str) -> (&str, &str) {
    match input.split_once(' ') {
        Some((command, arg)) => (command, arg.trim()),
        None => (input, ""),
    }
}

fn print_diagnostic_catalog(catalog: &DiagnosticCatalog) {
    println!("\n检查目录:");
    for category in catalog.values() {
        println!("■ {}", category.name);
        for subcategory in category.subcategories.values() {
            println!("  ▸ {}", subcategory.name);
            for test in &subcategory.tests {
                let time = match test.time_minutes {
                    Some(minutes) if minutes > 0 => format!("{} 分钟", minutes),
                    _ => "即时".to_string(),
                };
                println!(
                    "    [{}] {} — {} (⏱ {})",
                    test.id,
                    test.name,
                    truncate_text(&test.description, 40),
                    time
                );
            }
        }
    }
}

fn print_simulation_report(report: &SimulationReport) {
    println!("\n📋 检查结果:");
    for outcome in report.results.values() {
        println!("● {}", outcome.test_name);
        for value in &outcome.values {
            let arrow = match value.status.as_str() {
                "high" => " ↑",
                "low" => " ↓",
                _ => "",
            };
            let reference = value
                .reference
                .as_deref()
                .map(|r| format!(" (норма {})", r))
                .unwrap_or_default();
            println!(
                "    {}: {} {}{}{}",
                value.name, value.value, value.unit, arrow, reference
            );
        }
        if let Some(interpretation) = &outcome.interpretation {
            println!("    💡 {}", interpretation);
        }
    }

    if let Some(analysis) = &report.analysis {
        if let Some(score) = analysis.score {
            println!("\n得分: {}/100", score);
        }
        print_list("✅ 选对的检查", &analysis.correct);
        print_list("⚠️ 漏掉的检查", &analysis.missing);
        print_list("➖ 多余的检查", &analysis.excessive);
        if !analysis.diagnoses.is_empty() {
            println!("可能的诊断:");
            for hypothesis in &analysis.diagnoses {
                println!(
                    "  [{}] {} — {}",
                    hypothesis.probability.as_deref().unwrap_or("?"),
                    hypothesis.diagnosis,
                    hypothesis.reasoning.as_deref().unwrap_or("")
                );
            }
        }
        print_list("建议", &analysis.recommendations);
        if let Some(feedback) = &analysis.feedback {
            println!("总评: {}", feedback);
        }
    }
}

fn print_treatment_check(check: &TreatmentCheck) {
    println!("\n📋 方案检查结果:");
    if !check.compliance.errors.is_empty() {
        println!("❌ 严重问题:");
        for finding in &check.compliance.errors {
            println!(
                "  [{}] {}",
                finding.kind.as_deref().unwrap_or("-"),
                finding.message
            );
            if let Some(correction) = &finding.correction {
                println!("    → {}", correction);
            }
        }
    }
    if !check.compliance.warnings.is_empty() {
        println!("⚠️ 提醒:");
        for finding in &check.compliance.warnings {
            println!("  {}", finding.message);
        }
    }
    if !check.compliance.correct.is_empty() {
        println!("✅ 正确的处置:");
        for entry in &check.compliance.correct {
            println!("  {}", entry.text());
        }
    }
    if let Some(summary) = &check.summary {
        println!(
            "小结: 错误 {} / 警告 {} / 正确 {}",
            summary.errors_count, summary.warnings_count, summary.correct_count
        );
    }
}

fn print_final_report(report: &CaseReport) {
    let evaluation = &report.evaluation;
    println!("\n{}", "=".repeat(60));
    println!("📊 病例结果: {}/{}", evaluation.score, evaluation.max_score);
    if let Some(feedback) = &evaluation.feedback {
        println!("{}", feedback);
    }
    print_list("✅ 做对的地方", &evaluation.correct_actions);
    print_list("📈 可以改进", &evaluation.improvements);
    print_list("❌ 关键错误", &evaluation.critical_errors);
    if report.ai_analysis.is_some() {
        println!("(包含 AI 详细分析，完整内容见会话日志)");
    }
    println!("{}", "=".repeat(60));
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("{}:", title);
    for item in items {
        println!("  - {}", item);
    }
}
