//! 病例流程 - 流程层
//!
//! 一个病例四个阶段，严格向前推进：
//!
//! ```text
//! 问诊 (interview) → 诊断 (diagnostics) → 治疗 (treatment) → 结果 (results)
//! ```
//!
//! 例外只有两个显式的"返回"：诊断→问诊、治疗→诊断，以及结果页的"重做"。
//! 每个阶段的出口都有客户端守卫，守卫不过就不会发出网络请求：
//!
//! - 问诊 → 诊断：问答轮数达到下限
//! - 诊断提交：选择非空且不超过限额
//! - 治疗 → 结果：治疗方案至少通过过一次检查
//!
//! 阶段用带负载的枚举表达，每个阶段只携带自己的数据，
//! 跨阶段的状态（对话记录、问诊进度）挂在会话上。

use anyhow::Result;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

use crate::clients::{CaseClient, ChatClient, DiagnosticClient, MedcoinClient, TreatmentClient};
use crate::context::AppContext;
use crate::error::{AppError, FlowError};
use crate::models::case::{CaseInfo, ChatMessage, ChatRole, InterviewProgress};
use crate::models::diagnostics::SimulationReport;
use crate::models::treatment::{
    CaseReport, Diagnosis, Medication, Observation, Referral, SickLeave, TreatmentCatalog,
    TreatmentCheck, TreatmentItem, TreatmentPlan,
};
use crate::services::detect_language;
use crate::workflow::case_ctx::CaseCtx;

/// 诊断阶段的数据
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsState {
    /// 已选检查项目 id
    pub selected_tests: Vec<String>,
    /// 模拟结果（提交成功后填充，带入治疗阶段）
    pub report: Option<SimulationReport>,
}

/// 治疗阶段的数据
#[derive(Debug, Clone, Default)]
pub struct TreatmentState {
    /// 从诊断阶段带过来的数据（"返回诊断"时原样还回去）
    pub diagnostics: DiagnosticsState,
    pub diagnosis: Diagnosis,
    pub plan: TreatmentPlan,
    /// 检查通过后填写的补充字段
    pub observation: Observation,
    pub hospitalization_indications: String,
    pub referral: Referral,
    pub sick_leave: SickLeave,
    /// 最近一次成功的方案检查
    pub check: Option<TreatmentCheck>,
}

/// 当前阶段（带各自的负载）
pub enum PhaseState {
    /// 问诊；从诊断阶段返回时暂存其数据，再次前进时还原
    Interview { stashed: Option<DiagnosticsState> },
    Diagnostics(DiagnosticsState),
    Treatment(TreatmentState),
    Results(CaseReport),
}

impl PhaseState {
    /// 阶段名（日志与错误信息用）
    pub fn name(&self) -> &'static str {
        match self {
            PhaseState::Interview { .. } => "问诊",
            PhaseState::Diagnostics(_) => "诊断",
            PhaseState::Treatment(_) => "治疗",
            PhaseState::Results(_) => "结果",
        }
    }

    /// 阶段编号（草稿接口用，与前端页面编号一致）
    pub fn number(&self) -> u8 {
        match self {
            PhaseState::Interview { .. } => 1,
            PhaseState::Diagnostics(_) => 2,
            PhaseState::Treatment(_) | PhaseState::Results(_) => 3,
        }
    }
}

/// 病例会话
///
/// 持有一个病例从问诊到结果的全部状态；网络能力按调用传入（AppContext）。
pub struct CaseSession {
    ctx: CaseCtx,
    case: CaseInfo,
    /// 完整对话记录（医生/患者交替），跨阶段保留
    transcript: Vec<ChatMessage>,
    progress: InterviewProgress,
    /// 会话语言，第一条医生消息检测后固定
    language: Option<&'static str>,
    phase: PhaseState,
    /// 最近一次扣费后的余额（显示用）
    last_balance: Option<i64>,

    chat: ChatClient,
    medcoins: MedcoinClient,
    diagnostics: DiagnosticClient,
    treatments: TreatmentClient,
    cases: CaseClient,
}

impl CaseSession {
    /// 用已有数据创建会话（不发网络请求）
    pub fn new(ctx: CaseCtx, case: CaseInfo, transcript: Vec<ChatMessage>) -> Self {
        // 恢复的记录里有医生消息就沿用它的语言
        let language = transcript
            .iter()
            .find(|m| m.role == ChatRole::Doctor)
            .map(|m| detect_language(&m.text));

        Self {
            ctx,
            case,
            transcript,
            progress: InterviewProgress::default(),
            language,
            phase: PhaseState::Interview { stashed: None },
            last_balance: None,
            chat: ChatClient::new(),
            medcoins: MedcoinClient::new(),
            diagnostics: DiagnosticClient::new(),
            treatments: TreatmentClient::new(),
            cases: CaseClient::new(),
        }
    }

    /// 加载病例并恢复本地镜像的对话记录
    pub async fn load(app: &AppContext, case_id: &str) -> Result<Self> {
        let ctx = CaseCtx::from_config(case_id, &app.config);
        let case = CaseClient::new().get_case(&app.http, case_id).await?;
        let transcript = app.store.load_conversation(case_id);
        if !transcript.is_empty() {
            info!("↺ 恢复了 {} 条历史对话", transcript.len());
        }
        info!("✓ 病例加载完成 {}", ctx);
        Ok(Self::new(ctx, case, transcript))
    }

    // ========== 通用访问 ==========

    pub fn ctx(&self) -> &CaseCtx {
        &self.ctx
    }

    pub fn case(&self) -> &CaseInfo {
        &self.case
    }

    pub fn phase(&self) -> &PhaseState {
        &self.phase
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn progress(&self) -> &InterviewProgress {
        &self.progress
    }

    pub fn language(&self) -> Option<&'static str> {
        self.language
    }

    pub fn last_balance(&self) -> Option<i64> {
        self.last_balance
    }

    // ========== 问诊阶段 ==========

    /// 是否已达到"可以结束问诊"的轮数
    pub fn can_finish_interview(&self) -> bool {
        self.progress.questions_count >= self.ctx.min_exchanges
    }

    /// 是否该显示"可以结束"的提示（不强制转换阶段）
    pub fn show_finish_hint(&self) -> bool {
        self.progress.questions_count >= self.ctx.hint_after
    }

    /// 向 AI 患者提问
    ///
    /// 顺序固定：先扣医币，扣费被拒就不发消息、不动对话记录；
    /// 消息成功后追加问答两条记录、镜像到本地并更新问诊进度。
    pub async fn ask(&mut self, app: &AppContext, question: &str) -> Result<String> {
        self.require_interview()?;

        let language = match self.language {
            Some(lang) => lang,
            None => {
                let lang = detect_language(question);
                self.language = Some(lang);
                debug!("会话语言: {}", lang);
                lang
            }
        };

        // 每次提问扣一次费；未登录的体验会话跳过
        if app.http.has_token() {
            let description = format!("Вопрос пациенту: \"{}...\"", preview(question, 50));
            match self
                .medcoins
                .spend(&app.http, self.ctx.medcoin_cost, &self.ctx.case_id, &description)
                .await
            {
                Ok(receipt) => {
                    self.last_balance = Some(receipt.balance);
                }
                Err(e) => {
                    if is_balance_rejection(&e) {
                        // 域拒绝：消息不发送，对话记录保持原样
                        return Err(e);
                    }
                    // 扣费接口本身连不上不算致命，消息照发
                    warn!("扣费失败但继续发送消息: {}", e);
                }
            }
        }

        let reply = self
            .chat
            .send_turn(
                &app.http,
                &self.ctx.case_id,
                question,
                &self.transcript,
                Some(language),
            )
            .await?;

        self.transcript.push(ChatMessage::doctor(question));
        self.transcript.push(ChatMessage::patient(reply.clone()));
        // 尽力镜像，不保证与内存状态事务一致
        app.store.save_conversation(&self.ctx.case_id, &self.transcript);

        self.progress.register_exchange(question);
        Ok(reply)
    }

    /// 结束问诊，进入诊断阶段
    ///
    /// 轮数不足时拒绝；之前从诊断阶段返回过的话，恢复当时的选择。
    pub fn finish_interview(&mut self) -> Result<(), FlowError> {
        if !self.can_finish_interview() {
            return Err(FlowError::InterviewTooShort {
                asked: self.progress.questions_count,
                required: self.ctx.min_exchanges,
            });
        }

        match &mut self.phase {
            PhaseState::Interview { stashed } => {
                let state = stashed.take().unwrap_or_default();
                info!("➡️ 进入诊断阶段");
                self.phase = PhaseState::Diagnostics(state);
                Ok(())
            }
            other => Err(FlowError::PhaseMismatch {
                expected: "问诊",
                actual: other.name(),
            }),
        }
    }

    // ========== 诊断阶段 ==========

    /// 勾选 / 取消一个检查项目，返回操作后是否选中
    pub fn toggle_test(&mut self, test_id: &str) -> Result<bool, FlowError> {
        let state = self.require_diagnostics_mut()?;
        if let Some(pos) = state.selected_tests.iter().position(|id| id == test_id) {
            state.selected_tests.remove(pos);
            Ok(false)
        } else {
            state.selected_tests.push(test_id.to_string());
            Ok(true)
        }
    }

    pub fn selected_tests(&self) -> &[String] {
        match &self.phase {
            PhaseState::Diagnostics(d) => &d.selected_tests,
            PhaseState::Treatment(t) => &t.diagnostics.selected_tests,
            _ => &[],
        }
    }

    /// 提交前的选择校验（不发网络请求）
    pub fn validate_selection(&self) -> Result<(), FlowError> {
        let selected = self.selected_tests().len();
        if selected == 0 {
            return Err(FlowError::EmptySelection);
        }
        if selected > self.ctx.test_limit {
            return Err(FlowError::TestLimitExceeded {
                selected,
                limit: self.ctx.test_limit,
            });
        }
        Ok(())
    }

    /// 执行诊断模拟
    ///
    /// 守卫先行：选择为空或超限直接拒绝，任何网络请求都不会发出。
    pub async fn run_diagnostics(&mut self, app: &AppContext) -> Result<&SimulationReport> {
        self.require_diagnostics()?;
        self.validate_selection()?;

        let case_data = self.build_case_data();
        let selected = self.selected_tests().to_vec();
        let report = self
            .diagnostics
            .run_simulation(&app.http, &case_data, &selected, self.ctx.test_limit)
            .await?;

        match &mut self.phase {
            PhaseState::Diagnostics(state) => {
                state.report = Some(report);
                Ok(state.report.as_ref().expect("report just stored"))
            }
            _ => unreachable!("阶段在本方法内不会改变"),
        }
    }

    /// 清空本次诊断（改选时用）
    pub fn reset_diagnostics(&mut self) -> Result<(), FlowError> {
        let state = self.require_diagnostics_mut()?;
        state.selected_tests.clear();
        state.report = None;
        Ok(())
    }

    pub fn simulation_report(&self) -> Option<&SimulationReport> {
        match &self.phase {
            PhaseState::Diagnostics(d) => d.report.as_ref(),
            PhaseState::Treatment(t) => t.diagnostics.report.as_ref(),
            _ => None,
        }
    }

    /// 从诊断阶段返回问诊（选择和结果暂存，下次前进时还原）
    pub fn back_to_interview(&mut self) -> Result<(), FlowError> {
        match std::mem::replace(&mut self.phase, PhaseState::Interview { stashed: None }) {
            PhaseState::Diagnostics(state) => {
                info!("⬅️ 返回问诊阶段");
                self.phase = PhaseState::Interview {
                    stashed: Some(state),
                };
                Ok(())
            }
            other => {
                let actual = other.name();
                self.phase = other;
                Err(FlowError::PhaseMismatch {
                    expected: "诊断",
                    actual,
                })
            }
        }
    }

    /// 进入治疗阶段（要求诊断模拟已经出过结果）
    pub fn proceed_to_treatment(&mut self) -> Result<(), FlowError> {
        match &self.phase {
            PhaseState::Diagnostics(state) => {
                if state.report.is_none() {
                    return Err(FlowError::DiagnosticsNotRun);
                }
            }
            other => {
                return Err(FlowError::PhaseMismatch {
                    expected: "诊断",
                    actual: other.name(),
                })
            }
        }

        if let PhaseState::Diagnostics(state) =
            std::mem::replace(&mut self.phase, PhaseState::Interview { stashed: None })
        {
            info!("➡️ 进入治疗阶段");
            self.phase = PhaseState::Treatment(TreatmentState {
                diagnostics: state,
                ..Default::default()
            });
        }
        Ok(())
    }

    // ========== 治疗阶段 ==========

    pub fn treatment(&self) -> Option<&TreatmentState> {
        match &self.phase {
            PhaseState::Treatment(t) => Some(t),
            _ => None,
        }
    }

    /// 填写诊断结论（检查结果保留，原型里诊断栏在检查后仍可编辑）
    pub fn set_diagnosis(&mut self, diagnosis: Diagnosis) -> Result<(), FlowError> {
        let state = self.require_treatment_mut()?;
        state.diagnosis = diagnosis;
        Ok(())
    }

    /// 选择治疗режим（再点一次取消）
    pub fn select_regime(&mut self, regime_id: &str) -> Result<(), FlowError> {
        let state = self.require_treatment_mut()?;
        if state.plan.regime.as_deref() == Some(regime_id) {
            state.plan.regime = None;
        } else {
            state.plan.regime = Some(regime_id.to_string());
        }
        state.check = None;
        Ok(())
    }

    /// 勾选 / 取消一个药物，返回操作后是否在处方里
    pub fn toggle_medication(&mut self, item: &TreatmentItem) -> Result<bool, FlowError> {
        let state = self.require_treatment_mut()?;
        state.check = None;
        if let Some(pos) = state.plan.medications.iter().position(|m| m.id == item.id) {
            state.plan.medications.remove(pos);
            Ok(false)
        } else {
            state.plan.medications.push(Medication::from_item(item));
            Ok(true)
        }
    }

    /// 修改处方中某个药物的剂量/频次/疗程
    pub fn set_medication_details(
        &mut self,
        medication_id: &str,
        dose: &str,
        frequency: &str,
        duration: &str,
    ) -> Result<bool, FlowError> {
        let state = self.require_treatment_mut()?;
        match state
            .plan
            .medications
            .iter_mut()
            .find(|m| m.id == medication_id)
        {
            Some(med) => {
                med.dose = dose.to_string();
                med.frequency = frequency.to_string();
                med.duration = duration.to_string();
                state.check = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn toggle_diet(&mut self, item_id: &str) -> Result<bool, FlowError> {
        let state = self.require_treatment_mut()?;
        state.check = None;
        Ok(toggle_id(&mut state.plan.diet, item_id))
    }

    pub fn toggle_non_medication(&mut self, item_id: &str) -> Result<bool, FlowError> {
        let state = self.require_treatment_mut()?;
        state.check = None;
        Ok(toggle_id(&mut state.plan.non_medication, item_id))
    }

    /// 填写检查通过后的补充信息（不影响已有的检查结果）
    pub fn set_follow_up(
        &mut self,
        observation: Observation,
        hospitalization_indications: String,
        referral: Referral,
        sick_leave: SickLeave,
    ) -> Result<(), FlowError> {
        let state = self.require_treatment_mut()?;
        state.observation = observation;
        state.hospitalization_indications = hospitalization_indications;
        state.referral = referral;
        state.sick_leave = sick_leave;
        Ok(())
    }

    /// 检查治疗方案
    ///
    /// 守卫先行：主要诊断没填直接拒绝，不发网络请求。
    pub async fn check_treatment(
        &mut self,
        app: &AppContext,
        catalog: &TreatmentCatalog,
    ) -> Result<&TreatmentCheck> {
        {
            let state = self.require_treatment()?;
            if state.diagnosis.main.trim().is_empty() {
                return Err(FlowError::DiagnosisMissing.into());
            }
        }

        let (case_data, treatment_data) = {
            let state = self.require_treatment()?;
            let case_data = json!({
                "id": self.case.id,
                "correctDiagnosis": self
                    .case
                    .correct_diagnosis
                    .clone()
                    .unwrap_or_else(|| state.diagnosis.main.clone()),
                "age": self.case.extracted_age(),
                "gender": self.case.gender,
                "symptoms": self.case.symptoms,
            });
            (case_data, state.plan.to_check_wire(catalog))
        };

        let check = self
            .treatments
            .check(&app.http, &case_data, &treatment_data)
            .await?;

        match &mut self.phase {
            PhaseState::Treatment(state) => {
                state.check = Some(check);
                Ok(state.check.as_ref().expect("check just stored"))
            }
            _ => unreachable!("阶段在本方法内不会改变"),
        }
    }

    /// 丢掉检查结果回去改方案
    pub fn clear_check(&mut self) -> Result<(), FlowError> {
        let state = self.require_treatment_mut()?;
        state.check = None;
        Ok(())
    }

    /// 从治疗阶段返回诊断（诊断数据原样还回去）
    pub fn back_to_diagnostics(&mut self) -> Result<(), FlowError> {
        match std::mem::replace(&mut self.phase, PhaseState::Interview { stashed: None }) {
            PhaseState::Treatment(state) => {
                info!("⬅️ 返回诊断阶段");
                self.phase = PhaseState::Diagnostics(state.diagnostics);
                Ok(())
            }
            other => {
                let actual = other.name();
                self.phase = other;
                Err(FlowError::PhaseMismatch {
                    expected: "治疗",
                    actual,
                })
            }
        }
    }

    /// 保存草稿到后端（与阶段转换无关，可随时调用）
    pub async fn save_draft(&self, app: &AppContext) -> Result<()> {
        let treatment_data = match &self.phase {
            PhaseState::Treatment(state) => state.plan.to_wire(),
            _ => JsonValue::Null,
        };
        self.cases
            .save_draft(
                &app.http,
                &self.ctx.case_id,
                self.phase.number(),
                &treatment_data,
                self.selected_tests(),
            )
            .await
    }

    /// 完成接诊：基础评估 + AI 分析，进入结果阶段
    ///
    /// 守卫先行：方案没通过过检查直接拒绝。评估失败不前进、不丢状态；
    /// AI 分析失败只降级（结果里没有分析部分）。
    pub async fn complete_case(&mut self, app: &AppContext) -> Result<&CaseReport> {
        let treatment_data = {
            let state = self.require_treatment()?;
            if state.check.is_none() {
                return Err(FlowError::TreatmentNotChecked.into());
            }
            json!({
                "diagnosis": state.diagnosis,
                "treatment": state.plan.to_wire(),
                "observation": {
                    "controlVisit": state.observation.control_visit,
                    "controlTests": state.observation.control_tests,
                    "recoveryCriteria": state.observation.recovery_criteria,
                },
                "hospitalizationIndications": state.hospitalization_indications,
                "referral": state.referral,
                "sickLeave": state.sick_leave,
                "checkResults": state.check,
            })
        };

        let selected = self.selected_tests().to_vec();
        let evaluation = self
            .cases
            .complete_case(
                &app.http,
                &self.ctx.case_id,
                &self.progress,
                &selected,
                &treatment_data,
            )
            .await?;

        let user_diagnosis = {
            let state = self.require_treatment()?;
            if state.diagnosis.main.is_empty() {
                evaluation.user_diagnosis.clone().unwrap_or_default()
            } else {
                state.diagnosis.main.clone()
            }
        };

        // AI 分析失败只降级，不影响基础评估
        let ai_analysis = match self
            .chat
            .analyze_case(
                &app.http,
                &self.ctx.case_id,
                &self.transcript,
                &user_diagnosis,
                &self.progress,
                &selected,
                &treatment_data,
            )
            .await
        {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                warn!("AI 分析获取失败，只展示基础评估: {}", e);
                None
            }
        };

        info!("🏁 病例完成，进入结果阶段");
        self.phase = PhaseState::Results(CaseReport {
            evaluation,
            ai_analysis,
        });

        match &self.phase {
            PhaseState::Results(report) => Ok(report),
            _ => unreachable!(),
        }
    }

    // ========== 结果阶段 ==========

    pub fn final_report(&self) -> Option<&CaseReport> {
        match &self.phase {
            PhaseState::Results(report) => Some(report),
            _ => None,
        }
    }

    /// 重做：回到问诊阶段，内存里的对话和进度丢弃，本地镜像一并清掉
    pub fn retry(&mut self, app: &AppContext) -> Result<(), FlowError> {
        match &self.phase {
            PhaseState::Results(_) => {
                self.transcript.clear();
                self.progress = InterviewProgress::default();
                self.language = None;
                app.store.clear_conversation(&self.ctx.case_id);
                self.phase = PhaseState::Interview { stashed: None };
                info!("🔄 重新开始问诊");
                Ok(())
            }
            other => Err(FlowError::PhaseMismatch {
                expected: "结果",
                actual: other.name(),
            }),
        }
    }

    // ========== 内部 ==========

    /// 组装发给诊断模拟的病例摘要
    fn build_case_data(&self) -> JsonValue {
        let complaints = if self.case.symptoms.is_empty() {
            self.case.description.clone().unwrap_or_default()
        } else {
            self.case.symptoms.join(", ")
        };
        let history = if self.case.additional_info.is_empty() {
            self.case.examination_findings.clone().unwrap_or_default()
        } else {
            self.case.additional_info.join(". ")
        };

        json!({
            "age": self.case.extracted_age(),
            "gender": self.case.gender.clone().unwrap_or_else(|| "не указан".to_string()),
            "complaints": complaints,
            "history": history,
            "diagnosis": self.case.correct_diagnosis.clone().unwrap_or_default(),
            "interviewData": self.interview_summary(),
        })
    }

    /// 问诊摘要：患者最近 5 条回答拼在一起
    fn interview_summary(&self) -> String {
        let replies: Vec<&str> = self
            .transcript
            .iter()
            .filter(|m| m.role == ChatRole::Patient)
            .map(|m| m.text.as_str())
            .collect();
        let start = replies.len().saturating_sub(5);
        replies[start..].join(". ")
    }

    fn require_interview(&self) -> Result<(), FlowError> {
        match &self.phase {
            PhaseState::Interview { .. } => Ok(()),
            other => Err(FlowError::PhaseMismatch {
                expected: "问诊",
                actual: other.name(),
            }),
        }
    }

    fn require_diagnostics(&self) -> Result<&DiagnosticsState, FlowError> {
        match &self.phase {
            PhaseState::Diagnostics(state) => Ok(state),
            other => Err(FlowError::PhaseMismatch {
                expected: "诊断",
                actual: other.name(),
            }),
        }
    }

    fn require_diagnostics_mut(&mut self) -> Result<&mut DiagnosticsState, FlowError> {
        match &mut self.phase {
            PhaseState::Diagnostics(state) => Ok(state),
            other => Err(FlowError::PhaseMismatch {
                expected: "诊断",
                actual: other.name(),
            }),
        }
    }

    fn require_treatment(&self) -> Result<&TreatmentState, FlowError> {
        match &self.phase {
            PhaseState::Treatment(state) => Ok(state),
            other => Err(FlowError::PhaseMismatch {
                expected: "治疗",
                actual: other.name(),
            }),
        }
    }

    fn require_treatment_mut(&mut self) -> Result<&mut TreatmentState, FlowError> {
        match &mut self.phase {
            PhaseState::Treatment(state) => Ok(state),
            other => Err(FlowError::PhaseMismatch {
                expected: "治疗",
                actual: other.name(),
            }),
        }
    }
}

/// 扣费被拒（余额不足 / 日限额）才为真；连接类失败不算
fn is_balance_rejection(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<AppError>(), Some(AppError::Balance(_)))
}

fn toggle_id(ids: &mut Vec<String>, id: &str) -> bool {
    if let Some(pos) = ids.iter().position(|existing| existing == id) {
        ids.remove(pos);
        false
    } else {
        ids.push(id.to_string());
        true
    }
}

fn preview(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::BalanceError;

    fn test_ctx() -> CaseCtx {
        CaseCtx::from_config("case-1", &Config::default())
    }

    fn test_session() -> CaseSession {
        CaseSession::new(test_ctx(), CaseInfo::default(), Vec::new())
    }

    /// 不可达地址 + 临时目录的上下文：守卫类测试里任何真正发出的请求都会失败，
    /// 用来证明守卫在网络之前就拦截了
    fn offline_app(name: &str) -> AppContext {
        let dir = std::env::temp_dir().join(format!(
            "medsim_flow_test_{}_{}",
            name,
            std::process::id()
        ));
        let config = Config {
            api_base_url: "http://127.0.0.1:1".to_string(),
            storage_dir: dir.to_string_lossy().to_string(),
            ..Default::default()
        };
        AppContext::new(config).unwrap()
    }

    fn advance_to_diagnostics(session: &mut CaseSession) {
        session.progress.questions_count = session.ctx.min_exchanges;
        session.finish_interview().unwrap();
    }

    fn advance_to_treatment(session: &mut CaseSession) {
        advance_to_diagnostics(session);
        session.toggle_test("cbc").unwrap();
        if let PhaseState::Diagnostics(state) = &mut session.phase {
            state.report = Some(SimulationReport::default());
        }
        session.proceed_to_treatment().unwrap();
    }

    #[test]
    fn test_interview_guard_blocks_early_exit() {
        let mut session = test_session();
        session.progress.questions_count = 7;

        let err = session.finish_interview().unwrap_err();
        assert_eq!(
            err,
            FlowError::InterviewTooShort {
                asked: 7,
                required: 8
            }
        );
        assert!(matches!(session.phase, PhaseState::Interview { .. }));

        session.progress.questions_count = 8;
        assert!(session.can_finish_interview());
        session.finish_interview().unwrap();
        assert!(matches!(session.phase, PhaseState::Diagnostics(_)));
    }

    #[test]
    fn test_finish_hint_does_not_force_transition() {
        let mut session = test_session();
        session.progress.questions_count = 5;
        assert!(session.show_finish_hint());
        assert!(!session.can_finish_interview());
    }

    #[test]
    fn test_selection_limit_cites_both_counts() {
        let mut session = test_session();
        advance_to_diagnostics(&mut session);

        for i in 0..9 {
            session.toggle_test(&format!("test-{}", i)).unwrap();
        }

        let err = session.validate_selection().unwrap_err();
        assert_eq!(
            err,
            FlowError::TestLimitExceeded {
                selected: 9,
                limit: 8
            }
        );
        let msg = err.to_string();
        assert!(msg.contains('9'));
        assert!(msg.contains('8'));
    }

    /// 超限提交在任何网络请求之前就被拒绝：
    /// 上下文指向不可达地址，拿到的却是限额错误而不是连接错误
    #[tokio::test]
    async fn test_over_limit_rejected_before_network() {
        let app = offline_app("over_limit");
        let mut session = test_session();
        advance_to_diagnostics(&mut session);
        for i in 0..9 {
            session.toggle_test(&format!("test-{}", i)).unwrap();
        }

        let err = session.run_diagnostics(&app).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<FlowError>(),
            Some(&FlowError::TestLimitExceeded {
                selected: 9,
                limit: 8
            })
        );
    }

    #[tokio::test]
    async fn test_empty_selection_rejected_before_network() {
        let app = offline_app("empty_selection");
        let mut session = test_session();
        advance_to_diagnostics(&mut session);

        let err = session.run_diagnostics(&app).await.unwrap_err();
        assert_eq!(err.downcast_ref::<FlowError>(), Some(&FlowError::EmptySelection));
    }

    #[test]
    fn test_toggle_test_roundtrip() {
        let mut session = test_session();
        advance_to_diagnostics(&mut session);

        assert!(session.toggle_test("cbc").unwrap());
        assert!(session.toggle_test("crp").unwrap());
        assert_eq!(session.selected_tests(), ["cbc", "crp"]);
        assert!(!session.toggle_test("cbc").unwrap());
        assert_eq!(session.selected_tests(), ["crp"]);
    }

    #[test]
    fn test_back_to_interview_preserves_selection() {
        let mut session = test_session();
        advance_to_diagnostics(&mut session);
        session.toggle_test("cbc").unwrap();

        session.back_to_interview().unwrap();
        assert!(matches!(session.phase, PhaseState::Interview { .. }));

        // 再次前进时恢复之前的选择
        session.finish_interview().unwrap();
        assert_eq!(session.selected_tests(), ["cbc"]);
    }

    #[test]
    fn test_treatment_requires_simulation_report() {
        let mut session = test_session();
        advance_to_diagnostics(&mut session);
        session.toggle_test("cbc").unwrap();

        assert_eq!(
            session.proceed_to_treatment().unwrap_err(),
            FlowError::DiagnosticsNotRun
        );

        if let PhaseState::Diagnostics(state) = &mut session.phase {
            state.report = Some(SimulationReport::default());
        }
        session.proceed_to_treatment().unwrap();
        assert!(matches!(session.phase, PhaseState::Treatment(_)));
        // 已选检查带入治疗阶段
        assert_eq!(session.selected_tests(), ["cbc"]);
    }

    #[tokio::test]
    async fn test_check_requires_diagnosis_before_network() {
        let app = offline_app("check_diagnosis");
        let mut session = test_session();
        advance_to_treatment(&mut session);

        let catalog = TreatmentCatalog::new();
        let err = session.check_treatment(&app, &catalog).await.unwrap_err();
        assert_eq!(err.downcast_ref::<FlowError>(), Some(&FlowError::DiagnosisMissing));
    }

    /// 完成接诊必须有一次成功的方案检查
    #[tokio::test]
    async fn test_complete_requires_successful_check() {
        let app = offline_app("complete_check");
        let mut session = test_session();
        advance_to_treatment(&mut session);
        session
            .set_diagnosis(Diagnosis {
                main: "Сальмонеллёз".to_string(),
                ..Default::default()
            })
            .unwrap();

        let err = session.complete_case(&app).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<FlowError>(),
            Some(&FlowError::TreatmentNotChecked)
        );
        // 状态没有被破坏，仍在治疗阶段
        assert!(matches!(session.phase, PhaseState::Treatment(_)));
    }

    #[test]
    fn test_plan_edit_invalidates_check() {
        let mut session = test_session();
        advance_to_treatment(&mut session);

        if let PhaseState::Treatment(state) = &mut session.phase {
            state.check = Some(TreatmentCheck::default());
        }
        session.toggle_diet("diet4").unwrap();
        assert!(session.treatment().unwrap().check.is_none());
    }

    #[test]
    fn test_back_to_diagnostics_restores_state() {
        let mut session = test_session();
        advance_to_treatment(&mut session);

        session.back_to_diagnostics().unwrap();
        match &session.phase {
            PhaseState::Diagnostics(state) => {
                assert_eq!(state.selected_tests, ["cbc"]);
                assert!(state.report.is_some());
            }
            _ => panic!("应当回到诊断阶段"),
        }
    }

    #[test]
    fn test_retry_discards_transcript() {
        let app = offline_app("retry");
        let mut session = CaseSession::new(
            test_ctx(),
            CaseInfo::default(),
            vec![
                ChatMessage::doctor("Что вас беспокоит?"),
                ChatMessage::patient("Болит живот."),
            ],
        );
        session.phase = PhaseState::Results(CaseReport::default());

        session.retry(&app).unwrap();
        assert!(session.transcript().is_empty());
        assert_eq!(session.progress().questions_count, 0);
        assert!(session.language().is_none());
        assert!(matches!(session.phase, PhaseState::Interview { .. }));
    }

    /// 发送失败（这里是连不上服务器）时对话记录保持原样
    #[tokio::test]
    async fn test_failed_ask_leaves_transcript_unchanged() {
        let app = offline_app("ask_fail");
        let mut session = test_session();

        let err = session.ask(&app, "Что вас беспокоит?").await.unwrap_err();
        assert!(err.downcast_ref::<FlowError>().is_none());
        assert!(session.transcript().is_empty());
        assert_eq!(session.progress().questions_count, 0);
    }

    #[test]
    fn test_balance_rejection_detection() {
        let rejected: anyhow::Error = AppError::Balance(BalanceError::InsufficientBalance {
            balance: 0,
            message: "Недостаточно медкоинов".to_string(),
        })
        .into();
        assert!(is_balance_rejection(&rejected));

        let connectivity: anyhow::Error = AppError::Other("connection refused".to_string()).into();
        assert!(!is_balance_rejection(&connectivity));
    }

    #[test]
    fn test_ask_is_interview_only() {
        let mut session = test_session();
        advance_to_diagnostics(&mut session);
        let err = session.require_interview().unwrap_err();
        assert!(matches!(err, FlowError::PhaseMismatch { .. }));
    }

    #[test]
    fn test_interview_summary_takes_last_five_patient_replies() {
        let mut transcript = Vec::new();
        for i in 1..=7 {
            transcript.push(ChatMessage::doctor(format!("вопрос {}", i)));
            transcript.push(ChatMessage::patient(format!("ответ {}", i)));
        }
        let session = CaseSession::new(test_ctx(), CaseInfo::default(), transcript);

        let summary = session.interview_summary();
        assert!(!summary.contains("ответ 2"));
        assert!(summary.starts_with("ответ 3"));
        assert!(summary.ends_with("ответ 7"));
    }

    #[test]
    fn test_language_restored_from_transcript() {
        let session = CaseSession::new(
            test_ctx(),
            CaseInfo::default(),
            vec![ChatMessage::doctor("Сізді не мазалайды?")],
        );
        assert_eq!(session.language(), Some("kk"));
    }
}
