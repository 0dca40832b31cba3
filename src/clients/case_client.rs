//! 病例 API 客户端
//!
//! 病例目录、病例详情、草稿保存和完成接诊。

use anyhow::{Context, Result};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info};

use crate::infrastructure::HttpExecutor;
use crate::models::case::{CaseInfo, CaseSummary, InterviewProgress};
use crate::models::treatment::CaseEvaluation;

/// 病例 API 客户端
pub struct CaseClient;

impl CaseClient {
    pub fn new() -> Self {
        Self
    }

    /// 获取学习模块列表（结构由后端定义，原样透传）
    pub async fn list_modules(&self, http: &HttpExecutor) -> Result<JsonValue> {
        let modules = http.get_json("/api/modules").await.context("加载模块列表失败")?;
        Ok(modules)
    }

    /// 获取病例列表
    ///
    /// 后端有时直接返回数组，有时包在 cases 字段里。
    pub async fn list_cases(&self, http: &HttpExecutor) -> Result<Vec<CaseSummary>> {
        let payload = http.get_json("/api/cases").await.context("加载病例列表失败")?;

        let cases = match &payload {
            JsonValue::Array(_) => payload,
            JsonValue::Object(obj) => obj.get("cases").cloned().unwrap_or(JsonValue::Array(vec![])),
            _ => JsonValue::Array(vec![]),
        };

        let cases: Vec<CaseSummary> = serde_json::from_value(cases)?;
        debug!("加载到 {} 个病例", cases.len());
        Ok(cases)
    }

    /// 获取病例详情
    pub async fn get_case(&self, http: &HttpExecutor, case_id: &str) -> Result<CaseInfo> {
        let endpoint = format!("/api/cases/{}", case_id);
        let case: CaseInfo = http.get_as(&endpoint).await.context("加载病例失败")?;
        Ok(case)
    }

    /// 保存草稿（与阶段转换无关，可随时调用）
    ///
    /// # 参数
    /// - `phase`: 当前阶段编号（1/2/3）
    /// - `treatment_data`: 治疗方案草稿
    /// - `selected_methods`: 已选检查项目
    pub async fn save_draft(
        &self,
        http: &HttpExecutor,
        case_id: &str,
        phase: u8,
        treatment_data: &JsonValue,
        selected_methods: &[String],
    ) -> Result<()> {
        let endpoint = format!("/api/cases/{}/draft", case_id);
        let body = json!({
            "phase": phase,
            "treatmentData": treatment_data,
            "selectedMethods": selected_methods,
        });

        http.post_json(&endpoint, &body).await.context("保存草稿失败")?;

        info!("✓ 草稿已保存 (病例 {})", case_id);
        Ok(())
    }

    /// 完成接诊，获取基础评估
    pub async fn complete_case(
        &self,
        http: &HttpExecutor,
        case_id: &str,
        progress: &InterviewProgress,
        selected_methods: &[String],
        treatment_data: &JsonValue,
    ) -> Result<CaseEvaluation> {
        let endpoint = format!("/api/cases/{}/complete", case_id);
        let body = json!({
            "interviewProgress": progress.to_wire(),
            "selectedMethods": selected_methods,
            "treatmentData": treatment_data,
        });

        info!("📋 提交病例评估 (病例 {})", case_id);

        let evaluation: CaseEvaluation = http
            .post_as(&endpoint, &body)
            .await
            .context("完成病例失败")?;

        info!(
            "✓ 基础评估完成: {}/{}",
            evaluation.score, evaluation.max_score
        );
        Ok(evaluation)
    }
}

impl Default for CaseClient {
    fn default() -> Self {
        Self::new()
    }
}
