//! 治疗 API 客户端
//!
//! 治疗目录和治疗方案检查。

use anyhow::{bail, Context, Result};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info};

use crate::infrastructure::HttpExecutor;
use crate::models::treatment::{TreatmentCatalog, TreatmentCheck};

/// 治疗 API 客户端
pub struct TreatmentClient;

impl TreatmentClient {
    pub fn new() -> Self {
        Self
    }

    /// 获取治疗目录
    pub async fn catalog(&self, http: &HttpExecutor) -> Result<TreatmentCatalog> {
        let payload = http
            .get_json("/api/treatment-simulation/catalog")
            .await
            .context("加载治疗目录失败")?;

        if !payload.get("success").and_then(|v| v.as_bool()).unwrap_or(false) {
            bail!("治疗目录接口返回失败");
        }

        let catalog: TreatmentCatalog =
            serde_json::from_value(payload.get("catalog").cloned().unwrap_or(json!({})))?;
        debug!("治疗目录加载完成，{} 个类别", catalog.len());
        Ok(catalog)
    }

    /// 检查治疗方案是否符合病例的参考答案
    ///
    /// # 参数
    /// - `case_data`: 病例关键信息（id、参考诊断、年龄、性别、症状）
    /// - `treatment_data`: 治疗方案（饮食/非药物措施已换成名称）
    pub async fn check(
        &self,
        http: &HttpExecutor,
        case_data: &JsonValue,
        treatment_data: &JsonValue,
    ) -> Result<TreatmentCheck> {
        info!("💊 检查治疗方案...");

        let body = json!({
            "caseData": case_data,
            "treatmentData": treatment_data,
        });

        let check: TreatmentCheck = http
            .post_as("/api/treatment-simulation/check", &body)
            .await
            .context("治疗方案检查失败")?;

        if !check.success {
            bail!(
                "治疗方案检查被拒绝: {}",
                check.error.as_deref().unwrap_or("未知原因")
            );
        }

        if let Some(summary) = &check.summary {
            info!(
                "✓ 检查完成: 错误 {} / 警告 {} / 正确 {}",
                summary.errors_count, summary.warnings_count, summary.correct_count
            );
        }
        Ok(check)
    }
}

impl Default for TreatmentClient {
    fn default() -> Self {
        Self::new()
    }
}
