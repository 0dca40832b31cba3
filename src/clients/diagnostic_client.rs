//! 诊断 API 客户端
//!
//! 诊断方法目录和诊断模拟执行。

use anyhow::{bail, Context, Result};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info};

use crate::infrastructure::HttpExecutor;
use crate::models::diagnostics::{DiagnosticCatalog, SimulationReport};

/// 诊断 API 客户端
pub struct DiagnosticClient;

impl DiagnosticClient {
    pub fn new() -> Self {
        Self
    }

    /// 获取诊断方法树（旧接口，结构原样透传）
    pub async fn methods(&self, http: &HttpExecutor) -> Result<JsonValue> {
        let methods = http
            .get_json("/api/diagnostics/methods")
            .await
            .context("加载诊断方法失败")?;
        Ok(methods)
    }

    /// 获取诊断模拟目录（类别 → 子类别 → 检查项目）
    pub async fn catalog(&self, http: &HttpExecutor) -> Result<DiagnosticCatalog> {
        let payload = http
            .get_json("/api/diagnostic-simulation/catalog")
            .await
            .context("加载检查目录失败")?;

        if !payload.get("success").and_then(|v| v.as_bool()).unwrap_or(false) {
            bail!("检查目录接口返回失败");
        }

        let catalog: DiagnosticCatalog =
            serde_json::from_value(payload.get("catalog").cloned().unwrap_or(json!({})))?;
        debug!("检查目录加载完成，{} 个类别", catalog.len());
        Ok(catalog)
    }

    /// 执行诊断模拟
    ///
    /// # 参数
    /// - `case_data`: 病例摘要（年龄、性别、主诉、问诊摘要等）
    /// - `selected_tests`: 已选检查项目 id
    /// - `limit`: 检查数量限额（后端也会校验）
    ///
    /// # 返回
    /// 返回完整报告：各项检查的原始结果值 + 结构化分析
    pub async fn run_simulation(
        &self,
        http: &HttpExecutor,
        case_data: &JsonValue,
        selected_tests: &[String],
        limit: usize,
    ) -> Result<SimulationReport> {
        info!("🔬 执行诊断模拟，已选 {} 项检查...", selected_tests.len());

        let body = json!({
            "caseData": case_data,
            "selectedTests": selected_tests,
            "limit": limit,
        });

        let report: SimulationReport = http
            .post_as("/api/diagnostic-simulation/run", &body)
            .await
            .context("诊断模拟失败")?;

        if !report.success {
            bail!(
                "诊断模拟被拒绝: {}",
                report.error.as_deref().unwrap_or("未知原因")
            );
        }

        info!(
            "✓ 诊断模拟完成，返回 {} 项结果",
            report.results.len()
        );
        Ok(report)
    }
}

impl Default for DiagnosticClient {
    fn default() -> Self {
        Self::new()
    }
}
