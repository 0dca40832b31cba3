//! 分析统计 API 客户端

use anyhow::{Context, Result};
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::infrastructure::HttpExecutor;

/// 分析统计 API 客户端
pub struct AnalyticsClient;

impl AnalyticsClient {
    pub fn new() -> Self {
        Self
    }

    /// 上报页面访问
    ///
    /// 纯埋点，失败只记日志，绝不影响主流程。
    pub async fn track_visit(&self, http: &HttpExecutor, page: &str, referrer: Option<&str>) {
        let body = json!({
            "page": page,
            "referrer": referrer,
        });

        if let Err(e) = http.post_json("/api/analytics/visit", &body).await {
            debug!("访问上报失败（忽略）: {}", e);
        }
    }

    /// 获取聚合统计（管理端视图，结构原样透传）
    ///
    /// # 参数
    /// - `start_date` / `end_date`: 可选的日期范围（YYYY-MM-DD）
    pub async fn stats(
        &self,
        http: &HttpExecutor,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<JsonValue> {
        let mut endpoint = "/api/analytics/stats".to_string();
        let mut params = Vec::new();
        if let Some(start) = start_date {
            params.push(format!("startDate={}", start));
        }
        if let Some(end) = end_date {
            params.push(format!("endDate={}", end));
        }
        if !params.is_empty() {
            endpoint = format!("{}?{}", endpoint, params.join("&"));
        }

        let payload = http.get_json(&endpoint).await.context("加载统计数据失败")?;
        Ok(payload.get("statistics").cloned().unwrap_or(payload))
    }
}

impl Default for AnalyticsClient {
    fn default() -> Self {
        Self::new()
    }
}
