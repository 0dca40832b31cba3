//! 对话 API 客户端
//!
//! AI 患者对话、结案分析和 AI 导师问答。

use anyhow::{Context, Result};
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::error::ApiError;
use crate::infrastructure::HttpExecutor;
use crate::models::case::{history_to_wire, ChatMessage, InterviewProgress};

/// 对话 API 客户端
pub struct ChatClient;

impl ChatClient {
    pub fn new() -> Self {
        Self
    }

    /// 向 AI 患者提问，返回患者的回答
    ///
    /// # 参数
    /// - `case_id`: 病例 ID
    /// - `question`: 医生的提问
    /// - `history`: 之前的完整对话记录
    /// - `language`: 会话语言（kk / ru / en），第一轮检测后固定
    pub async fn send_turn(
        &self,
        http: &HttpExecutor,
        case_id: &str,
        question: &str,
        history: &[ChatMessage],
        language: Option<&str>,
    ) -> Result<String> {
        debug!("发送问诊消息，历史 {} 条", history.len());

        let body = json!({
            "caseId": case_id,
            "question": question,
            "conversationHistory": history_to_wire(history),
            "language": language,
        });

        let payload = http.post_json("/api/chat", &body).await.context("发送消息失败")?;

        let reply = payload
            .get("reply")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or(ApiError::EmptyResponse {
                endpoint: "/api/chat".to_string(),
            })?;

        Ok(reply)
    }

    /// 请求结案 AI 分析（结构不稳定，原样透传给展示层）
    pub async fn analyze_case(
        &self,
        http: &HttpExecutor,
        case_id: &str,
        history: &[ChatMessage],
        user_diagnosis: &str,
        progress: &InterviewProgress,
        selected_methods: &[String],
        treatment_data: &JsonValue,
    ) -> Result<JsonValue> {
        let body = json!({
            "caseId": case_id,
            "conversationHistory": history_to_wire(history),
            "userDiagnosis": user_diagnosis,
            "interviewProgress": progress.to_wire(),
            "selectedMethods": selected_methods,
            "treatmentData": treatment_data,
        });

        let analysis = http
            .post_json("/api/analysis", &body)
            .await
            .context("获取 AI 分析失败")?;
        Ok(analysis)
    }

    /// AI 导师问答
    ///
    /// 返回 (回答, 参考来源列表)。
    pub async fn mentor_chat(
        &self,
        http: &HttpExecutor,
        mentor_id: &str,
        question: &str,
        user_id: Option<&str>,
    ) -> Result<(String, Vec<String>)> {
        let body = json!({
            "question": question,
            "mentorId": mentor_id,
            "userId": user_id,
        });

        let payload = http
            .post_json("/api/ai-mentor/chat", &body)
            .await
            .context("获取导师回答失败")?;

        let answer = payload
            .get("answer")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or(ApiError::EmptyResponse {
                endpoint: "/api/ai-mentor/chat".to_string(),
            })?;

        let sources = payload
            .get("sources")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        Ok((answer, sources))
    }
}

impl Default for ChatClient {
    fn default() -> Self {
        Self::new()
    }
}
