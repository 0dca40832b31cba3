//! HTTP 执行器 - 基础设施层
//!
//! 持有唯一的 reqwest 客户端资源，只暴露"调用后端 API"的能力

use std::sync::RwLock;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::{debug, error};

use crate::error::ApiError;

/// HTTP 执行器
///
/// 职责：
/// - 持有唯一的 reqwest::Client 和 Bearer 令牌
/// - 暴露 get_json() / post_json() 能力
/// - 把响应统一归类为"连不上服务器"或"服务器拒绝"
/// - 不认识 Case / Question
/// - 不处理业务流程
pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpExecutor {
    /// 创建新的 HTTP 执行器
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 登录后注入令牌，之后所有请求自动带 Authorization 头
    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write().expect("token lock poisoned") = Some(token.into());
    }

    /// 登出 / 令牌失效时清除
    pub fn clear_token(&self) {
        *self.token.write().expect("token lock poisoned") = None;
    }

    pub fn has_token(&self) -> bool {
        self.token.read().expect("token lock poisoned").is_some()
    }

    /// GET 请求并解析 JSON
    pub async fn get_json(&self, endpoint: &str) -> Result<JsonValue, ApiError> {
        self.request_json(Method::GET, endpoint, None).await
    }

    /// POST 请求并解析 JSON
    pub async fn post_json(
        &self,
        endpoint: &str,
        body: &JsonValue,
    ) -> Result<JsonValue, ApiError> {
        self.request_json(Method::POST, endpoint, Some(body)).await
    }

    /// PUT 请求并解析 JSON
    pub async fn put_json(&self, endpoint: &str, body: &JsonValue) -> Result<JsonValue, ApiError> {
        self.request_json(Method::PUT, endpoint, Some(body)).await
    }

    /// GET 并直接反序列化为指定类型
    pub async fn get_as<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let value = self.get_json(endpoint).await?;
        serde_json::from_value(value).map_err(|e| ApiError::JsonParseFailed {
            source: Box::new(e),
        })
    }

    /// POST 并直接反序列化为指定类型
    pub async fn post_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &JsonValue,
    ) -> Result<T, ApiError> {
        let value = self.post_json(endpoint, body).await?;
        serde_json::from_value(value).map_err(|e| ApiError::JsonParseFailed {
            source: Box::new(e),
        })
    }

    /// POST 请求，域错误不在这里分类，连同状态码一起交给调用方
    ///
    /// 给需要检查错误响应结构化字段的调用方用（如医币扣费）。
    /// 连接类错误仍然在这里拦截。
    pub async fn post_json_with_status(
        &self,
        endpoint: &str,
        body: &JsonValue,
    ) -> Result<(u16, JsonValue), ApiError> {
        match self.request_json(Method::POST, endpoint, Some(body)).await {
            Ok(payload) => Ok((200, payload)),
            Err(ApiError::BadResponse {
                status, payload, ..
            }) => Ok((status, payload)),
            Err(other) => Err(other),
        }
    }

    // ========== 内部实现 ==========

    async fn request_json(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&JsonValue>,
    ) -> Result<JsonValue, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("{} {}", method, url);

        let mut request = self.client.request(method, &url);
        if let Some(token) = self.token.read().expect("token lock poisoned").as_deref() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            error!("请求 {} 失败: {}", endpoint, e);
            ApiError::RequestFailed {
                endpoint: endpoint.to_string(),
                source: Box::new(e),
            }
        })?;

        let status = response.status();

        // 先检查 Content-Type：服务没起来时常拿到 HTML 页面而不是 JSON
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let is_json = content_type
            .as_deref()
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);

        if !is_json {
            let text = response.text().await.unwrap_or_default();
            error!(
                "服务器返回非 JSON ({}): {}",
                endpoint,
                truncate(&text, 200)
            );
            return Err(ApiError::NonJsonResponse {
                endpoint: endpoint.to_string(),
                content_type,
                preview: truncate(&text, 200),
            });
        }

        let payload: JsonValue = response.json().await.map_err(|e| ApiError::JsonParseFailed {
            source: Box::new(e),
        })?;

        if !status.is_success() {
            // 域错误：服务器给出的消息原样保留
            let message = extract_error_message(&payload);
            debug!(
                "服务器拒绝 ({}): status={}, message={:?}",
                endpoint,
                status.as_u16(),
                message
            );
            return Err(ApiError::BadResponse {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message,
                payload,
            });
        }

        Ok(payload)
    }
}

/// 从错误响应中提取消息字段（error 优先，其次 message）
pub fn extract_error_message(payload: &JsonValue) -> Option<String> {
    payload
        .get("error")
        .or_else(|| payload.get("message"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// 状态码是否表示需要重新登录
pub fn is_auth_failure(status: u16) -> bool {
    status == StatusCode::UNAUTHORIZED.as_u16() || status == StatusCode::FORBIDDEN.as_u16()
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_error_message() {
        assert_eq!(
            extract_error_message(&json!({"error": "Недостаточно медкоинов", "balance": 0})),
            Some("Недостаточно медкоинов".to_string())
        );
        assert_eq!(
            extract_error_message(&json!({"message": "bad request"})),
            Some("bad request".to_string())
        );
        assert_eq!(extract_error_message(&json!({"code": 500})), None);
    }

    #[test]
    fn test_token_lifecycle() {
        let executor = HttpExecutor::new("http://localhost:3001/");
        assert!(!executor.has_token());
        executor.set_token("jwt-token");
        assert!(executor.has_token());
        executor.clear_token();
        assert!(!executor.has_token());
        // 末尾斜杠被归一化
        assert_eq!(executor.base_url(), "http://localhost:3001");
    }

    /// 连不上服务器时应归类为连接错误而不是域错误
    #[tokio::test]
    async fn test_unreachable_server_is_connectivity_error() {
        let executor = HttpExecutor::new("http://127.0.0.1:1");
        let err = executor.get_json("/api/cases").await.unwrap_err();
        assert!(err.is_connectivity());
    }
}
