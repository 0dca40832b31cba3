//! 认证 API 客户端
//!
//! 封装注册 / 登录 / 个人资料相关的调用。令牌的保存由调用方负责。

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::infrastructure::http_executor::is_auth_failure;
use crate::infrastructure::HttpExecutor;
use crate::models::user::{AuthSession, User};

/// 认证 API 客户端
pub struct AuthClient;

impl AuthClient {
    pub fn new() -> Self {
        Self
    }

    /// 注册新账号
    pub async fn register(
        &self,
        http: &HttpExecutor,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthSession> {
        let body = json!({
            "email": email,
            "password": password,
            "name": name,
        });

        let session: AuthSession = http
            .post_as("/api/auth/register", &body)
            .await
            .context("注册失败")?;

        info!("✓ 注册成功: {}", email);
        Ok(session)
    }

    /// 登录
    pub async fn login(
        &self,
        http: &HttpExecutor,
        email: &str,
        password: &str,
    ) -> Result<AuthSession> {
        info!("🔐 尝试登录: {}", email);

        let body = json!({
            "email": email,
            "password": password,
        });

        let session: AuthSession = http
            .post_as("/api/auth/login", &body)
            .await
            .context("登录失败")?;

        info!(
            "✓ 登录成功: {}",
            session.user.email.as_deref().unwrap_or(email)
        );
        Ok(session)
    }

    /// 获取当前用户
    ///
    /// 令牌缺失或已失效时返回 None（失效时顺带清掉令牌），
    /// 网络类错误也只降级为 None，不让启动流程失败。
    pub async fn current_user(&self, http: &HttpExecutor) -> Result<Option<User>> {
        if !http.has_token() {
            return Ok(None);
        }

        match http.get_json("/api/auth/me").await {
            Ok(payload) => {
                let user = payload
                    .get("user")
                    .cloned()
                    .unwrap_or(payload);
                let user: User = serde_json::from_value(user)?;
                Ok(Some(user))
            }
            Err(ApiError::BadResponse { status, .. }) if is_auth_failure(status) => {
                warn!("令牌已失效，需要重新登录");
                http.clear_token();
                Ok(None)
            }
            Err(e) => {
                warn!("获取当前用户失败: {}", e);
                Ok(None)
            }
        }
    }

    /// 更新个人资料，返回更新后的用户
    pub async fn update_profile(
        &self,
        http: &HttpExecutor,
        updates: &serde_json::Value,
    ) -> Result<User> {
        let payload = http
            .put_json("/api/auth/profile", updates)
            .await
            .context("更新个人资料失败")?;

        let user = payload.get("user").cloned().unwrap_or(payload);
        Ok(serde_json::from_value(user)?)
    }

    /// 修改密码
    pub async fn change_password(
        &self,
        http: &HttpExecutor,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let body = json!({
            "currentPassword": current_password,
            "newPassword": new_password,
        });

        http.post_json("/api/auth/change-password", &body)
            .await
            .context("修改密码失败")?;

        info!("✓ 密码修改成功");
        Ok(())
    }
}

impl Default for AuthClient {
    fn default() -> Self {
        Self::new()
    }
}
