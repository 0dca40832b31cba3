//! 订阅与支付 API 客户端

use anyhow::{Context, Result};
use serde_json::{json, Value as JsonValue};
use tracing::info;

use crate::infrastructure::HttpExecutor;
use crate::models::user::{CaseAccess, PaymentOrder, SubscriptionPlan};

/// 订阅与支付 API 客户端
pub struct SubscriptionClient;

impl SubscriptionClient {
    pub fn new() -> Self {
        Self
    }

    /// 获取订阅套餐列表
    pub async fn plans(&self, http: &HttpExecutor) -> Result<Vec<SubscriptionPlan>> {
        let payload = http
            .get_json("/api/subscription/plans")
            .await
            .context("加载套餐列表失败")?;

        let plans = match &payload {
            JsonValue::Array(_) => payload,
            JsonValue::Object(obj) => obj.get("plans").cloned().unwrap_or(JsonValue::Array(vec![])),
            _ => JsonValue::Array(vec![]),
        };
        Ok(serde_json::from_value(plans)?)
    }

    /// 检查对某个病例的访问权限
    ///
    /// 拒绝原因包装进返回值，调用方不需要区分错误类型。
    pub async fn check_access(&self, http: &HttpExecutor, case_id: &str) -> CaseAccess {
        if !http.has_token() {
            return CaseAccess {
                has_access: false,
                reason: Some("需要先登录".to_string()),
            };
        }

        let body = json!({ "caseId": case_id });
        match http
            .post_as::<CaseAccess>("/api/subscription/check-access", &body)
            .await
        {
            Ok(access) => access,
            Err(e) => CaseAccess {
                has_access: false,
                reason: Some(e.to_string()),
            },
        }
    }

    /// 消耗一个病例令牌
    pub async fn use_token(&self, http: &HttpExecutor) -> Result<JsonValue> {
        let receipt = http
            .post_json("/api/subscription/use-token", &json!({}))
            .await
            .context("使用病例令牌失败")?;
        Ok(receipt)
    }

    /// 激活订阅
    pub async fn activate(&self, http: &HttpExecutor, subscription_type: &str) -> Result<()> {
        let body = json!({ "subscriptionType": subscription_type });
        http.post_json("/api/subscription/activate", &body)
            .await
            .context("激活订阅失败")?;

        info!("✓ 订阅已激活: {}", subscription_type);
        Ok(())
    }

    /// 创建支付订单
    ///
    /// # 参数
    /// - `plan`: 套餐信息
    /// - `user_id` / `email`: 下单用户
    /// - `comment`: 支付备注（用于人工核对）
    pub async fn create_payment(
        &self,
        http: &HttpExecutor,
        plan: &SubscriptionPlan,
        user_id: &str,
        email: &str,
        comment: &str,
    ) -> Result<PaymentOrder> {
        let body = json!({
            "planId": plan.id,
            "userId": user_id,
            "email": email,
            "amount": plan.price,
            "userComment": comment,
            "planName": plan.name,
        });

        let payload = http
            .post_json("/api/payments/create", &body)
            .await
            .context("创建支付订单失败")?;

        let order = payload.get("payment").cloned().unwrap_or(payload);
        let order: PaymentOrder = serde_json::from_value(order)?;
        info!("✓ 支付订单已创建: {:?}", order.id);
        Ok(order)
    }
}

impl Default for SubscriptionClient {
    fn default() -> Self {
        Self::new()
    }
}
