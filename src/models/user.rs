//! 用户、医币与订阅数据结构

use serde::Deserialize;
use serde_json::Value as JsonValue;

/// 用户资料（缓存到本地）
#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub struct User {
    #[serde(default, deserialize_with = "crate::models::flexible_opt_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub subscription: Option<JsonValue>,
}

/// 登录/注册响应
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub token: String,
    #[serde(default)]
    pub user: User,
}

/// 医币余额
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedcoinBalance {
    #[serde(default)]
    pub balance: i64,
    #[serde(rename = "todayUsage", default)]
    pub today_usage: i64,
    #[serde(rename = "dailyLimit", default)]
    pub daily_limit: Option<i64>,
}

/// 扣费回执
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpendReceipt {
    #[serde(default)]
    pub balance: i64,
}

/// 医币流水
#[derive(Debug, Clone, Deserialize)]
pub struct MedcoinTransaction {
    #[serde(default, deserialize_with = "crate::models::flexible_opt_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionsPage {
    #[serde(default)]
    pub transactions: Vec<MedcoinTransaction>,
    #[serde(default)]
    pub total: i64,
}

/// 订阅套餐
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionPlan {
    #[serde(deserialize_with = "crate::models::flexible_string")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

/// 病例访问权限检查结果
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseAccess {
    #[serde(rename = "hasAccess", default)]
    pub has_access: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// 创建支付订单的响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentOrder {
    #[serde(default, deserialize_with = "crate::models::flexible_opt_string")]
    pub id: Option<String>,
    #[serde(rename = "paymentUrl", default)]
    pub payment_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_without_limit() {
        let balance: MedcoinBalance =
            serde_json::from_str(r#"{"balance": 42, "todayUsage": 3}"#).unwrap();
        assert_eq!(balance.balance, 42);
        assert_eq!(balance.today_usage, 3);
        assert!(balance.daily_limit.is_none());
    }

    #[test]
    fn test_auth_session_with_sparse_user() {
        let session: AuthSession =
            serde_json::from_str(r#"{"token": "abc.def.ghi", "user": {"id": 15}}"#).unwrap();
        assert_eq!(session.token, "abc.def.ghi");
        assert_eq!(session.user.id.as_deref(), Some("15"));
    }
}
