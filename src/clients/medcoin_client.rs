//! 医币 API 客户端
//!
//! 余额查询、扣费、购买和流水。扣费的拒绝按响应的结构化字段分类：
//! 带 dailyLimit 的是日限额用尽，否则是余额不足；服务器消息原样保留。

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{AppError, BalanceError};
use crate::infrastructure::http_executor::extract_error_message;
use crate::infrastructure::HttpExecutor;
use crate::models::user::{MedcoinBalance, SpendReceipt, TransactionsPage};

/// 医币 API 客户端
pub struct MedcoinClient;

impl MedcoinClient {
    pub fn new() -> Self {
        Self
    }

    /// 查询余额
    ///
    /// 未登录时返回零余额，不报错。
    pub async fn balance(&self, http: &HttpExecutor) -> Result<MedcoinBalance> {
        if !http.has_token() {
            return Ok(MedcoinBalance::default());
        }

        match http.get_as::<MedcoinBalance>("/api/medcoins/balance").await {
            Ok(balance) => Ok(balance),
            Err(e) => {
                warn!("查询医币余额失败: {}", e);
                Ok(MedcoinBalance::default())
            }
        }
    }

    /// 扣除医币
    ///
    /// # 参数
    /// - `amount`: 扣除数量
    /// - `case_id`: 关联病例
    /// - `description`: 流水说明
    ///
    /// # 返回
    /// 成功返回扣费后的余额；余额不足 / 日限额用尽返回 `BalanceError`。
    pub async fn spend(
        &self,
        http: &HttpExecutor,
        amount: u32,
        case_id: &str,
        description: &str,
    ) -> Result<SpendReceipt> {
        let body = json!({
            "amount": amount,
            "caseId": case_id,
            "description": description,
        });

        let (status, payload) = http
            .post_json_with_status("/api/medcoins/spend", &body)
            .await
            .context("扣除医币失败")?;

        if status < 400 {
            let receipt: SpendReceipt = serde_json::from_value(payload)?;
            debug!("✓ 扣费成功，余额: {}", receipt.balance);
            return Ok(receipt);
        }

        Err(AppError::Balance(classify_rejection(&payload)).into())
    }

    /// 购买医币套餐
    pub async fn purchase(&self, http: &HttpExecutor, package_id: &str) -> Result<MedcoinBalance> {
        let body = json!({ "packageId": package_id });
        let balance: MedcoinBalance = http
            .post_as("/api/medcoins/purchase", &body)
            .await
            .context("购买医币失败")?;
        Ok(balance)
    }

    /// 查询医币流水
    pub async fn transactions(
        &self,
        http: &HttpExecutor,
        limit: usize,
        offset: usize,
    ) -> Result<TransactionsPage> {
        if !http.has_token() {
            return Ok(TransactionsPage::default());
        }

        let endpoint = format!("/api/medcoins/transactions?limit={}&offset={}", limit, offset);
        match http.get_as::<TransactionsPage>(&endpoint).await {
            Ok(page) => Ok(page),
            Err(e) => {
                warn!("查询医币流水失败: {}", e);
                Ok(TransactionsPage::default())
            }
        }
    }
}

impl Default for MedcoinClient {
    fn default() -> Self {
        Self::new()
    }
}

/// 把扣费拒绝响应分类成余额错误
///
/// 带 dailyLimit 字段的是日限额用尽，否则按余额不足处理；
/// 服务器的消息字段原样保留。
fn classify_rejection(payload: &serde_json::Value) -> BalanceError {
    let message = extract_error_message(payload).unwrap_or_else(|| "扣费被拒绝".to_string());

    if let Some(daily_limit) = payload.get("dailyLimit").and_then(|v| v.as_i64()) {
        BalanceError::DailyLimitExceeded {
            daily_limit,
            today_usage: payload.get("todayUsage").and_then(|v| v.as_i64()).unwrap_or(0),
            message,
        }
    } else {
        BalanceError::InsufficientBalance {
            balance: payload.get("balance").and_then(|v| v.as_i64()).unwrap_or(0),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_insufficient_balance() {
        let payload = json!({"error": "Недостаточно медкоинов", "balance": 2});
        match classify_rejection(&payload) {
            BalanceError::InsufficientBalance { balance, message } => {
                assert_eq!(balance, 2);
                // 服务器消息原样保留
                assert_eq!(message, "Недостаточно медкоинов");
            }
            other => panic!("分类错误: {:?}", other),
        }
    }

    #[test]
    fn test_classify_daily_limit() {
        let payload = json!({
            "error": "Дневной лимит исчерпан",
            "dailyLimit": 30,
            "todayUsage": 30
        });
        match classify_rejection(&payload) {
            BalanceError::DailyLimitExceeded {
                daily_limit,
                today_usage,
                message,
            } => {
                assert_eq!(daily_limit, 30);
                assert_eq!(today_usage, 30);
                assert_eq!(message, "Дневной лимит исчерпан");
            }
            other => panic!("分类错误: {:?}", other),
        }
    }
}
