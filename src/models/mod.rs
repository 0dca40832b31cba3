pub mod case;
pub mod diagnostics;
pub mod quiz;
pub mod treatment;
pub mod user;

pub use case::{CaseInfo, CaseSummary, ChatMessage, ChatRole, CollectedInfo, InterviewProgress};
pub use diagnostics::{
    DiagnosticAnalysis, DiagnosticCatalog, DiagnosticTest, SimulationReport, TestOutcome,
};
pub use quiz::{Question, QuestionOutcome, QuizMode, QuizOption, QuizReport, QuizSettings};
pub use treatment::{
    CaseEvaluation, CaseReport, Diagnosis, Medication, TreatmentCatalog, TreatmentCheck,
    TreatmentItem, TreatmentPlan,
};
pub use user::{AuthSession, CaseAccess, MedcoinBalance, SpendReceipt, User};

use serde::de::{Deserializer, Visitor};
use serde::Deserialize;
use std::fmt;

/// 把"字符串或数字"的字段统一反序列化成 String
///
/// 后端的 id / 年龄等字段有时是数字有时是字符串，客户端一律按字符串消费。
pub(crate) fn flexible_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlexVisitor;

    impl<'de> Visitor<'de> for FlexVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(FlexVisitor)
}

/// `flexible_string` 的 Option 版本，null 和缺省都当作 None
pub(crate) fn flexible_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => Some(other.to_string()),
    })
}
