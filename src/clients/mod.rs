//! 后端 API 客户端层
//!
//! 每个客户端只封装一个 API 领域的调用，不持有 HTTP 资源：
//! 执行器（HttpExecutor）由上层持有，按调用传入。

pub mod analytics_client;
pub mod auth_client;
pub mod case_client;
pub mod chat_client;
pub mod diagnostic_client;
pub mod medcoin_client;
pub mod subscription_client;
pub mod treatment_client;

pub use analytics_client::AnalyticsClient;
pub use auth_client::AuthClient;
pub use case_client::CaseClient;
pub use chat_client::ChatClient;
pub use diagnostic_client::DiagnosticClient;
pub use medcoin_client::MedcoinClient;
pub use subscription_client::SubscriptionClient;
pub use treatment_client::TreatmentClient;
