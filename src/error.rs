use std::fmt;

use serde_json::Value as JsonValue;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// API 调用错误（网络层 / 服务端响应）
    Api(ApiError),
    /// 医币余额相关错误
    Balance(BalanceError),
    /// 病例流程错误（客户端守卫）
    Flow(FlowError),
    /// 题库文件解析错误
    Parse(ParseError),
    /// 文件操作错误
    File(FileError),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Api(e) => write!(f, "API错误: {}", e),
            AppError::Balance(e) => write!(f, "医币错误: {}", e),
            AppError::Flow(e) => write!(f, "流程错误: {}", e),
            AppError::Parse(e) => write!(f, "解析错误: {}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Api(e) => Some(e),
            AppError::Balance(e) => Some(e),
            AppError::Flow(e) => Some(e),
            AppError::Parse(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// API 调用错误
///
/// 区分"连不上服务器"（网络失败、非 JSON 响应、JSON 解析失败）
/// 和"服务器明确拒绝"（非 2xx 且带有错误消息）两类。
#[derive(Debug)]
pub enum ApiError {
    /// 网络请求失败
    RequestFailed {
        endpoint: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 服务器返回了非 JSON 内容（通常是服务没起来或反向代理页面）
    NonJsonResponse {
        endpoint: String,
        content_type: Option<String>,
        preview: String,
    },
    /// 服务器返回错误响应（非 2xx），消息原样保留
    BadResponse {
        endpoint: String,
        status: u16,
        message: Option<String>,
        /// 完整响应体，扣费等接口要读其中的结构化字段
        payload: JsonValue,
    },
    /// API 返回空结果
    EmptyResponse {
        endpoint: String,
    },
    /// JSON 解析失败
    JsonParseFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApiError {
    /// 是否属于"连不上服务器"一类（而不是服务器明确拒绝）
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            ApiError::RequestFailed { .. }
                | ApiError::NonJsonResponse { .. }
                | ApiError::JsonParseFailed { .. }
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::RequestFailed { endpoint, source } => {
                write!(f, "API请求失败 ({}): {}", endpoint, source)
            }
            ApiError::NonJsonResponse {
                endpoint,
                content_type,
                preview,
            } => {
                write!(
                    f,
                    "服务器返回了非 JSON 响应 ({}): content-type={:?}, 内容预览: {}",
                    endpoint, content_type, preview
                )
            }
            ApiError::BadResponse {
                endpoint,
                status,
                message,
                ..
            } => {
                write!(
                    f,
                    "服务器返回错误响应 ({}): status={}, message={:?}",
                    endpoint, status, message
                )
            }
            ApiError::EmptyResponse { endpoint } => {
                write!(f, "API返回空结果: {}", endpoint)
            }
            ApiError::JsonParseFailed { source } => write!(f, "JSON解析失败: {}", source),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::RequestFailed { source, .. } | ApiError::JsonParseFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 医币余额相关错误
///
/// 由 spend 接口的结构化字段分类：带 dailyLimit 的是日限额，否则是余额不足。
/// 服务器消息原样保留，展示层直接透出。
#[derive(Debug)]
pub enum BalanceError {
    /// 余额不足
    InsufficientBalance {
        balance: i64,
        message: String,
    },
    /// 日限额已用完
    DailyLimitExceeded {
        daily_limit: i64,
        today_usage: i64,
        message: String,
    },
}

impl fmt::Display for BalanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceError::InsufficientBalance { balance, message } => {
                write!(f, "{} (当前余额: {})", message, balance)
            }
            BalanceError::DailyLimitExceeded {
                daily_limit,
                today_usage,
                message,
            } => {
                write!(
                    f,
                    "{} (日限额: {}, 今日已用: {})",
                    message, daily_limit, today_usage
                )
            }
        }
    }
}

impl std::error::Error for BalanceError {}

/// 病例流程错误
///
/// 全部是客户端守卫：在发出任何网络请求之前就拦截下来。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// 问诊轮数未达到最低要求
    InterviewTooShort {
        asked: usize,
        required: usize,
    },
    /// 没有选择任何检查项目
    EmptySelection,
    /// 选择的检查项目超出限额
    TestLimitExceeded {
        selected: usize,
        limit: usize,
    },
    /// 诊断模拟尚未执行
    DiagnosticsNotRun,
    /// 未填写主要诊断
    DiagnosisMissing,
    /// 治疗方案尚未通过检查
    TreatmentNotChecked,
    /// 当前阶段不支持该操作
    PhaseMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowError::InterviewTooShort { asked, required } => {
                write!(f, "问诊轮数不足: 已问 {} 轮，至少需要 {} 轮", asked, required)
            }
            FlowError::EmptySelection => write!(f, "请至少选择一项检查"),
            FlowError::TestLimitExceeded { selected, limit } => {
                write!(f, "已选择 {} 项检查，超出 {} 项的限额", selected, limit)
            }
            FlowError::DiagnosticsNotRun => {
                write!(f, "先执行诊断模拟并拿到结果，才能进入治疗阶段")
            }
            FlowError::DiagnosisMissing => write!(f, "请先填写主要诊断"),
            FlowError::TreatmentNotChecked => {
                write!(f, "治疗方案尚未检查，完成接诊前需要至少通过一次检查")
            }
            FlowError::PhaseMismatch { expected, actual } => {
                write!(f, "当前阶段为 {}，该操作只在 {} 阶段可用", actual, expected)
            }
        }
    }
}

impl std::error::Error for FlowError {}

/// 题库文件解析错误
///
/// 解析失败对本次导入是致命的：不返回部分结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// 不支持的文件格式
    UnsupportedFormat {
        ext: String,
    },
    /// 文件中没有找到任何题目
    NoQuestionsFound,
    /// 存在没有标记正确答案的题目
    MissingCorrectAnswers {
        question_ids: Vec<u32>,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnsupportedFormat { ext } => {
                write!(f, "不支持的文件格式: .{} (目前只支持 .txt)", ext)
            }
            ParseError::NoQuestionsFound => {
                write!(f, "没有在文件中找到题目，请检查文件格式")
            }
            ParseError::MissingCorrectAnswers { question_ids } => {
                let ids: Vec<String> = question_ids.iter().map(|id| id.to_string()).collect();
                write!(f, "以下题目没有标记正确答案: {}", ids.join(", "))
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 文件不存在
    NotFound {
        path: String,
    },
    /// 读取文件失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// TOML 解析失败
    TomlParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::NotFound { path } => write!(f, "文件不存在: {}", path),
            FileError::ReadFailed { path, source } => {
                write!(f, "读取文件失败 ({}): {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "写入文件失败 ({}): {}", path, source)
            }
            FileError::TomlParseFailed { path, source } => {
                write!(f, "TOML解析失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. }
            | FileError::WriteFailed { source, .. }
            | FileError::TomlParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 环境变量解析失败
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvVarParseFailed {
                var_name,
                value,
                expected_type,
            } => {
                write!(
                    f,
                    "环境变量 {} 解析失败: 值 '{}' 无法转换为 {}",
                    var_name, value, expected_type
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从常见错误类型转换 ==========
// 注意：anyhow 已为所有实现了 std::error::Error 的类型提供自动包装，
// 这里只补充跨层归类用的转换。

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        AppError::Api(err)
    }
}

impl From<BalanceError> for AppError {
    fn from(err: BalanceError) -> Self {
        AppError::Balance(err)
    }
}

impl From<FlowError> for AppError {
    fn from(err: FlowError) -> Self {
        AppError::Flow(err)
    }
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        AppError::Parse(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: String::new(), // reqwest 错误不总是带 URL 信息
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 面向用户的一行提示
    ///
    /// 连接类错误统一显示"无法连接服务器"，服务器拒绝类错误原样透出消息。
    pub fn user_message(&self) -> String {
        match self {
            AppError::Api(api) if api.is_connectivity() => {
                "无法连接到服务器，请确认服务已启动后重试".to_string()
            }
            AppError::Api(ApiError::BadResponse {
                message: Some(msg), ..
            }) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// 从 anyhow 错误里提取面向用户的一行提示
///
/// 客户端各层返回 anyhow，真正的分类错误（ApiError / FlowError / BalanceError）
/// 通过 downcast 找回来；连接类错误统一显示"无法连接服务器"，
/// 服务器拒绝类错误原样透出消息。
pub fn user_facing_message(err: &anyhow::Error) -> String {
    if let Some(app) = err.downcast_ref::<AppError>() {
        return app.user_message();
    }
    if let Some(api) = err.downcast_ref::<ApiError>() {
        if api.is_connectivity() {
            return "无法连接到服务器，请确认服务已启动后重试".to_string();
        }
        if let ApiError::BadResponse {
            message: Some(msg), ..
        } = api
        {
            return msg.clone();
        }
    }
    if let Some(flow) = err.downcast_ref::<FlowError>() {
        return flow.to_string();
    }
    if let Some(balance) = err.downcast_ref::<BalanceError>() {
        return balance.to_string();
    }
    err.to_string()
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_classification() {
        let err = ApiError::NonJsonResponse {
            endpoint: "/api/auth/login".to_string(),
            content_type: Some("text/html".to_string()),
            preview: "<html>".to_string(),
        };
        assert!(err.is_connectivity());

        let err = ApiError::BadResponse {
            endpoint: "/api/medcoins/spend".to_string(),
            status: 400,
            message: Some("Недостаточно медкоинов".to_string()),
            payload: serde_json::json!({"error": "Недостаточно медкоинов", "balance": 0}),
        };
        assert!(!err.is_connectivity());
    }

    #[test]
    fn test_user_message_passes_server_text_verbatim() {
        let err = AppError::Api(ApiError::BadResponse {
            endpoint: "/api/medcoins/spend".to_string(),
            status: 400,
            message: Some("Дневной лимит исчерпан".to_string()),
            payload: serde_json::json!({}),
        });
        assert_eq!(err.user_message(), "Дневной лимит исчерпан");
    }

    #[test]
    fn test_user_message_generic_for_connectivity() {
        let err = AppError::Api(ApiError::JsonParseFailed {
            source: "unexpected eof".into(),
        });
        assert!(err.user_message().contains("无法连接到服务器"));
    }

    #[test]
    fn test_user_facing_message_survives_context_wrapping() {
        let err = anyhow::Error::from(ApiError::RequestFailed {
            endpoint: "/api/chat".to_string(),
            source: "connection refused".into(),
        })
        .context("发送消息失败");
        assert!(user_facing_message(&err).contains("无法连接到服务器"));
    }

    #[test]
    fn test_flow_error_mentions_both_counts() {
        let msg = FlowError::TestLimitExceeded {
            selected: 9,
            limit: 8,
        }
        .to_string();
        assert!(msg.contains('9'));
        assert!(msg.contains('8'));
    }
}
