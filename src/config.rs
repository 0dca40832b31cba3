use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 后端 API 基础地址
    pub api_base_url: String,
    /// 本地状态目录（令牌、会话记录、偏好、测试历史）
    pub storage_dir: String,
    /// 问诊阶段允许进入下一阶段的最低问答轮数
    pub min_interview_exchanges: usize,
    /// 问诊阶段出现"可以结束"提示的轮数
    pub interview_hint_after: usize,
    /// 诊断阶段可选检查项目的上限
    pub diagnostic_test_limit: usize,
    /// 每次向 AI 患者提问消耗的医币数量
    pub medcoin_cost_per_question: u32,
    /// 本地保留的测试结果历史条数
    pub quiz_history_limit: usize,
    /// 考试模式默认时长（分钟）
    pub quiz_exam_minutes: u32,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 登录邮箱（可选，不填则启动时询问）
    pub login_email: Option<String>,
    /// 登录密码（可选）
    pub login_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3001".to_string(),
            storage_dir: ".medsim".to_string(),
            min_interview_exchanges: 8,
            interview_hint_after: 5,
            diagnostic_test_limit: 8,
            medcoin_cost_per_question: 1,
            quiz_history_limit: 50,
            quiz_exam_minutes: 90,
            verbose_logging: false,
            output_log_file: "session.txt".to_string(),
            login_email: None,
            login_password: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            api_base_url: std::env::var("MEDSIM_API_BASE_URL").unwrap_or(default.api_base_url),
            storage_dir: std::env::var("MEDSIM_STORAGE_DIR").unwrap_or(default.storage_dir),
            min_interview_exchanges: std::env::var("MEDSIM_MIN_INTERVIEW_EXCHANGES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.min_interview_exchanges),
            interview_hint_after: std::env::var("MEDSIM_INTERVIEW_HINT_AFTER").ok().and_then(|v| v.parse().ok()).unwrap_or(default.interview_hint_after),
            diagnostic_test_limit: std::env::var("MEDSIM_DIAGNOSTIC_TEST_LIMIT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.diagnostic_test_limit),
            medcoin_cost_per_question: std::env::var("MEDSIM_MEDCOIN_COST").ok().and_then(|v| v.parse().ok()).unwrap_or(default.medcoin_cost_per_question),
            quiz_history_limit: std::env::var("MEDSIM_QUIZ_HISTORY_LIMIT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.quiz_history_limit),
            quiz_exam_minutes: std::env::var("MEDSIM_QUIZ_EXAM_MINUTES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.quiz_exam_minutes),
            verbose_logging: std::env::var("MEDSIM_VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("MEDSIM_OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            login_email: std::env::var("MEDSIM_LOGIN_EMAIL").ok(),
            login_password: std::env::var("MEDSIM_LOGIN_PASSWORD").ok(),
        }
    }

    /// 从 TOML 文件加载配置
    ///
    /// 文件中未出现的字段保持默认值。
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))?;
        Ok(config)
    }

    /// 加载配置：存在 medsim.toml 就用文件，否则走环境变量
    pub fn load() -> Self {
        let path = Path::new("medsim.toml");
        if path.exists() {
            match Self::from_file(path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("配置文件加载失败，回退到环境变量: {}", e);
                }
            }
        }
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let config = Config::default();
        assert_eq!(config.min_interview_exchanges, 8);
        assert_eq!(config.diagnostic_test_limit, 8);
        assert_eq!(config.medcoin_cost_per_question, 1);
        assert_eq!(config.quiz_history_limit, 50);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config =
            toml::from_str("api_base_url = \"http://10.0.0.2:3001\"\ndiagnostic_test_limit = 5")
                .unwrap();
        assert_eq!(config.api_base_url, "http://10.0.0.2:3001");
        assert_eq!(config.diagnostic_test_limit, 5);
        // 未出现的字段保持默认
        assert_eq!(config.min_interview_exchanges, 8);
        assert_eq!(config.quiz_exam_minutes, 90);
    }
}
