//! 病例会话上下文
//!
//! 封装"我正在做哪个病例、按什么限额做"这一信息

use std::fmt::Display;

use crate::config::Config;

/// 病例会话上下文
#[derive(Debug, Clone)]
pub struct CaseCtx {
    /// 病例 ID
    pub case_id: String,

    /// 进入诊断阶段要求的最低问答轮数
    pub min_exchanges: usize,

    /// 出现"可以结束问诊"提示的轮数
    pub hint_after: usize,

    /// 可选检查项目上限
    pub test_limit: usize,

    /// 每次提问消耗的医币
    pub medcoin_cost: u32,
}

impl CaseCtx {
    /// 按配置创建病例上下文
    pub fn from_config(case_id: impl Into<String>, config: &Config) -> Self {
        Self {
            case_id: case_id.into(),
            min_exchanges: config.min_interview_exchanges,
            hint_after: config.interview_hint_after,
            test_limit: config.diagnostic_test_limit,
            medcoin_cost: config.medcoin_cost_per_question,
        }
    }
}

impl Display for CaseCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[病例 #{} 问诊下限 {} 检查上限 {}]",
            self.case_id, self.min_exchanges, self.test_limit
        )
    }
}
