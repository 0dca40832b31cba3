//! # MedSim Client
//!
//! 医学教育模拟平台的客户端：学生问诊 AI 患者、选择检查、开具治疗方案，
//! 并拿到 AI 生成的点评。所有业务数据都在远端，客户端只通过 HTTP/JSON 访问。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（reqwest::Client），只暴露能力
//! - `HttpExecutor` - 唯一的 HTTP owner，提供 get_json()/post_json() 能力
//!
//! ### ② 业务能力层（Clients & Services）
//! - `clients/` - 按 API 领域划分的客户端（认证、病例、对话、诊断、治疗、医币、订阅、统计）
//! - `services/` - 纯本地能力：题库解析（QuizParser）、测试会话（QuizSession）、语言检测
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个病例"的完整流程
//! - `CaseCtx` - 上下文封装（case_id + 各项限额）
//! - `CaseSession` - 四阶段状态机（问诊 → 诊断 → 治疗 → 结果）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 应用生命周期（初始化、登录、模式分发）
//! - `orchestrator/case_runner` / `quiz_runner` - 终端交互循环
//!
//! 横向支撑：`context`（显式注入的应用上下文）、`storage`（本地状态镜像）、
//! `config`、`error`、`utils`。
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod context;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod storage;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use context::AppContext;
pub use error::{AppError, AppResult};
pub use infrastructure::HttpExecutor;
pub use models::quiz::Question;
pub use orchestrator::{App, RunMode};
pub use services::{QuizParser, QuizSession};
pub use storage::LocalStore;
pub use workflow::{CaseCtx, CaseSession, PhaseState};
