//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：会话日志文件、应用上下文
//! 2. **登录**：配置里有凭据就直接登录，否则在终端里询问
//! 3. **启动加载**：并发拉取用户资料和医币余额，上报一次访问
//! 4. **模式分发**：病例模式 / 题库测试模式

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};

use crate::clients::{AnalyticsClient, AuthClient, CaseClient, MedcoinClient, SubscriptionClient};
use crate::config::Config;
use crate::context::AppContext;
use crate::orchestrator::{case_runner, quiz_runner};
use crate::utils::logging::{init_log_file, log_startup};

/// 运行模式
pub enum RunMode {
    /// 交互式病例模式
    Case,
    /// 题库测试模式
    Quiz(PathBuf),
    /// 管理端聚合统计（可选日期范围 YYYY-MM-DD）
    Stats {
        start_date: Option<String>,
        end_date: Option<String>,
    },
}

impl RunMode {
    /// 从命令行参数解析：`quiz <文件>` 进入测试模式，
    /// `stats [起始日期] [结束日期]` 查看统计，其余走病例模式
    pub fn from_args(mut args: impl Iterator<Item = String>) -> Self {
        match args.next().as_deref() {
            Some("quiz") => match args.next() {
                Some(path) => RunMode::Quiz(PathBuf::from(path)),
                None => {
                    eprintln!("用法: medsim_client quiz <题库文件.txt>");
                    std::process::exit(2);
                }
            },
            Some("stats") => RunMode::Stats {
                start_date: args.next(),
                end_date: args.next(),
            },
            _ => RunMode::Case,
        }
    }
}

/// 应用主结构
pub struct App {
    context: AppContext,
    auth: AuthClient,
    analytics: AnalyticsClient,
    medcoins: MedcoinClient,
    cases: CaseClient,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        init_log_file(&config.output_log_file)?;
        log_startup(&config);

        let context = AppContext::new(config)?;

        Ok(Self {
            context,
            auth: AuthClient::new(),
            analytics: AnalyticsClient::new(),
            medcoins: MedcoinClient::new(),
            cases: CaseClient::new(),
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self, mode: RunMode) -> Result<()> {
        self.ensure_login().await;

        // 资料和余额互不依赖，一起拉
        let (user, balance) = futures::future::join(
            self.auth.current_user(&self.context.http),
            self.medcoins.balance(&self.context.http),
        )
        .await;

        if let Ok(Some(user)) = &user {
            self.context.store.save_user(user);
            info!(
                "👤 当前用户: {}",
                user.name.as_deref().or(user.email.as_deref()).unwrap_or("(未命名)")
            );
        }
        if let Ok(balance) = &balance {
            info!("🪙 医币余额: {} (今日已用 {})", balance.balance, balance.today_usage);
        }

        // 访问埋点失败只记日志
        let page = match &mode {
            RunMode::Case => "/cases",
            RunMode::Quiz(_) => "/gentest",
            RunMode::Stats { .. } => "/admin",
        };
        self.analytics.track_visit(&self.context.http, page, None).await;

        match mode {
            RunMode::Quiz(path) => quiz_runner::run_quiz(&self.context, &path).await,
            RunMode::Stats {
                start_date,
                end_date,
            } => self.show_stats(start_date.as_deref(), end_date.as_deref()).await,
            RunMode::Case => {
                let case_id = match self.pick_case().await? {
                    Some(id) => id,
                    None => return Ok(()),
                };
                case_runner::run_case(&self.context, &case_id).await
            }
        }
    }

    /// 打印管理端聚合统计
    async fn show_stats(&self, start_date: Option<&str>, end_date: Option<&str>) -> Result<()> {
        let stats = self
            .analytics
            .stats(&self.context.http, start_date, end_date)
            .await?;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        Ok(())
    }

    /// 确保已登录
    ///
    /// 本地令牌仍然有效就直接用；否则用配置凭据或终端输入登录。
    /// 登录失败不中断：匿名会话可以浏览病例，只是没有医币功能。
    async fn ensure_login(&self) {
        if self.context.http.has_token() {
            if let Ok(Some(user)) = self.auth.current_user(&self.context.http).await {
                info!("✓ 使用已保存的会话: {}", user.email.as_deref().unwrap_or("?"));
                return;
            }
        }

        let (email, password) = match (
            self.context.config.login_email.clone(),
            self.context.config.login_password.clone(),
        ) {
            (Some(email), Some(password)) => (email, password),
            _ => {
                println!("请登录（直接回车跳过，以匿名模式继续）");
                let email = prompt("邮箱: ").unwrap_or_default();
                if email.is_empty() {
                    info!("以匿名模式继续");
                    return;
                }
                let password = prompt("密码: ").unwrap_or_default();
                (email, password)
            }
        };

        match self.auth.login(&self.context.http, &email, &password).await {
            Ok(session) => self.context.save_session(&session),
            Err(e) => {
                // 登录失败原因照实展示，然后继续匿名会话
                warn!("登录失败: {}", crate::error::user_facing_message(&e));
            }
        }
    }

    /// 列出病例并让用户挑一个
    async fn pick_case(&self) -> Result<Option<String>> {
        let cases = self.cases.list_cases(&self.context.http).await?;
        if cases.is_empty() {
            warn!("⚠️ 病例列表为空，请确认后端已初始化数据");
            return Ok(None);
        }

        println!("\n可用病例:");
        for (idx, case) in cases.iter().enumerate() {
            println!(
                "  {}. [{}] {}",
                idx + 1,
                case.id,
                case.title.as_deref().unwrap_or("(无标题)")
            );
        }

        loop {
            let input = match prompt("\n选择病例编号 (q 退出): ") {
                Some(input) if !input.is_empty() => input,
                Some(_) => continue,
                None => return Ok(None),
            };
            if input == "q" {
                return Ok(None);
            }
            match input.parse::<usize>() {
                Ok(n) if n >= 1 && n <= cases.len() => {
                    let case_id = &cases[n - 1].id;
                    // 订阅 / 令牌不够时换一个病例，不直接退出
                    if self.context.http.has_token() {
                        let access = SubscriptionClient::new()
                            .check_access(&self.context.http, case_id)
                            .await;
                        if !access.has_access {
                            println!(
                                "🔒 无法进入该病例: {}",
                                access.reason.as_deref().unwrap_or("没有访问权限")
                            );
                            continue;
                        }
                    }
                    return Ok(Some(case_id.clone()));
                }
                _ => println!("请输入 1-{} 之间的编号", cases.len()),
            }
        }
    }
}

/// 终端提示输入一行（trim 后返回；EOF 返回 None）
pub(crate) fn prompt(message: &str) -> Option<String> {
    print!("{}", message);
    io::stdout().flush().ok()?;
    let mut line = String::new();
    match io::stdin().read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line.trim().to_string()),
        Err(_) => None,
    }
}
