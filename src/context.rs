//! 应用上下文
//!
//! 把配置、HTTP 执行器和本地存储装进一个显式对象里向下传递，
//! 不在任意调用点读全局状态，测试时可以整体替换。

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::infrastructure::HttpExecutor;
use crate::models::user::AuthSession;
use crate::storage::LocalStore;

/// 应用上下文
///
/// 整个进程一个实例，所有流程都从这里拿资源。
pub struct AppContext {
    pub config: Config,
    pub http: HttpExecutor,
    pub store: LocalStore,
}

impl AppContext {
    /// 构建上下文并恢复上次的登录状态
    pub fn new(config: Config) -> Result<Self> {
        let http = HttpExecutor::new(&config.api_base_url);
        let store = LocalStore::open(&config.storage_dir)?;

        // 本地有令牌就先带上，是否仍然有效由 /api/auth/me 判定
        if let Some(token) = store.load_token() {
            http.set_token(token);
        }

        Ok(Self {
            config,
            http,
            store,
        })
    }

    /// 登录成功后保存会话：注入执行器 + 本地落盘
    pub fn save_session(&self, session: &AuthSession) {
        self.http.set_token(session.token.clone());
        self.store.save_token(&session.token);
        self.store.save_user(&session.user);
    }

    /// 登出
    pub fn logout(&self) {
        self.http.clear_token();
        self.store.clear_auth();
        info!("已登出");
    }
}
