use anyhow::Result;
use medsim_client::orchestrator::{App, RunMode};
use medsim_client::utils::logging;
use medsim_client::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load();

    // 初始化日志
    logging::init(config.verbose_logging);

    // 解析运行模式（quiz <文件> / 默认病例模式）
    let mode = RunMode::from_args(std::env::args().skip(1));

    // 初始化并运行应用
    App::initialize(config).await?.run(mode).await?;

    Ok(())
}
