use anyhow::{Context, Result};
use flashcard_study::utils::logging;
use flashcard_study::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load().await.context("无法加载配置")?;

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    let mut app = App::initialize(config).await.context("应用初始化失败")?;
    app.run().await?;

    Ok(())
}
