use anyhow::Result;
use rfp_batch_answer::{logger, App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logger::init(config.verbose_logging);

    let batch_path = std::env::args().nth(1).unwrap_or_else(|| "batch.json".to_string());

    // 初始化并运行应用
    let response = App::initialize(config).await?.run(&batch_path).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}
