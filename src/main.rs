use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use item_forge::cli::{Cli, Command};
use item_forge::models::catalog;
use item_forge::services::JobPlanner;
use item_forge::utils::logging;
use item_forge::workflow::AbortSignal;
use item_forge::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置，命令行参数优先
    let mut config = Config::from_env()?;
    cli.apply_to(&mut config);

    // 初始化日志
    logging::init(config.verbose_logging);

    match &cli.command {
        Command::Generate {
            request,
            granularity,
            ..
        } => {
            let abort = AbortSignal::new();
            let on_ctrl_c = abort.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("⛔ 收到中断信号，正在进行的调用结束后停止");
                    on_ctrl_c.abort();
                }
            });

            let app = App::initialize(config, request.to_request(), (*granularity).into(), abort).await?;
            app.run().await?;
        }
        Command::Plan { request } => {
            let request = request.to_request();
            request.validate()?;
            let jobs = JobPlanner::plan_seeded(&request, config.seed);
            println!("{}", serde_json::to_string_pretty(&jobs)?);
        }
        Command::Catalog {
            question_type,
            level,
        } => {
            let question_type = (*question_type).into();
            let level = (*level).into();
            info!("📋 {} {} 考查点:", question_type, level);
            for focus in catalog::focus_options(question_type, level) {
                println!("  - {}", focus);
            }
            info!("💡 主题建议:");
            for topic in catalog::topic_suggestions(level) {
                println!("  - {}", topic);
            }
        }
    }

    Ok(())
}
