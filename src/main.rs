use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use cadence_core::{init_logging, AppConfig};

mod app;
mod shutdown;

use app::Application;
use shutdown::{wait_for_shutdown_signal, ShutdownManager};

/// 周期性任务调度器
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(version)]
#[command(about = "周期性任务调度器")]
struct Cli {
    /// 配置文件路径，未指定时依次查找默认路径
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式，覆盖配置文件
    #[arg(long, value_parser = ["json", "pretty"])]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 启动 Worker 执行到期任务（默认）
    Run {
        /// 只执行一轮，不等待下一分钟
        #[arg(long)]
        once: bool,
    },
    /// 列出已调度的任务
    List,
    /// 请求运行中的 Worker 在当前任务结束后停止
    StopWorker,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).with_context(|| {
        format!(
            "加载配置失败: {}",
            cli.config.as_deref().unwrap_or("默认路径")
        )
    })?;
    config.logging = config.logging.with_env_overrides();
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format.parse()?;
    }

    init_logging(&config.logging)?;

    let app = Application::new(config).context("初始化应用失败")?;

    match cli.command.unwrap_or(Commands::Run { once: false }) {
        Commands::Run { once } => run(app, once).await,
        Commands::List => app.list().await,
        Commands::StopWorker => app.stop_worker().await,
    }
}

async fn run(app: Application, once: bool) -> Result<()> {
    info!("启动周期性任务调度器");

    let shutdown_manager = ShutdownManager::new();
    let shutdown_rx = shutdown_manager.subscribe().await;
    let mut app_handle = tokio::spawn(async move { app.run(once, shutdown_rx).await });

    tokio::select! {
        result = &mut app_handle => {
            return match result {
                Ok(result) => result,
                Err(e) => Err(anyhow::anyhow!("Worker 任务异常退出: {e}")),
            };
        }
        _ = wait_for_shutdown_signal() => {
            info!("收到关闭信号，开始优雅关闭...");
        }
    }

    shutdown_manager.shutdown().await;

    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(Ok(Ok(()))) => info!("调度器已优雅关闭"),
        Ok(Ok(Err(e))) => error!("调度器关闭时发生错误: {e}"),
        Ok(Err(e)) => error!("Worker 任务异常退出: {e}"),
        Err(_) => warn!("调度器关闭超时，强制退出"),
    }

    Ok(())
}
