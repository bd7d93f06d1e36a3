//! Realtime Notify CLI
//!
//! 连接通知服务端，打印事件并弹出桌面通知

use anyhow::Result;
use clap::{Parser, Subcommand};
use realtime_notify::cli::{
    handle_config, handle_listen, handle_probe, ConfigArgs, ListenArgs, ProbeArgs,
};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "rtn")]
#[command(about = "Realtime Notify - 实时通知客户端")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 保持连接并显示收到的通知
    Listen(ListenArgs),
    /// 连接一次，检查服务端和 token 是否可用
    Probe(ProbeArgs),
    /// 显示合并后的配置
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化 tracing 日志系统
    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    // 例如: RUST_LOG=debug rtn listen
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("realtime_notify=info,rtn=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Listen(args) => handle_listen(args).await,
        Commands::Probe(args) => handle_probe(args).await,
        Commands::Config(args) => handle_config(args),
    }
}
