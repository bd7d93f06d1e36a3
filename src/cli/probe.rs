//! Probe 命令 - 连接一次，报告是否连上

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::common::ServerArgs;
use super::output::format_output;
use crate::session::{ConnectionState, SessionSnapshot};
use crate::supervisor::{SessionSupervisor, StaticTokenProvider};

/// Probe 命令参数
#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// 最长等待时间（秒）
    #[arg(long, default_value = "10")]
    pub timeout: u64,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// Probe 输出
#[derive(Debug, Serialize)]
pub struct ProbeOutput {
    pub endpoint: String,
    pub state: ConnectionState,
    pub attempts: u32,
    pub timed_out: bool,
}

/// 处理 probe 命令
pub async fn handle_probe(args: ProbeArgs) -> Result<()> {
    let config = args.server.resolve()?;
    let endpoint = config.endpoint()?;
    let Some(credential) = config.credential() else {
        bail!("No token configured, set RTN_TOKEN or pass --token");
    };

    let supervisor = SessionSupervisor::builder(endpoint.clone())
        .retry_policy(config.retry)
        .stop_on_auth_rejection(config.stop_on_auth_rejection)
        .token_provider(Arc::new(StaticTokenProvider::new(Some(credential))))
        .health_check_interval(None)
        .build();
    supervisor.init();

    let mut timed_out = false;
    if let Some(mut snapshots) = supervisor.watch() {
        let settled = snapshots.wait_for(|s| settled(s));
        match tokio::time::timeout(Duration::from_secs(args.timeout), settled).await {
            Ok(_) => {}
            Err(_) => timed_out = true,
        }
    }

    let snapshot = supervisor.snapshot();
    supervisor.shutdown().await;

    let output = ProbeOutput {
        endpoint: endpoint.redacted(),
        state: snapshot.state,
        attempts: snapshot.attempts,
        timed_out,
    };
    if args.json {
        println!("{}", format_output(&output));
    } else {
        println!("{} -> {}", output.endpoint, output.state);
    }

    if output.state != ConnectionState::Connected {
        bail!("Probe failed: session is {}", output.state);
    }
    Ok(())
}

fn settled(snapshot: &SessionSnapshot) -> bool {
    matches!(
        snapshot.state,
        ConnectionState::Connected | ConnectionState::Failed
    )
}
