//! Listen 命令 - 保持连接，打印收到的事件并弹出原生通知
//!
//! Ctrl-C 退出时关闭连接并输出收件箱统计。Unix 下收到 SIGHUP 时重新读取
//! 配置中的 token：有 token 视为登录（换凭证重连），没有视为登出（断开）。

use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use tracing::{info, warn};

use super::common::ServerArgs;
use super::output::format_event;
use crate::config::ClientConfig;
use crate::notification::{DesktopHost, EventCategory, LogHost, NotificationHost, NotificationInbox};
use crate::supervisor::{SessionSupervisor, SharedToken};

/// Listen 命令参数
#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// 不弹出桌面通知，只写日志
    #[arg(long)]
    pub headless: bool,

    /// 每个事件输出一行 JSON
    #[arg(long)]
    pub json: bool,
}

/// 选择通知宿主
fn notification_host(config: &ClientConfig, headless: bool) -> Option<Arc<dyn NotificationHost>> {
    if headless {
        return Some(Arc::new(LogHost::new()));
    }
    if !config.native_notifications {
        return None;
    }
    let desktop = DesktopHost::detect().with_focus_command(config.focus_command.clone());
    if desktop.is_available() {
        Some(Arc::new(desktop))
    } else {
        warn!("Falling back to log output for notifications");
        Some(Arc::new(LogHost::new()))
    }
}

/// 处理 listen 命令
pub async fn handle_listen(args: ListenArgs) -> Result<()> {
    let config = args.server.resolve()?;
    let endpoint = config.endpoint()?;

    if config.token.is_none() {
        warn!("No token configured, set RTN_TOKEN or pass --token");
    }

    let token = SharedToken::new(config.credential());
    let mut builder = SessionSupervisor::builder(endpoint)
        .retry_policy(config.retry)
        .stop_on_auth_rejection(config.stop_on_auth_rejection)
        .presenter_config(config.presenter_config())
        .token_provider(Arc::new(token.clone()))
        .health_check_interval(config.health_check_interval());
    if let Some(host) = notification_host(&config, args.headless) {
        info!(host = host.name(), "Native notifications enabled");
        builder = builder.notification_host(host);
    }
    let supervisor = builder.build();

    let json = args.json;
    let mut categories = vec![EventCategory::Connection];
    categories.extend(EventCategory::known_notifications());
    for category in categories {
        supervisor.subscribe(category, move |event| {
            println!("{}", format_event(event, json));
        });
    }

    let inbox = Arc::new(NotificationInbox::new());
    inbox.attach(&supervisor.registry());

    supervisor.init();
    #[cfg(unix)]
    let reload = tokio::spawn(reload_token_on_hangup(args.server.clone(), token));

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, shutting down");
    #[cfg(unix)]
    reload.abort();
    supervisor.shutdown().await;

    eprintln!(
        "Received {} notification(s), {} unread",
        inbox.len(),
        inbox.unread_count()
    );
    Ok(())
}

/// SIGHUP 时重新加载 token
#[cfg(unix)]
async fn reload_token_on_hangup(server: ServerArgs, token: SharedToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!(error = %e, "Cannot listen for SIGHUP, token reload disabled");
            return;
        }
    };
    while hangup.recv().await.is_some() {
        match server.resolve() {
            Ok(config) => match config.credential() {
                Some(credential) => {
                    info!("Token reloaded");
                    token.login(credential);
                }
                None => {
                    info!("Token removed from configuration");
                    token.logout();
                }
            },
            Err(e) => warn!(error = %e, "Failed to reload configuration"),
        }
    }
}
