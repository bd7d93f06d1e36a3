//! Config 命令 - 打印合并后的配置（token 已脱敏）

use anyhow::Result;
use clap::Args;

use super::common::ServerArgs;
use super::output::format_output;
use crate::config::ClientConfig;

/// Config 命令参数
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// 处理 config 命令
pub fn handle_config(args: ConfigArgs) -> Result<()> {
    let config = args.server.resolve()?.redacted();
    if args.json {
        println!("{}", format_output(&config));
        return Ok(());
    }

    let path = ClientConfig::default_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<no home directory>".to_string());
    println!("config file:        {path}");
    println!("server_url:         {}", config.server_url);
    match config.endpoint() {
        Ok(endpoint) => println!("endpoint:           {}", endpoint.redacted()),
        Err(e) => println!("endpoint:           invalid ({e:#})"),
    }
    println!("token:              {}", config.token.as_deref().unwrap_or("<none>"));
    println!(
        "retry:              base {}ms x{} up to {} attempts",
        config.retry.base_delay_ms, config.retry.multiplier, config.retry.max_attempts
    );
    println!("auto_dismiss_ms:    {}", config.auto_dismiss_ms);
    println!("health_check_secs:  {}", config.health_check_interval_secs);
    println!("native:             {}", config.native_notifications);
    Ok(())
}
