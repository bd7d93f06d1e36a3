//! Server/token flags shared by the commands

use anyhow::Result;
use clap::Args;

use crate::config::ClientConfig;

/// 服务端参数（覆盖配置文件和环境变量）
#[derive(Args, Debug, Clone, Default)]
pub struct ServerArgs {
    /// 服务端基地址，例如 https://api.example.com
    #[arg(long, short)]
    pub server: Option<String>,

    /// 访问 token
    #[arg(long, short)]
    pub token: Option<String>,
}

impl ServerArgs {
    /// 加载配置并应用命令行覆盖
    pub fn resolve(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::load()?;
        self.apply(&mut config);
        Ok(config)
    }

    pub fn apply(&self, config: &mut ClientConfig) {
        if let Some(server) = &self.server {
            config.server_url = server.clone();
        }
        if let Some(token) = &self.token {
            config.token = Some(token.clone());
        }
    }
}
