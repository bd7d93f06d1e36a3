//! 客户端配置
//!
//! 加载顺序（后者覆盖前者）：
//! 1. 默认值
//! 2. 配置文件 `~/.config/realtime-notify/config.json`
//! 3. 环境变量 `RTN_SERVER_URL`、`RTN_TOKEN`
//! 4. 命令行参数（由 CLI 处理）

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::notification::{DisplayPreferences, PresenterConfig};
use crate::session::{Credential, RetryPolicy, ServerEndpoint, DEFAULT_NOTIFICATIONS_PATH};

pub const ENV_SERVER_URL: &str = "RTN_SERVER_URL";
pub const ENV_TOKEN: &str = "RTN_TOKEN";

const CONFIG_RELATIVE_PATH: &str = ".config/realtime-notify/config.json";

/// 客户端配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// HTTP(S) 基地址，WebSocket 地址由它推导
    pub server_url: String,
    pub notifications_path: String,
    pub token: Option<String>,
    pub retry: RetryPolicy,
    /// 非常驻通知的自动关闭时间
    pub auto_dismiss_ms: u64,
    /// 0 表示关闭健康检查
    pub health_check_interval_secs: u64,
    pub stop_on_auth_rejection: bool,
    pub native_notifications: bool,
    pub display: DisplayPreferences,
    /// 点击通知后执行的命令，例如 `["wmctrl", "-a", "Social Scheduler"]`
    pub focus_command: Option<Vec<String>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_string(),
            notifications_path: DEFAULT_NOTIFICATIONS_PATH.to_string(),
            token: None,
            retry: RetryPolicy::default(),
            auto_dismiss_ms: 5_000,
            health_check_interval_secs: 5,
            stop_on_auth_rejection: true,
            native_notifications: true,
            display: DisplayPreferences::default(),
            focus_command: None,
        }
    }
}

impl ClientConfig {
    /// 默认配置文件路径
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_RELATIVE_PATH))
    }

    /// 从默认路径加载并应用环境变量
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// 从指定文件加载；文件不存在时返回默认值
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ClientConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// 应用环境变量覆盖；空值忽略
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(ENV_SERVER_URL) {
            self.server_url = url;
        }
        if let Some(token) = non_empty(ENV_TOKEN) {
            self.token = Some(token);
        }
    }

    pub fn endpoint(&self) -> Result<ServerEndpoint> {
        ServerEndpoint::parse(&self.server_url, &self.notifications_path)
            .with_context(|| format!("Invalid server_url {}", self.server_url))
    }

    pub fn credential(&self) -> Option<Credential> {
        Credential::from_optional(self.token.as_deref())
    }

    pub fn presenter_config(&self) -> PresenterConfig {
        PresenterConfig {
            auto_dismiss: Duration::from_millis(self.auto_dismiss_ms),
            preferences: self.display,
        }
    }

    pub fn health_check_interval(&self) -> Option<Duration> {
        (self.health_check_interval_secs > 0)
            .then(|| Duration::from_secs(self.health_check_interval_secs))
    }

    /// 打印用，token 已脱敏
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.token.is_some() {
            config.token = Some("***".to_string());
        }
        config
    }
}
