//! 监督者构建器

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::token::{StaticTokenProvider, TokenProvider};
use super::{Inner, SessionSupervisor};
use crate::notification::{ListenerRegistry, NativePresenter, NotificationHost, PresenterConfig};
use crate::session::{Connector, RetryPolicy, ServerEndpoint, SessionConfig, WebSocketConnector};

/// 默认健康检查间隔
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// 监督者构建器
pub struct SupervisorBuilder {
    session_config: SessionConfig,
    connector: Option<Arc<dyn Connector>>,
    registry: Option<Arc<ListenerRegistry>>,
    host: Option<Arc<dyn NotificationHost>>,
    presenter_config: PresenterConfig,
    token_provider: Option<Arc<dyn TokenProvider>>,
    health_check_interval: Option<Duration>,
}

impl SupervisorBuilder {
    pub fn new(endpoint: ServerEndpoint) -> Self {
        Self {
            session_config: SessionConfig::new(endpoint),
            connector: None,
            registry: None,
            host: None,
            presenter_config: PresenterConfig::default(),
            token_provider: None,
            health_check_interval: Some(DEFAULT_HEALTH_CHECK_INTERVAL),
        }
    }

    /// 设置重连策略
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.session_config.retry = policy;
        self
    }

    /// 认证被拒时是否停止重连
    pub fn stop_on_auth_rejection(mut self, stop: bool) -> Self {
        self.session_config.stop_on_auth_rejection = stop;
        self
    }

    /// 替换连接器（默认 WebSocket）
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// 使用外部创建的注册表
    pub fn registry(mut self, registry: Arc<ListenerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// 原生通知宿主；不设置时不弹出原生通知
    pub fn notification_host(mut self, host: Arc<dyn NotificationHost>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn presenter_config(mut self, config: PresenterConfig) -> Self {
        self.presenter_config = config;
        self
    }

    pub fn token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// 健康检查间隔，`None` 关闭
    pub fn health_check_interval(mut self, interval: Option<Duration>) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn build(self) -> SessionSupervisor {
        let presenter = self
            .host
            .map(|host| NativePresenter::new(host, self.presenter_config));

        SessionSupervisor {
            inner: Arc::new(Inner {
                session_config: self.session_config,
                connector: self
                    .connector
                    .unwrap_or_else(|| Arc::new(WebSocketConnector::new())),
                registry: self.registry.unwrap_or_default(),
                presenter,
                token_provider: self
                    .token_provider
                    .unwrap_or_else(|| Arc::new(StaticTokenProvider::default())),
                health_check_interval: self.health_check_interval,
                credential: Mutex::new(None),
                running: Mutex::new(None),
            }),
        }
    }
}
