//! 会话监督者 - 对外的唯一入口
//!
//! 持有凭证，驱动连接会话的生命周期，并把监听器注册表暴露给外部。
//! 没有全局实例：每个 `SessionSupervisor` 都是独立的，`init()` 启动、
//! `shutdown()` 停止。
//!
//! ```ignore
//! let supervisor = SessionSupervisor::builder(endpoint)
//!     .token_provider(Arc::new(token))
//!     .build();
//! supervisor.init();
//! supervisor.subscribe(EventCategory::ScheduledPostStatus, |event| { ... });
//! ```

pub mod builder;
pub mod token;

pub use builder::SupervisorBuilder;
pub use token::{SharedToken, StaticTokenProvider, TokenProvider};

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::notification::{
    Event, EventCategory, ListenerRegistry, NativePresenter, SubscriptionId,
};
use crate::session::{
    ConnectionSession, ConnectionState, Connector, Credential, ServerEndpoint, SessionConfig,
    SessionHandle, SessionSnapshot,
};

struct Running {
    session: SessionHandle,
    tasks: Vec<JoinHandle<()>>,
}

struct Inner {
    session_config: SessionConfig,
    connector: Arc<dyn Connector>,
    registry: Arc<ListenerRegistry>,
    presenter: Option<NativePresenter>,
    token_provider: Arc<dyn TokenProvider>,
    health_check_interval: Option<Duration>,
    credential: Mutex<Option<Credential>>,
    running: Mutex<Option<Running>>,
}

/// 会话监督者
#[derive(Clone)]
pub struct SessionSupervisor {
    inner: Arc<Inner>,
}

impl SessionSupervisor {
    pub fn builder(endpoint: ServerEndpoint) -> SupervisorBuilder {
        SupervisorBuilder::new(endpoint)
    }

    /// 启动会话任务、token 监听和健康检查；有凭证时立即连接。重复调用无效果
    pub fn init(&self) {
        let mut running = lock(&self.inner.running);
        if running.is_some() {
            debug!("Supervisor already initialized");
            return;
        }

        let session = ConnectionSession::spawn(
            self.inner.session_config.clone(),
            self.inner.connector.clone(),
            self.inner.registry.clone(),
            self.inner.presenter.clone(),
        );

        let mut tasks = Vec::new();
        if let Some(changes) = self.inner.token_provider.subscribe_changes() {
            tasks.push(tokio::spawn(watch_token(Arc::downgrade(&self.inner), changes)));
        }
        if let Some(interval) = self.inner.health_check_interval.filter(|d| !d.is_zero()) {
            tasks.push(tokio::spawn(health_check(Arc::downgrade(&self.inner), interval)));
        }

        let credential = self.inner.token_provider.current_token();
        *lock(&self.inner.credential) = credential.clone();
        info!(
            endpoint = %self.inner.session_config.endpoint.redacted(),
            has_credential = credential.is_some(),
            health_check_secs = self.inner.health_check_interval.map(|d| d.as_secs()),
            "Session supervisor started"
        );
        if let Some(credential) = credential {
            session.connect(credential);
        }
        *running = Some(Running { session, tasks });
    }

    /// 停止后台任务并关闭连接
    pub async fn shutdown(&self) {
        let running = lock(&self.inner.running).take();
        let Some(running) = running else {
            return;
        };
        for task in &running.tasks {
            task.abort();
        }
        running.session.shutdown().await;
        info!("Session supervisor stopped");
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.running).is_some()
    }

    /// 用给定凭证连接；传 `None` 时使用已持有的凭证，都没有时什么也不做
    pub fn connect(&self, credential: impl Into<Option<Credential>>) {
        let credential = match credential.into() {
            Some(credential) => {
                *lock(&self.inner.credential) = Some(credential.clone());
                credential
            }
            None => match self.credential() {
                Some(credential) => credential,
                None => {
                    info!("No credential available, connect skipped");
                    return;
                }
            },
        };
        match self.session() {
            Some(session) => session.connect(credential),
            None => warn!("Supervisor not initialized, connect ignored"),
        }
    }

    /// 断开、关闭自动重连并丢弃凭证
    pub fn disconnect(&self) {
        *lock(&self.inner.credential) = None;
        if let Some(session) = self.session() {
            session.disconnect();
        }
    }

    /// 未连接时用已持有的凭证连接
    pub fn ensure_connected(&self) {
        let Some(session) = self.session() else {
            return;
        };
        if session.is_connected() {
            return;
        }
        match self.credential() {
            Some(credential) => session.connect(credential),
            None => debug!("No credential, ensure_connected skipped"),
        }
    }

    /// 关闭现有连接并立即重连
    pub fn force_reconnect(&self) {
        match self.session() {
            Some(session) => session.force_reconnect(self.credential()),
            None => warn!("Supervisor not initialized, force_reconnect ignored"),
        }
    }

    pub fn status(&self) -> ConnectionState {
        self.session()
            .map_or(ConnectionState::Disconnected, |s| s.status())
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionState::Connected
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session().map(|s| s.snapshot()).unwrap_or_default()
    }

    /// 订阅会话快照变化；未初始化时返回 `None`
    pub fn watch(&self) -> Option<watch::Receiver<SessionSnapshot>> {
        self.session().map(|s| s.watch())
    }

    pub fn subscribe<F>(&self, category: EventCategory, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.registry.subscribe(category, callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.registry.unsubscribe(id)
    }

    pub fn registry(&self) -> Arc<ListenerRegistry> {
        self.inner.registry.clone()
    }

    /// 是否持有凭证
    pub fn has_credential(&self) -> bool {
        lock(&self.inner.credential).is_some()
    }

    fn credential(&self) -> Option<Credential> {
        lock(&self.inner.credential).clone()
    }

    fn session(&self) -> Option<SessionHandle> {
        lock(&self.inner.running).as_ref().map(|r| r.session.clone())
    }
}

/// 登录时换凭证重连，登出时断开
async fn watch_token(inner: Weak<Inner>, mut changes: watch::Receiver<Option<Credential>>) {
    while changes.changed().await.is_ok() {
        let token = changes.borrow_and_update().clone();
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let supervisor = SessionSupervisor { inner };
        match token {
            Some(credential) => {
                if supervisor.credential().as_ref() == Some(&credential) {
                    continue;
                }
                info!("Credential changed, reconnecting");
                *lock(&supervisor.inner.credential) = Some(credential.clone());
                if let Some(session) = supervisor.session() {
                    session.force_reconnect(Some(credential));
                }
            }
            None => {
                info!("Credential cleared, disconnecting");
                supervisor.disconnect();
            }
        }
    }
}

/// 周期性 ensure_connected；Failed 或已安排重连时跳过
async fn health_check(inner: Weak<Inner>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // 第一次 tick 立即完成
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let supervisor = SessionSupervisor { inner };
        let snapshot = supervisor.snapshot();
        if snapshot.state == ConnectionState::Failed || snapshot.pending_retry_ms.is_some() {
            continue;
        }
        supervisor.ensure_connected();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
