//! 连接会话 - 持有传输、状态机和重连策略
//!
//! 会话以单个 tokio 任务运行，所有状态只在这个任务里修改。外部通过
//! [`SessionHandle`] 发命令，命令都是非阻塞的。
//!
//! 状态转换：
//! - Disconnected --connect--> Connecting --打开成功--> Connected（重置重连次数）
//! - Connecting --打开失败--> Disconnected，按退避安排重连
//! - Connected --连接关闭--> Disconnected，按退避安排重连
//! - Connected --disconnect--> Closing --> Disconnected，直到下次 connect 前不再重连
//! - 重连次数耗尽 --> Failed，不再自动重连；再次 connect 时次数从 0 开始
//!
//! 每次打开连接都带一个代数（generation）。disconnect 或 force_reconnect 之后
//! 才完成的旧连接会被直接关闭，不会进入 Connected。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::credential::Credential;
use super::endpoint::ServerEndpoint;
use super::retry::{RetryPolicy, RetryState};
use super::state::{ConnectionState, SessionSnapshot};
use super::transport::{
    Connector, Transport, TransportEvent, CLOSE_NORMAL, CLOSE_POLICY_VIOLATION,
};
use crate::error::TransportError;
use crate::notification::{
    classify, ConnectionEvent, Event, ListenerRegistry, NativePresenter, Notification,
};

const USER_DISCONNECT_REASON: &str = "User disconnected";
const FORCE_RECONNECT_REASON: &str = "Reconnecting";
const SHUTDOWN_REASON: &str = "Client shutdown";
const SUPERSEDED_REASON: &str = "Superseded";
/// 关闭握手的最长等待时间
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// 会话配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoint: ServerEndpoint,
    pub retry: RetryPolicy,
    /// 握手 401/403 或关闭码 1008 时直接进入 Failed
    pub stop_on_auth_rejection: bool,
}

impl SessionConfig {
    pub fn new(endpoint: ServerEndpoint) -> Self {
        Self {
            endpoint,
            retry: RetryPolicy::default(),
            stop_on_auth_rejection: true,
        }
    }
}

enum Command {
    Connect(Credential),
    Disconnect,
    ForceReconnect(Option<Credential>),
    Shutdown(oneshot::Sender<()>),
}

enum Internal {
    Opened {
        generation: u64,
        result: Result<Box<dyn Transport>, TransportError>,
    },
    CloseFinished {
        generation: u64,
        code: u16,
        reason: String,
    },
}

/// 会话句柄，可随意 clone
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    should_reconnect: Arc<AtomicBool>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// 连接；正在连接或已连接时是空操作
    pub fn connect(&self, credential: Credential) {
        self.should_reconnect.store(true, Ordering::SeqCst);
        self.send(Command::Connect(credential));
    }

    /// 断开并关闭自动重连，立即生效
    pub fn disconnect(&self) {
        self.should_reconnect.store(false, Ordering::SeqCst);
        self.send(Command::Disconnect);
    }

    /// 关闭现有连接并立即重新连接；`None` 时沿用会话当前的凭证
    pub fn force_reconnect(&self, credential: Option<Credential>) {
        self.should_reconnect.store(true, Ordering::SeqCst);
        self.send(Command::ForceReconnect(credential));
    }

    pub fn status(&self) -> ConnectionState {
        self.snapshot.borrow().state
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionState::Connected
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        *self.snapshot.borrow()
    }

    /// 订阅快照变化
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// 是否允许自动重连
    pub fn reconnect_enabled(&self) -> bool {
        self.should_reconnect.load(Ordering::SeqCst)
    }

    /// 关闭连接并停止会话任务
    pub async fn shutdown(&self) {
        self.should_reconnect.store(false, Ordering::SeqCst);
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Shutdown(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// 会话任务是否已退出
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Session task has stopped, command ignored");
        }
    }
}

/// 连接会话
pub struct ConnectionSession {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    registry: Arc<ListenerRegistry>,
    presenter: Option<NativePresenter>,

    state: ConnectionState,
    retry: RetryState,
    credential: Option<Credential>,
    transport: Option<Box<dyn Transport>>,
    generation: u64,
    retry_deadline: Option<Instant>,
    pending_delay: Option<Duration>,
    /// Closing 期间收到的 connect，关闭完成后执行
    pending_connect: bool,

    should_reconnect: Arc<AtomicBool>,
    snapshot: watch::Sender<SessionSnapshot>,
    internal_tx: mpsc::UnboundedSender<Internal>,
}

impl ConnectionSession {
    /// 启动会话任务（需要在 tokio runtime 中调用）
    pub fn spawn(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        registry: Arc<ListenerRegistry>,
        presenter: Option<NativePresenter>,
    ) -> SessionHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());
        let should_reconnect = Arc::new(AtomicBool::new(false));

        let session = ConnectionSession {
            config,
            connector,
            registry,
            presenter,
            state: ConnectionState::Disconnected,
            retry: RetryState::default(),
            credential: None,
            transport: None,
            generation: 0,
            retry_deadline: None,
            pending_delay: None,
            pending_connect: false,
            should_reconnect: should_reconnect.clone(),
            snapshot: snapshot_tx,
            internal_tx,
        };
        tokio::spawn(session.run(commands_rx, internal_rx));

        SessionHandle {
            commands: commands_tx,
            should_reconnect,
            snapshot: snapshot_rx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        debug!(endpoint = %self.config.endpoint.redacted(), "Session task started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown(ack)) => {
                        self.teardown().await;
                        let _ = ack.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        self.teardown().await;
                        break;
                    }
                },
                Some(message) = internal.recv() => self.handle_internal(message),
                event = next_transport_event(&mut self.transport) => self.handle_transport_event(event),
                _ = sleep_until(self.retry_deadline) => self.retry_due(),
            }
        }
        debug!("Session task stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(credential) => {
                self.credential = Some(credential);
                self.connect();
            }
            Command::Disconnect => self.disconnect(),
            Command::ForceReconnect(credential) => {
                if credential.is_some() {
                    self.credential = credential;
                }
                self.force_reconnect();
            }
            // run 循环里处理
            Command::Shutdown(_) => {}
        }
    }

    fn connect(&mut self) {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                debug!(state = %self.state, "Already connecting or connected, ignoring connect");
            }
            ConnectionState::Closing => {
                debug!("Connect requested while closing, deferring");
                self.pending_connect = true;
            }
            ConnectionState::Failed => {
                info!("Restarting failed session with a fresh attempt counter");
                self.retry.reset();
                self.start_open();
            }
            ConnectionState::Disconnected => self.start_open(),
        }
    }

    fn disconnect(&mut self) {
        info!(state = %self.state, "Disconnecting");
        self.cancel_retry();
        self.retry.reset();
        self.pending_connect = false;
        self.credential = None;

        match self.state {
            ConnectionState::Connected => self.begin_close(USER_DISCONNECT_REASON),
            ConnectionState::Connecting => {
                // 进行中的打开作废
                self.generation += 1;
                self.set_state(ConnectionState::Disconnected);
                self.emit(ConnectionEvent::Disconnected {
                    code: CLOSE_NORMAL,
                    reason: USER_DISCONNECT_REASON.to_string(),
                });
            }
            ConnectionState::Closing => {}
            ConnectionState::Failed | ConnectionState::Disconnected => {
                self.set_state(ConnectionState::Disconnected);
            }
        }
    }

    fn force_reconnect(&mut self) {
        info!(state = %self.state, "Forcing reconnect");
        self.cancel_retry();
        self.retry.reset();

        match self.state {
            ConnectionState::Connected => {
                self.pending_connect = true;
                self.begin_close(FORCE_RECONNECT_REASON);
            }
            ConnectionState::Closing => self.pending_connect = true,
            ConnectionState::Connecting => {
                self.generation += 1;
                self.set_state(ConnectionState::Disconnected);
                self.start_open();
            }
            ConnectionState::Disconnected | ConnectionState::Failed => {
                self.set_state(ConnectionState::Disconnected);
                self.start_open();
            }
        }
    }

    /// 发起一次打开，结果通过内部通道回到会话任务
    fn start_open(&mut self) {
        let Some(credential) = self.credential.clone() else {
            info!("No credential available, not connecting");
            return;
        };
        self.cancel_retry();
        self.generation += 1;
        let generation = self.generation;
        let url = self.config.endpoint.url_for(&credential);

        info!(
            url = %self.config.endpoint.redacted(),
            attempt = self.retry.attempts(),
            "Connecting to notification server"
        );
        self.set_state(ConnectionState::Connecting);

        let connector = self.connector.clone();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = connector.open(&url).await;
            let _ = tx.send(Internal::Opened { generation, result });
        });
    }

    /// Connected -> Closing，后台完成关闭握手
    fn begin_close(&mut self, reason: &'static str) {
        let Some(mut transport) = self.transport.take() else {
            self.set_state(ConnectionState::Disconnected);
            return;
        };
        self.generation += 1;
        let generation = self.generation;
        self.set_state(ConnectionState::Closing);

        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let _ = tokio::time::timeout(CLOSE_TIMEOUT, transport.close(CLOSE_NORMAL, reason)).await;
            let _ = tx.send(Internal::CloseFinished {
                generation,
                code: CLOSE_NORMAL,
                reason: reason.to_string(),
            });
        });
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::Opened { generation, result } => self.open_finished(generation, result),
            Internal::CloseFinished {
                generation,
                code,
                reason,
            } => {
                if generation != self.generation || self.state != ConnectionState::Closing {
                    return;
                }
                info!(code, reason = %reason, "Connection closed by client");
                self.set_state(ConnectionState::Disconnected);
                self.emit(ConnectionEvent::Disconnected { code, reason });
                if std::mem::take(&mut self.pending_connect) {
                    self.start_open();
                }
            }
        }
    }

    fn open_finished(&mut self, generation: u64, result: Result<Box<dyn Transport>, TransportError>) {
        if generation != self.generation || self.state != ConnectionState::Connecting {
            if let Ok(mut stale) = result {
                debug!(generation, "Closing transport from a superseded open");
                tokio::spawn(async move {
                    let _ = tokio::time::timeout(CLOSE_TIMEOUT, stale.close(CLOSE_NORMAL, SUPERSEDED_REASON)).await;
                });
            }
            return;
        }

        match result {
            Ok(transport) => {
                self.transport = Some(transport);
                self.retry.reset();
                self.set_state(ConnectionState::Connected);
                info!("Connected to notification server");
                self.emit(ConnectionEvent::Connected);
            }
            Err(error) => {
                warn!(error = %error, attempt = self.retry.attempts(), "Failed to open connection");
                self.set_state(ConnectionState::Disconnected);
                self.emit(ConnectionEvent::Error {
                    error: error.to_string(),
                });
                if error.is_auth_rejection() && self.config.stop_on_auth_rejection {
                    self.fail(format!("authentication rejected: {error}"));
                } else {
                    self.schedule_reconnect();
                }
            }
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Frame(text) => self.handle_frame(&text),
            TransportEvent::Closed { code, reason } => {
                self.transport = None;
                info!(code, reason = %reason, "Connection closed");
                self.set_state(ConnectionState::Disconnected);
                self.emit(ConnectionEvent::Disconnected {
                    code,
                    reason: reason.clone(),
                });
                if code == CLOSE_POLICY_VIOLATION && self.config.stop_on_auth_rejection {
                    self.fail(format!("server closed the connection: {code} {reason}"));
                } else {
                    self.schedule_reconnect();
                }
            }
        }
    }

    /// 解析 -> 分类 -> 弹出 -> 分发，处理完才读下一帧
    fn handle_frame(&self, text: &str) {
        let notification = match Notification::from_frame(text) {
            Ok(n) => Arc::new(n),
            Err(e) => {
                warn!(error = %e, len = text.len(), "Dropping malformed frame");
                return;
            }
        };

        let classified = classify(&notification);
        debug!(kind = %classified.kind, category = %classified.category, "Notification received");
        if let Some(presenter) = &self.presenter {
            presenter.present(&classified);
        }
        self.registry.publish(&Event::Notification(notification));
    }

    fn schedule_reconnect(&mut self) {
        if !self.should_reconnect.load(Ordering::SeqCst) {
            debug!("Reconnection disabled, staying disconnected");
            return;
        }
        if self.credential.is_none() {
            debug!("No credential, not scheduling reconnect");
            return;
        }

        let policy = self.config.retry;
        match self.retry.next_attempt(&policy) {
            Some((attempt, delay)) => {
                let now = Instant::now();
                self.retry_deadline = Some(now.checked_add(delay).unwrap_or_else(|| far_future(now)));
                self.pending_delay = Some(delay);
                self.publish_snapshot();

                let delay_ms = delay.as_millis().min(u64::MAX as u128) as u64;
                info!(attempt, max_attempts = policy.max_attempts, delay_ms, "Scheduling reconnect");
                self.emit(ConnectionEvent::Reconnecting {
                    attempt,
                    max_attempts: policy.max_attempts,
                    delay_ms,
                });
            }
            None => self.fail(format!(
                "gave up after {} reconnection attempts",
                policy.max_attempts
            )),
        }
    }

    fn retry_due(&mut self) {
        self.retry_deadline = None;
        self.pending_delay = None;
        if !self.should_reconnect.load(Ordering::SeqCst) || self.state != ConnectionState::Disconnected {
            self.publish_snapshot();
            return;
        }
        debug!(attempt = self.retry.attempts(), "Reconnect timer fired");
        self.start_open();
    }

    fn fail(&mut self, reason: String) {
        self.cancel_retry();
        warn!(reason = %reason, "Giving up on the notification connection");
        self.set_state(ConnectionState::Failed);
        self.emit(ConnectionEvent::Failed { reason });
    }

    fn cancel_retry(&mut self) {
        if self.retry_deadline.take().is_some() {
            debug!("Pending reconnect cancelled");
        }
        self.pending_delay = None;
        self.publish_snapshot();
    }

    async fn teardown(&mut self) {
        self.should_reconnect.store(false, Ordering::SeqCst);
        self.cancel_retry();
        self.pending_connect = false;
        self.generation += 1;

        if let Some(mut transport) = self.transport.take() {
            let _ = tokio::time::timeout(CLOSE_TIMEOUT, transport.close(CLOSE_NORMAL, SHUTDOWN_REASON)).await;
            self.set_state(ConnectionState::Disconnected);
            self.emit(ConnectionEvent::Disconnected {
                code: CLOSE_NORMAL,
                reason: SHUTDOWN_REASON.to_string(),
            });
        } else {
            self.set_state(ConnectionState::Disconnected);
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Session state changed");
            self.state = state;
        }
        self.publish_snapshot();
    }

    fn publish_snapshot(&self) {
        self.snapshot.send_replace(SessionSnapshot {
            state: self.state,
            attempts: self.retry.attempts(),
            pending_retry_ms: self
                .pending_delay
                .map(|d| d.as_millis().min(u64::MAX as u128) as u64),
        });
    }

    fn emit(&self, event: ConnectionEvent) {
        self.registry.publish(&Event::Connection(event));
    }
}

async fn next_transport_event(transport: &mut Option<Box<dyn Transport>>) -> TransportEvent {
    match transport {
        Some(transport) => transport.next_event().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn far_future(now: Instant) -> Instant {
    now + Duration::from_secs(86_400 * 365 * 30)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::endpoint::DEFAULT_NOTIFICATIONS_PATH;
    use crate::session::scripted::ScriptedConnector;

    fn spawn(connector: &Arc<ScriptedConnector>) -> SessionHandle {
        let endpoint = ServerEndpoint::parse("http://localhost:8000", DEFAULT_NOTIFICATIONS_PATH).unwrap();
        ConnectionSession::spawn(
            SessionConfig::new(endpoint),
            connector.clone(),
            Arc::new(ListenerRegistry::new()),
            None,
        )
    }

    fn credential() -> Credential {
        Credential::new("token-1").unwrap()
    }

    async fn wait_for(handle: &SessionHandle, state: ConnectionState) {
        let mut rx = handle.watch();
        rx.wait_for(|s| s.state == state).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_finishing_after_disconnect_is_closed() {
        let connector = Arc::new(ScriptedConnector::new());
        connector.set_open_delay(Duration::from_secs(1));
        let server = connector.accept();
        let handle = spawn(&connector);

        handle.connect(credential());
        wait_for(&handle, ConnectionState::Connecting).await;
        handle.disconnect();
        wait_for(&handle, ConnectionState::Disconnected).await;

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(handle.status(), ConnectionState::Disconnected);
        assert_eq!(server.client_close(), Some((CLOSE_NORMAL, SUPERSEDED_REASON.to_string())));
        assert_eq!(connector.live_transports(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_while_closing_is_deferred() {
        let connector = Arc::new(ScriptedConnector::new());
        let first = connector.accept();
        connector.accept();
        let handle = spawn(&connector);

        handle.connect(credential());
        wait_for(&handle, ConnectionState::Connected).await;

        handle.disconnect();
        handle.connect(credential());
        while connector.open_count() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        wait_for(&handle, ConnectionState::Connected).await;

        assert_eq!(first.client_close(), Some((CLOSE_NORMAL, USER_DISCONNECT_REASON.to_string())));
        assert_eq!(connector.open_count(), 2);
        assert_eq!(connector.peak_live_transports(), 1);
        assert!(handle.reconnect_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_task() {
        let connector = Arc::new(ScriptedConnector::new());
        let server = connector.accept();
        let handle = spawn(&connector);

        handle.connect(credential());
        wait_for(&handle, ConnectionState::Connected).await;
        handle.shutdown().await;

        assert_eq!(handle.status(), ConnectionState::Disconnected);
        assert_eq!(server.client_close(), Some((CLOSE_NORMAL, SHUTDOWN_REASON.to_string())));
        tokio::task::yield_now().await;
        assert!(handle.is_closed());

        // 任务退出后命令被忽略
        handle.connect(credential());
        assert_eq!(connector.open_count(), 1);
    }
}
