//! Realtime Notify - 实时通知客户端
//!
//! 维持一条带认证的 WebSocket 连接，断线按指数退避重连，把收到的通知
//! 分类后弹出原生通知并分发给订阅者。

pub mod cli;
pub mod config;
pub mod error;
pub mod notification;
pub mod session;
pub mod supervisor;

pub use config::ClientConfig;
pub use error::{FrameError, TransportError};
pub use notification::{
    ConnectionEvent, Event, EventCategory, ListenerRegistry, NativePresenter, Notification,
    NotificationHost, NotificationInbox, NotificationKind, SubscriptionId,
};
pub use session::{
    ConnectionState, Connector, Credential, RetryPolicy, ServerEndpoint, SessionSnapshot,
    WebSocketConnector,
};
pub use supervisor::{SessionSupervisor, SharedToken, StaticTokenProvider, TokenProvider};
