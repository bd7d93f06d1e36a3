//! 连接会话层
//!
//! - `connection`：会话任务与状态机
//! - `retry`：指数退避策略
//! - `transport`：传输 trait 与 WebSocket 实现
//! - `scripted`：内存连接器（测试和离线演示用）

pub mod connection;
pub mod credential;
pub mod endpoint;
pub mod retry;
pub mod scripted;
pub mod state;
pub mod transport;

pub use connection::{ConnectionSession, SessionConfig, SessionHandle};
pub use credential::Credential;
pub use endpoint::{ServerEndpoint, DEFAULT_NOTIFICATIONS_PATH};
pub use retry::{RetryPolicy, RetryState};
pub use scripted::{ScriptedConnector, ScriptedServer};
pub use state::{ConnectionState, SessionSnapshot};
pub use transport::{Connector, Transport, TransportEvent, WebSocketConnector};
