//! 会话状态

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// 连接状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// 未连接（初始状态，或连接关闭后等待重连）
    Disconnected,
    /// 正在建立连接
    Connecting,
    /// 已连接
    Connected,
    /// 用户主动断开，正在关闭
    Closing,
    /// 重连次数耗尽或认证被拒，不再自动重连
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
            ConnectionState::Failed => "failed",
        }
    }

    /// 正在连接或已连接，此时 connect 是空操作
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 会话快照，可同步读取
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: ConnectionState,
    /// 自上次成功连接以来的重连次数
    pub attempts: u32,
    /// 已安排的重连延迟（毫秒）
    pub pending_retry_ms: Option<u64>,
}

impl SessionSnapshot {
    pub fn pending_retry(&self) -> Option<Duration> {
        self.pending_retry_ms.map(Duration::from_millis)
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            pending_retry_ms: None,
        }
    }
}
