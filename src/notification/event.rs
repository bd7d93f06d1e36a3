//! 订阅者收到的事件
//!
//! 同一个 registry 既分发会话状态（`connection` 分类），也分发入站通知。

use serde::Serialize;
use std::sync::Arc;

use super::category::EventCategory;
use super::payload::Notification;

/// 会话状态事件（`connection` 分类）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionEvent {
    /// 连接已建立
    Connected,
    /// 连接关闭（包括用户主动断开）
    Disconnected { code: u16, reason: String },
    /// 建立连接失败
    Error { error: String },
    /// 已安排下一次重连
    Reconnecting {
        attempt: u32,
        max_attempts: u32,
        delay_ms: u64,
    },
    /// 重连次数耗尽或认证被拒，不再自动重试
    Failed { reason: String },
}

impl ConnectionEvent {
    pub fn status(&self) -> &'static str {
        match self {
            ConnectionEvent::Connected => "connected",
            ConnectionEvent::Disconnected { .. } => "disconnected",
            ConnectionEvent::Error { .. } => "error",
            ConnectionEvent::Reconnecting { .. } => "reconnecting",
            ConnectionEvent::Failed { .. } => "failed",
        }
    }
}

/// Registry 分发的事件
#[derive(Debug, Clone)]
pub enum Event {
    Connection(ConnectionEvent),
    Notification(Arc<Notification>),
}

impl Event {
    /// 事件所属分类
    pub fn category(&self) -> EventCategory {
        match self {
            Event::Connection(_) => EventCategory::Connection,
            Event::Notification(n) => n.category(),
        }
    }

    pub fn as_connection(&self) -> Option<&ConnectionEvent> {
        match self {
            Event::Connection(e) => Some(e),
            Event::Notification(_) => None,
        }
    }

    pub fn as_notification(&self) -> Option<&Notification> {
        match self {
            Event::Notification(n) => Some(n),
            Event::Connection(_) => None,
        }
    }

    /// JSON 形式（CLI `--json` 输出用）
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Event::Connection(e) => serde_json::json!({
                "type": "connection",
                "data": e,
            }),
            Event::Notification(n) => n.to_value(),
        }
    }
}
