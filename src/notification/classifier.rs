//! 通知分类器 - 按 `type` 把入站通知路由到对应的处理分支
//!
//! 分类是全函数：字段缺失或类型不对时退化为该分类的默认文案，绝不失败。

use tracing::{debug, info};

use super::category::{EventCategory, NotificationKind};
use super::payload::Notification;

/// 默认文案
pub mod msg {
    pub const REMINDER_DEFAULT: &str = "You have a scheduled post coming up soon";
    pub const SUCCESS_DEFAULT: &str = "Your scheduled post was published";
    pub const FAILURE_DEFAULT: &str = "Your scheduled post could not be published";
    pub const TEST_DEFAULT: &str = "WebSocket connection is working correctly!";
    pub const UNKNOWN_DEFAULT: &str = "New notification";
}

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedNotification {
    /// 展示类别
    pub kind: NotificationKind,
    /// 分发分类（未知类型保留原始 `type`）
    pub category: EventCategory,
    /// 原生通知标题
    pub title: String,
    /// 原生通知正文
    pub message: String,
}

/// 对一条通知分类
pub fn classify(notification: &Notification) -> ClassifiedNotification {
    let category = notification.category();
    let (kind, message) = match &category {
        EventCategory::ScheduledPostReminder => {
            (NotificationKind::Reminder, reminder_message(notification))
        }
        EventCategory::ScheduledPostStatus => {
            let kind = if notification.str_field("status") == Some("success") {
                NotificationKind::Success
            } else {
                NotificationKind::Failure
            };
            let fallback = if kind == NotificationKind::Success {
                msg::SUCCESS_DEFAULT
            } else {
                msg::FAILURE_DEFAULT
            };
            (kind, message_or(notification, fallback))
        }
        EventCategory::TestNotification => {
            (NotificationKind::Info, message_or(notification, msg::TEST_DEFAULT))
        }
        EventCategory::Connection | EventCategory::Other(_) => {
            info!(kind = %notification.kind(), "Unknown notification type");
            (NotificationKind::Unknown, message_or(notification, msg::UNKNOWN_DEFAULT))
        }
    };

    debug!(kind = %kind, category = %category, "Notification classified");

    ClassifiedNotification {
        kind,
        category,
        title: kind.title().to_string(),
        message,
    }
}

fn message_or(notification: &Notification, fallback: &str) -> String {
    notification
        .str_field("message")
        .unwrap_or(fallback)
        .to_string()
}

/// 提醒文案：`prompt` + `minutes_until`
fn reminder_message(notification: &Notification) -> String {
    let prompt = notification.str_field("prompt");
    let minutes = notification
        .int_field("minutes_until")
        .filter(|m| *m >= 0);

    match (prompt, minutes) {
        (Some(prompt), Some(minutes)) => format!(
            "Your post \"{}\" will be published in {} minutes",
            prompt, minutes
        ),
        (None, Some(minutes)) => format!(
            "Your scheduled post will be published in {} minutes",
            minutes
        ),
        (Some(prompt), None) => format!("Your post \"{}\" will be published soon", prompt),
        (None, None) => message_or(notification, msg::REMINDER_DEFAULT),
    }
}
