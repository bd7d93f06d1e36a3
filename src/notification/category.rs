//! Event categories and notification kinds
//!
//! `EventCategory` is the key subscribers register under. It mirrors the
//! server's `type` discriminator, plus `Connection` for session status and
//! `Other` for discriminators this client does not know yet.
//!
//! `NotificationKind` is the presentation class the classifier derives:
//! - Reminder / Success / Info: auto-dismissed after a short interval
//! - Failure: persistent, the user has to dismiss it
//! - Unknown: never rendered natively, only published

use std::fmt;

/// Wire discriminator for reminder frames.
pub const SCHEDULED_POST_REMINDER: &str = "scheduled_post_reminder";
/// Wire discriminator for publish status frames.
pub const SCHEDULED_POST_STATUS: &str = "scheduled_post_status";
/// Wire discriminator for test pings.
pub const TEST_NOTIFICATION: &str = "test_notification";
/// Category name for session status events.
pub const CONNECTION: &str = "connection";

/// Subscription key for the listener registry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// Session status changes (connected, disconnected, failed, ...)
    Connection,
    ScheduledPostReminder,
    ScheduledPostStatus,
    TestNotification,
    /// Unrecognized discriminator, kept verbatim
    Other(String),
}

impl EventCategory {
    /// Map a frame's `type` field to a category.
    ///
    /// Never yields `Connection`: that category is only written by the session,
    /// a frame typed `"connection"` lands in `Other`.
    pub fn from_type(kind: &str) -> Self {
        match kind {
            SCHEDULED_POST_REMINDER => EventCategory::ScheduledPostReminder,
            SCHEDULED_POST_STATUS => EventCategory::ScheduledPostStatus,
            TEST_NOTIFICATION => EventCategory::TestNotification,
            other => EventCategory::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventCategory::Connection => CONNECTION,
            EventCategory::ScheduledPostReminder => SCHEDULED_POST_REMINDER,
            EventCategory::ScheduledPostStatus => SCHEDULED_POST_STATUS,
            EventCategory::TestNotification => TEST_NOTIFICATION,
            EventCategory::Other(kind) => kind,
        }
    }

    /// The three notification categories the server is known to send.
    pub fn known_notifications() -> [EventCategory; 3] {
        [
            EventCategory::ScheduledPostReminder,
            EventCategory::ScheduledPostStatus,
            EventCategory::TestNotification,
        ]
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presentation class of a classified notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Reminder,
    Success,
    Failure,
    Info,
    Unknown,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Reminder => "reminder",
            NotificationKind::Success => "success",
            NotificationKind::Failure => "failure",
            NotificationKind::Info => "info",
            NotificationKind::Unknown => "unknown",
        }
    }

    /// Title shown on the native notification.
    pub fn title(&self) -> &'static str {
        match self {
            NotificationKind::Reminder => "Scheduled Post Reminder",
            NotificationKind::Success => "Post Published Successfully!",
            NotificationKind::Failure => "Post Publication Failed",
            NotificationKind::Info => "WebSocket Test",
            NotificationKind::Unknown => "Notification",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            NotificationKind::Reminder => "⏰",
            NotificationKind::Success => "✅",
            NotificationKind::Failure => "❌",
            NotificationKind::Info | NotificationKind::Unknown => "ℹ️",
        }
    }

    /// Tag used by hosts to coalesce notifications of the same kind.
    pub fn tag(&self) -> String {
        format!("scheduled-post-{}", self.as_str())
    }

    /// Failures stay on screen until the user dismisses them.
    pub fn is_persistent(&self) -> bool {
        matches!(self, NotificationKind::Failure)
    }

    /// Unknown notifications are published but never rendered.
    pub fn is_renderable(&self) -> bool {
        !matches!(self, NotificationKind::Unknown)
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
