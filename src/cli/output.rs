//! Output formatting for CLI commands

use serde::Serialize;

use crate::notification::{classify, ConnectionEvent, Event};

/// Format output as pretty JSON
pub fn format_output<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

/// One line per event, JSON or human-readable
pub fn format_event(event: &Event, json: bool) -> String {
    if json {
        return event.to_json().to_string();
    }
    match event {
        Event::Connection(connection) => format!("[connection] {}", describe_connection(connection)),
        Event::Notification(notification) => {
            let classified = classify(notification);
            format!(
                "[{}] {} {}: {}",
                notification.kind(),
                classified.kind.icon(),
                classified.title,
                classified.message
            )
        }
    }
}

fn describe_connection(event: &ConnectionEvent) -> String {
    match event {
        ConnectionEvent::Connected => "connected".to_string(),
        ConnectionEvent::Disconnected { code, reason } if reason.is_empty() => {
            format!("disconnected ({code})")
        }
        ConnectionEvent::Disconnected { code, reason } => format!("disconnected ({code} {reason})"),
        ConnectionEvent::Error { error } => format!("error: {error}"),
        ConnectionEvent::Reconnecting {
            attempt,
            max_attempts,
            delay_ms,
        } => format!("reconnecting {attempt}/{max_attempts} in {delay_ms}ms"),
        ConnectionEvent::Failed { reason } => format!("failed: {reason}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Notification;
    use std::sync::Arc;

    #[test]
    fn test_format_connection_events() {
        let event = Event::Connection(ConnectionEvent::Reconnecting {
            attempt: 2,
            max_attempts: 5,
            delay_ms: 2000,
        });
        assert_eq!(format_event(&event, false), "[connection] reconnecting 2/5 in 2000ms");

        let event = Event::Connection(ConnectionEvent::Disconnected {
            code: 1006,
            reason: String::new(),
        });
        assert_eq!(format_event(&event, false), "[connection] disconnected (1006)");
    }

    #[test]
    fn test_format_notification() {
        let n = Notification::from_frame(
            r#"{"type":"scheduled_post_status","status":"success","message":"Posted!"}"#,
        )
        .unwrap();
        let line = format_event(&Event::Notification(Arc::new(n)), false);
        assert_eq!(
            line,
            "[scheduled_post_status] ✅ Post Published Successfully!: Posted!"
        );
    }

    #[test]
    fn test_format_json() {
        let event = Event::Connection(ConnectionEvent::Connected);
        let line = format_event(&event, true);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "connection");
        assert_eq!(value["data"]["status"], "connected");
    }
}
