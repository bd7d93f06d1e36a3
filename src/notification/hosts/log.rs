//! 日志宿主 - 无桌面环境时把通知写进日志

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use crate::notification::host::{DisplayId, DisplayRequest, NotificationHost, Permission};

/// 日志宿主（headless 模式）
pub struct LogHost {
    next_id: AtomicU64,
}

impl LogHost {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for LogHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationHost for LogHost {
    fn name(&self) -> &str {
        "log"
    }

    fn permission(&self) -> Permission {
        Permission::Granted
    }

    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn show(&self, request: &DisplayRequest) -> Result<DisplayId> {
        let id = DisplayId(self.next_id.fetch_add(1, Ordering::Relaxed));
        info!(
            display_id = id.0,
            tag = %request.tag,
            persistent = request.require_interaction,
            "{} {}: {}",
            request.icon,
            request.title,
            request.body
        );
        Ok(id)
    }

    fn dismiss(&self, id: DisplayId) {
        debug!(display_id = id.0, "Notification dismissed");
    }

    fn focus_application(&self) {}
}
