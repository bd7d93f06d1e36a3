//! 通知收件箱 - 内存中的最近通知列表与未读计数
//!
//! 最新的在前，超过容量时丢弃最旧的。通过 [`NotificationInbox::attach`]
//! 订阅注册表中的已知通知分类。

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::category::{EventCategory, NotificationKind};
use super::classifier::{classify, ClassifiedNotification};
use super::payload::Notification;
use super::registry::{ListenerRegistry, SubscriptionId};

/// 默认容量
pub const DEFAULT_INBOX_CAPACITY: usize = 100;

/// 收件箱条目
#[derive(Debug, Clone, Serialize)]
pub struct InboxEntry {
    pub id: u64,
    pub received_at: DateTime<Utc>,
    pub category: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub payload: Value,
}

/// 通知收件箱
pub struct NotificationInbox {
    capacity: usize,
    next_id: AtomicU64,
    entries: Mutex<VecDeque<InboxEntry>>,
}

impl NotificationInbox {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INBOX_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// 订阅所有已知通知分类，返回订阅句柄
    pub fn attach(self: &Arc<Self>, registry: &ListenerRegistry) -> Vec<SubscriptionId> {
        EventCategory::known_notifications()
            .into_iter()
            .map(|category| {
                let inbox = Arc::clone(self);
                registry.subscribe(category, move |event| {
                    if let Some(notification) = event.as_notification() {
                        inbox.record(notification, &classify(notification));
                    }
                })
            })
            .collect()
    }

    /// 记录一条通知，返回条目 id
    pub fn record(&self, notification: &Notification, classified: &ClassifiedNotification) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = InboxEntry {
            id,
            received_at: Utc::now(),
            category: notification.kind().to_string(),
            kind: classified.kind,
            title: classified.title.clone(),
            message: classified.message.clone(),
            read: false,
            payload: notification.to_value(),
        };

        let mut entries = self.lock();
        entries.push_front(entry);
        entries.truncate(self.capacity);
        debug!(entry = id, kind = %classified.kind, total = entries.len(), "Notification added to inbox");
        id
    }

    /// 所有条目（最新的在前）
    pub fn entries(&self) -> Vec<InboxEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.lock().iter().filter(|e| !e.read).count()
    }

    /// 标记已读，条目不存在时返回 false
    pub fn mark_read(&self, id: u64) -> bool {
        match self.lock().iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&self) {
        for entry in self.lock().iter_mut() {
            entry.read = true;
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<InboxEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for NotificationInbox {
    fn default() -> Self {
        Self::new()
    }
}
