//! 监听器注册表 - 按分类管理订阅者并扇出事件
//!
//! 每个回调独立执行：某个回调 panic 只会被记录，不影响同一事件的其他回调，
//! 也不会影响传输层。分发时不持有锁，回调内部可以安全地订阅/取消订阅。

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use super::category::EventCategory;
use super::event::Event;

/// 订阅回调
pub type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

/// 订阅句柄，用于取消订阅
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct Listeners {
    by_category: HashMap<EventCategory, Vec<(SubscriptionId, Callback)>>,
    index: HashMap<SubscriptionId, EventCategory>,
}

/// 监听器注册表
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Listeners>,
}

impl ListenerRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Listeners::default()),
        }
    }

    /// 注册回调
    pub fn subscribe<F>(&self, category: EventCategory, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.lock();
        listeners
            .by_category
            .entry(category.clone())
            .or_default()
            .push((id, Arc::new(callback)));
        listeners.index.insert(id, category.clone());
        debug!(category = %category, subscription = id.0, "Listener registered");
        id
    }

    /// 取消订阅，返回句柄是否仍然有效
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let Some(category) = listeners.index.remove(&id) else {
            return false;
        };
        if let Some(entries) = listeners.by_category.get_mut(&category) {
            entries.retain(|(entry_id, _)| *entry_id != id);
            if entries.is_empty() {
                listeners.by_category.remove(&category);
            }
        }
        debug!(category = %category, subscription = id.0, "Listener removed");
        true
    }

    /// 把事件分发给该分类下的所有回调，返回成功执行的回调数
    pub fn publish(&self, event: &Event) -> usize {
        let category = event.category();
        let snapshot: Vec<(SubscriptionId, Callback)> = self
            .lock()
            .by_category
            .get(&category)
            .map(|entries| entries.to_vec())
            .unwrap_or_default();

        let mut delivered = 0;
        for (id, callback) in snapshot {
            // 前面的回调可能已经取消了这个订阅
            if !self.is_subscribed(id) {
                continue;
            }
            match panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    warn!(
                        category = %category,
                        subscription = id.0,
                        error = %panic_message(payload.as_ref()),
                        "Listener panicked while handling event"
                    );
                }
            }
        }
        delivered
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.lock().index.contains_key(&id)
    }

    /// 某分类下的订阅数
    pub fn listener_count(&self, category: &EventCategory) -> usize {
        self.lock()
            .by_category
            .get(category)
            .map_or(0, |entries| entries.len())
    }

    /// 订阅总数
    pub fn total_listeners(&self) -> usize {
        self.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_listeners() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Listeners> {
        // 回调在锁外执行，锁内代码不会 panic；保险起见忽略 poison
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
