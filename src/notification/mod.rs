//! 通知层 - 入站通知的解析、分类、展示与分发
//!
//! # 数据流
//! 1. `payload`：把 WebSocket 文本帧解析成 [`Notification`]
//! 2. `classifier`：按 `type` 得到展示类别与文案
//! 3. `presenter`：交给宿主弹出原生通知（权限、自动关闭、点击）
//! 4. `registry`：按分类扇出给订阅者，回调互相隔离
//!
//! # 使用示例
//! ```ignore
//! use realtime_notify::notification::{ListenerRegistry, EventCategory};
//!
//! let registry = ListenerRegistry::new();
//! let id = registry.subscribe(EventCategory::ScheduledPostStatus, |event| {
//!     println!("{:?}", event);
//! });
//! registry.unsubscribe(id);
//! ```

pub mod category;
pub mod classifier;
pub mod event;
pub mod host;
pub mod hosts;
pub mod inbox;
pub mod payload;
pub mod presenter;
pub mod registry;

pub use category::{EventCategory, NotificationKind};
pub use classifier::{classify, msg, ClassifiedNotification};
pub use event::{ConnectionEvent, Event};
pub use host::{ClickHandler, DisplayId, DisplayRequest, NotificationHost, Permission};
pub use hosts::{DesktopHost, LogHost, RecordingHost};
pub use inbox::{InboxEntry, NotificationInbox};
pub use payload::Notification;
pub use presenter::{DisplayPreferences, NativePresenter, PresentOutcome, PresenterConfig};
pub use registry::{Callback, ListenerRegistry, SubscriptionId};
