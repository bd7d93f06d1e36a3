//! 原生通知展示器 - 按分类策略把通知交给宿主弹出
//!
//! 展示策略：
//! - failure 常驻，必须用户手动关闭
//! - 其他类别在 `auto_dismiss` 之后自动关闭
//! - 点击通知：切到前台并关闭该通知
//!
//! 权限未决定时在后台申请，授权后补弹一次；拒绝或不支持时静默跳过。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::category::NotificationKind;
use super::classifier::ClassifiedNotification;
use super::host::{DisplayId, DisplayRequest, NotificationHost, Permission};

/// 默认自动关闭时间
pub const DEFAULT_AUTO_DISMISS: Duration = Duration::from_secs(5);

/// 按类别开关原生通知
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayPreferences {
    pub reminder: bool,
    pub success: bool,
    pub failure: bool,
    pub info: bool,
}

impl Default for DisplayPreferences {
    fn default() -> Self {
        Self {
            reminder: true,
            success: true,
            failure: true,
            info: true,
        }
    }
}

impl DisplayPreferences {
    pub fn allows(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::Reminder => self.reminder,
            NotificationKind::Success => self.success,
            NotificationKind::Failure => self.failure,
            NotificationKind::Info => self.info,
            NotificationKind::Unknown => false,
        }
    }
}

/// 展示器配置
#[derive(Debug, Clone)]
pub struct PresenterConfig {
    /// 非常驻通知的自动关闭时间
    pub auto_dismiss: Duration,
    pub preferences: DisplayPreferences,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            auto_dismiss: DEFAULT_AUTO_DISMISS,
            preferences: DisplayPreferences::default(),
        }
    }
}

/// 展示结果
#[derive(Debug, Clone, PartialEq)]
pub enum PresentOutcome {
    /// 已弹出
    Rendered(DisplayId),
    /// 已在后台申请权限，授权后补弹
    PermissionRequested,
    /// 跳过（原因）
    Skipped(String),
    /// 宿主弹出失败
    Failed(String),
}

struct PresenterInner {
    host: Arc<dyn NotificationHost>,
    config: PresenterConfig,
    dismiss_timers: Mutex<HashMap<DisplayId, JoinHandle<()>>>,
}

/// 原生通知展示器
#[derive(Clone)]
pub struct NativePresenter {
    inner: Arc<PresenterInner>,
}

impl NativePresenter {
    pub fn new(host: Arc<dyn NotificationHost>, config: PresenterConfig) -> Self {
        let presenter = Self {
            inner: Arc::new(PresenterInner {
                host,
                config,
                dismiss_timers: Mutex::new(HashMap::new()),
            }),
        };

        // 宿主持有弱引用，避免循环引用
        let weak: Weak<PresenterInner> = Arc::downgrade(&presenter.inner);
        presenter.inner.host.set_click_handler(Arc::new(move |id| {
            if let Some(inner) = weak.upgrade() {
                NativePresenter { inner }.handle_click(id);
            }
        }));
        presenter
    }

    pub fn host_name(&self) -> &str {
        self.inner.host.name()
    }

    /// 展示一条已分类的通知
    pub fn present(&self, notification: &ClassifiedNotification) -> PresentOutcome {
        if !notification.kind.is_renderable() {
            return PresentOutcome::Skipped(format!("{} notifications are not rendered", notification.kind));
        }
        if !self.inner.config.preferences.allows(notification.kind) {
            debug!(kind = %notification.kind, "Native notification disabled by preferences");
            return PresentOutcome::Skipped(format!("{} disabled by preferences", notification.kind));
        }

        let request = display_request(notification);
        match self.inner.host.permission() {
            Permission::Granted => self.render(&request),
            Permission::Default => self.request_then_render(request),
            Permission::Denied => PresentOutcome::Skipped("permission denied".to_string()),
            Permission::Unsupported => {
                PresentOutcome::Skipped("host has no notification support".to_string())
            }
        }
    }

    /// 用户点击通知：切到前台并关闭
    pub fn handle_click(&self, id: DisplayId) {
        debug!(display_id = id.0, "Native notification clicked");
        self.inner.host.focus_application();
        self.dismiss(id);
    }

    /// 关闭通知，只取消它自己的自动关闭计时器
    pub fn dismiss(&self, id: DisplayId) {
        if let Some(timer) = self.timers().remove(&id) {
            timer.abort();
        }
        self.inner.host.dismiss(id);
    }

    /// 尚未触发的自动关闭计时器数量
    pub fn pending_dismissals(&self) -> usize {
        self.timers().len()
    }

    fn render(&self, request: &DisplayRequest) -> PresentOutcome {
        let id = match self.inner.host.show(request) {
            Ok(id) => id,
            Err(e) => {
                warn!(host = self.inner.host.name(), error = %e, "Failed to show native notification");
                return PresentOutcome::Failed(e.to_string());
            }
        };

        info!(
            host = self.inner.host.name(),
            kind = %request.kind,
            display_id = id.0,
            persistent = request.require_interaction,
            "Native notification shown"
        );

        if !request.require_interaction {
            self.schedule_dismiss(id);
        }
        PresentOutcome::Rendered(id)
    }

    fn request_then_render(&self, request: DisplayRequest) -> PresentOutcome {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available to request notification permission");
            return PresentOutcome::Skipped("no runtime for permission request".to_string());
        };

        let presenter = self.clone();
        runtime.spawn(async move {
            let permission = presenter.inner.host.request_permission().await;
            if permission == Permission::Granted {
                presenter.render(&request);
            } else {
                debug!(?permission, "Notification permission not granted");
            }
        });
        PresentOutcome::PermissionRequested
    }

    fn schedule_dismiss(&self, id: DisplayId) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(display_id = id.0, "No async runtime, notification will not auto-dismiss");
            return;
        };

        let delay = self.inner.config.auto_dismiss;
        // 持锁 spawn，保证计时器任务移除自身时句柄已插入
        let mut timers = self.timers();
        let presenter = self.clone();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            presenter.timers().remove(&id);
            presenter.inner.host.dismiss(id);
            debug!(display_id = id.0, "Native notification auto-dismissed");
        });
        timers.insert(id, handle);
    }

    fn timers(&self) -> MutexGuard<'_, HashMap<DisplayId, JoinHandle<()>>> {
        self.inner
            .dismiss_timers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

fn display_request(notification: &ClassifiedNotification) -> DisplayRequest {
    DisplayRequest {
        kind: notification.kind,
        title: notification.title.clone(),
        body: notification.message.clone(),
        icon: notification.kind.icon().to_string(),
        tag: notification.kind.tag(),
        require_interaction: notification.kind.is_persistent(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::category::EventCategory;
    use crate::notification::hosts::RecordingHost;

    fn classified(kind: NotificationKind, message: &str) -> ClassifiedNotification {
        ClassifiedNotification {
            kind,
            category: EventCategory::ScheduledPostStatus,
            title: kind.title().to_string(),
            message: message.to_string(),
        }
    }

    fn presenter(host: &Arc<RecordingHost>) -> NativePresenter {
        NativePresenter::new(host.clone(), PresenterConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_auto_dismisses() {
        let host = Arc::new(RecordingHost::new(Permission::Granted));
        let presenter = presenter(&host);

        let outcome = presenter.present(&classified(NotificationKind::Success, "Posted!"));
        let PresentOutcome::Rendered(id) = outcome else {
            panic!("expected render, got {outcome:?}");
        };

        let shown = host.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].1.body, "Posted!");
        assert!(!shown[0].1.require_interaction);
        assert_eq!(presenter.pending_dismissals(), 1);

        tokio::time::sleep(DEFAULT_AUTO_DISMISS + Duration::from_millis(10)).await;
        assert_eq!(host.dismissed(), vec![id]);
        assert_eq!(presenter.pending_dismissals(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_persistent() {
        let host = Arc::new(RecordingHost::new(Permission::Granted));
        let presenter = presenter(&host);

        presenter.present(&classified(NotificationKind::Failure, "Token expired"));
        assert!(host.shown()[0].1.require_interaction);
        assert_eq!(presenter.pending_dismissals(), 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(host.dismissed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_focuses_and_cancels_only_own_timer() {
        let host = Arc::new(RecordingHost::new(Permission::Granted));
        let presenter = presenter(&host);

        let PresentOutcome::Rendered(first) =
            presenter.present(&classified(NotificationKind::Info, "one"))
        else {
            panic!("expected render");
        };
        presenter.present(&classified(NotificationKind::Reminder, "two"));
        assert_eq!(presenter.pending_dismissals(), 2);

        host.click(first);
        assert_eq!(host.focus_count(), 1);
        assert_eq!(host.dismissed(), vec![first]);
        assert_eq!(presenter.pending_dismissals(), 1);

        tokio::time::sleep(DEFAULT_AUTO_DISMISS + Duration::from_millis(10)).await;
        // 第一条不会被再次关闭
        assert_eq!(host.dismissed().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_permission_requests_then_renders_once() {
        let host = Arc::new(RecordingHost::new(Permission::Default).grant_on_request(true));
        let presenter = presenter(&host);

        let outcome = presenter.present(&classified(NotificationKind::Success, "later"));
        assert_eq!(outcome, PresentOutcome::PermissionRequested);
        assert!(host.shown().is_empty());

        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(host.permission_requests(), 1);
        assert_eq!(host.shown().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_permission_denied_on_request() {
        let host = Arc::new(RecordingHost::new(Permission::Default).grant_on_request(false));
        let presenter = presenter(&host);

        presenter.present(&classified(NotificationKind::Success, "nope"));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(host.permission_requests(), 1);
        assert!(host.shown().is_empty());
    }

    #[tokio::test]
    async fn test_denied_and_unsupported_are_noops() {
        for permission in [Permission::Denied, Permission::Unsupported] {
            let host = Arc::new(RecordingHost::new(permission));
            let presenter = presenter(&host);
            let outcome = presenter.present(&classified(NotificationKind::Failure, "x"));
            assert!(matches!(outcome, PresentOutcome::Skipped(_)));
            assert!(host.shown().is_empty());
            assert_eq!(host.permission_requests(), 0);
        }
    }

    #[tokio::test]
    async fn test_unknown_and_disabled_kinds_skipped() {
        let host = Arc::new(RecordingHost::new(Permission::Granted));
        let presenter = NativePresenter::new(
            host.clone(),
            PresenterConfig {
                auto_dismiss: DEFAULT_AUTO_DISMISS,
                preferences: DisplayPreferences {
                    reminder: false,
                    ..DisplayPreferences::default()
                },
            },
        );

        assert!(matches!(
            presenter.present(&classified(NotificationKind::Unknown, "?")),
            PresentOutcome::Skipped(_)
        ));
        assert!(matches!(
            presenter.present(&classified(NotificationKind::Reminder, "soon")),
            PresentOutcome::Skipped(_)
        ));
        assert!(host.shown().is_empty());
    }

    #[tokio::test]
    async fn test_host_failure_reported() {
        let host = Arc::new(RecordingHost::new(Permission::Granted).fail_show(true));
        let presenter = presenter(&host);
        assert!(matches!(
            presenter.present(&classified(NotificationKind::Info, "x")),
            PresentOutcome::Failed(_)
        ));
    }
}
