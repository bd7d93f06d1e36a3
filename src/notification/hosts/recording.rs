//! 内存宿主 - 记录所有调用，供测试和嵌入方断言展示行为

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::notification::host::{
    ClickHandler, DisplayId, DisplayRequest, NotificationHost, Permission,
};

/// 记录型宿主
pub struct RecordingHost {
    permission: Mutex<Permission>,
    grant_on_request: bool,
    fail_show: bool,
    next_id: AtomicU64,
    shown: Mutex<Vec<(DisplayId, DisplayRequest)>>,
    dismissed: Mutex<Vec<DisplayId>>,
    focus_count: AtomicUsize,
    permission_requests: AtomicUsize,
    click_handler: Mutex<Option<ClickHandler>>,
}

impl RecordingHost {
    pub fn new(permission: Permission) -> Self {
        Self {
            permission: Mutex::new(permission),
            grant_on_request: false,
            fail_show: false,
            next_id: AtomicU64::new(1),
            shown: Mutex::new(Vec::new()),
            dismissed: Mutex::new(Vec::new()),
            focus_count: AtomicUsize::new(0),
            permission_requests: AtomicUsize::new(0),
            click_handler: Mutex::new(None),
        }
    }

    /// 申请权限时是否授权
    pub fn grant_on_request(mut self, grant: bool) -> Self {
        self.grant_on_request = grant;
        self
    }

    /// 让 `show` 返回错误
    pub fn fail_show(mut self, fail: bool) -> Self {
        self.fail_show = fail;
        self
    }

    /// 模拟用户点击
    pub fn click(&self, id: DisplayId) {
        let handler = self.click_handler.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(handler) = handler {
            handler(id);
        }
    }

    pub fn shown(&self) -> Vec<(DisplayId, DisplayRequest)> {
        self.shown.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn dismissed(&self) -> Vec<DisplayId> {
        self.dismissed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn focus_count(&self) -> usize {
        self.focus_count.load(Ordering::SeqCst)
    }

    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationHost for RecordingHost {
    fn name(&self) -> &str {
        "recording"
    }

    fn permission(&self) -> Permission {
        *self.permission.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn request_permission(&self) -> Permission {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        let granted = if self.grant_on_request {
            Permission::Granted
        } else {
            Permission::Denied
        };
        *self.permission.lock().unwrap_or_else(|e| e.into_inner()) = granted;
        granted
    }

    fn show(&self, request: &DisplayRequest) -> Result<DisplayId> {
        if self.fail_show {
            return Err(anyhow!("display rejected by host"));
        }
        let id = DisplayId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.shown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, request.clone()));
        Ok(id)
    }

    fn dismiss(&self, id: DisplayId) {
        self.dismissed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(id);
    }

    fn focus_application(&self) {
        self.focus_count.fetch_add(1, Ordering::SeqCst);
    }

    fn set_click_handler(&self, handler: ClickHandler) {
        *self.click_handler.lock().unwrap_or_else(|e| e.into_inner()) = Some(handler);
    }
}
