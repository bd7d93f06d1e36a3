//! 宿主通知能力 trait 定义
//!
//! 展示器只通过这个 trait 访问宿主：查询/申请权限、弹出通知、关闭通知、
//! 把应用切到前台。具体实现见 `hosts` 模块。

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use super::category::NotificationKind;

/// 宿主通知权限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// 已授权
    Granted,
    /// 用户拒绝
    Denied,
    /// 尚未决定，可以申请
    Default,
    /// 宿主没有通知能力
    Unsupported,
}

/// 已弹出通知的句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DisplayId(pub u64);

/// 弹出通知请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayRequest {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub icon: String,
    /// 同类通知合并用的 tag
    pub tag: String,
    /// 需要用户手动关闭（不自动消失）
    pub require_interaction: bool,
}

/// 通知被点击时的回调
pub type ClickHandler = Arc<dyn Fn(DisplayId) + Send + Sync>;

/// 宿主通知能力
#[async_trait]
pub trait NotificationHost: Send + Sync {
    /// 宿主名称（用于日志）
    fn name(&self) -> &str;

    /// 当前权限
    fn permission(&self) -> Permission;

    /// 申请权限（不阻塞调用方，由展示器在后台任务中等待）
    async fn request_permission(&self) -> Permission;

    /// 弹出通知
    fn show(&self, request: &DisplayRequest) -> Result<DisplayId>;

    /// 关闭通知
    fn dismiss(&self, id: DisplayId);

    /// 把应用切到前台
    fn focus_application(&self);

    /// 注册点击回调；不能上报点击的宿主忽略即可
    fn set_click_handler(&self, _handler: ClickHandler) {}
}
