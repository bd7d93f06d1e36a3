//! 桌面宿主 - 通过系统命令弹出原生通知
//!
//! - Linux: `notify-send --print-id --wait`，点击通过 `default` action 回传，
//!   关闭通过 gdbus 调用 `org.freedesktop.Notifications.CloseNotification`
//! - macOS: `osascript display notification`（不支持点击与关闭）

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::notification::host::{
    ClickHandler, DisplayId, DisplayRequest, NotificationHost, Permission,
};

const DEFAULT_APP_NAME: &str = "realtime-notify";

#[derive(Debug, Clone)]
enum Backend {
    NotifySend(PathBuf),
    Osascript(PathBuf),
}

/// 桌面宿主
pub struct DesktopHost {
    app_name: String,
    backend: Option<Backend>,
    focus_command: Option<Vec<String>>,
    next_id: AtomicU64,
    /// DisplayId -> 通知服务返回的 id
    server_ids: Arc<Mutex<HashMap<DisplayId, u32>>>,
    click_handler: Arc<Mutex<Option<ClickHandler>>>,
}

impl DesktopHost {
    /// 自动检测可用的通知命令
    pub fn detect() -> Self {
        let backend = if cfg!(target_os = "macos") {
            which::which("osascript").ok().map(Backend::Osascript)
        } else {
            which::which("notify-send").ok().map(Backend::NotifySend)
        };

        match &backend {
            Some(b) => info!(backend = ?b, "Desktop notification backend detected"),
            None => warn!("No desktop notification command found, native notifications disabled"),
        }

        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            backend,
            focus_command: None,
            next_id: AtomicU64::new(1),
            server_ids: Arc::new(Mutex::new(HashMap::new())),
            click_handler: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// 点击通知后执行的命令（例如 `wmctrl -a MyApp`）
    pub fn with_focus_command(mut self, command: Option<Vec<String>>) -> Self {
        self.focus_command = command.filter(|c| !c.is_empty());
        self
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    fn show_notify_send(&self, cmd: &PathBuf, id: DisplayId, request: &DisplayRequest) -> Result<()> {
        let mut child = Command::new(cmd)
            .args(notify_send_args(&self.app_name, request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("notify-send stdout unavailable"))?;
        let server_ids = self.server_ids.clone();
        let click_handler = self.click_handler.clone();

        // --wait 会阻塞到通知关闭，单独线程读取输出
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                match parse_notify_send_line(&line) {
                    Some(NotifySendLine::ServerId(server_id)) => {
                        lock(&server_ids).insert(id, server_id);
                    }
                    Some(NotifySendLine::Clicked) => {
                        let handler = lock(&click_handler).clone();
                        if let Some(handler) = handler {
                            handler(id);
                        }
                    }
                    None => {}
                }
            }
            lock(&server_ids).remove(&id);
            let _ = child.wait();
        });
        Ok(())
    }

    fn show_osascript(&self, cmd: &PathBuf, request: &DisplayRequest) -> Result<()> {
        let script = format!(
            "display notification \"{}\" with title \"{}\"",
            escape_applescript(&request.body),
            escape_applescript(&format!("{} {}", request.icon, request.title)),
        );
        spawn_detached(Command::new(cmd).args(["-e", &script]), "osascript")?;
        Ok(())
    }
}

#[async_trait]
impl NotificationHost for DesktopHost {
    fn name(&self) -> &str {
        match self.backend {
            Some(Backend::NotifySend(_)) => "notify-send",
            Some(Backend::Osascript(_)) => "osascript",
            None => "desktop",
        }
    }

    fn permission(&self) -> Permission {
        if self.backend.is_some() {
            Permission::Granted
        } else {
            Permission::Unsupported
        }
    }

    async fn request_permission(&self) -> Permission {
        self.permission()
    }

    fn show(&self, request: &DisplayRequest) -> Result<DisplayId> {
        let id = DisplayId(self.next_id.fetch_add(1, Ordering::Relaxed));
        match &self.backend {
            Some(Backend::NotifySend(cmd)) => self.show_notify_send(cmd, id, request)?,
            Some(Backend::Osascript(cmd)) => self.show_osascript(cmd, request)?,
            None => return Err(anyhow!("no desktop notification backend")),
        }
        Ok(id)
    }

    fn dismiss(&self, id: DisplayId) {
        let Some(server_id) = lock(&self.server_ids).remove(&id) else {
            return;
        };
        let result = spawn_detached(
            Command::new("gdbus").args([
                "call",
                "--session",
                "--dest",
                "org.freedesktop.Notifications",
                "--object-path",
                "/org/freedesktop/Notifications",
                "--method",
                "org.freedesktop.Notifications.CloseNotification",
                &server_id.to_string(),
            ]),
            "gdbus",
        );
        if let Err(e) = result {
            debug!(display_id = id.0, error = %e, "Failed to close desktop notification");
        }
    }

    fn focus_application(&self) {
        let Some((program, args)) = self.focus_command.as_ref().and_then(|c| c.split_first()) else {
            return;
        };
        if let Err(e) = spawn_detached(Command::new(program).args(args), "focus command") {
            warn!(command = %program, error = %e, "Failed to run focus command");
        }
    }

    fn set_click_handler(&self, handler: ClickHandler) {
        *lock(&self.click_handler) = Some(handler);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// 启动命令后立即返回，退出状态在后台线程里回收并记录
fn spawn_detached(command: &mut Command, label: &'static str) -> std::io::Result<()> {
    let child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;
    std::thread::spawn(move || match child.wait_with_output() {
        Ok(output) if !output.status.success() => warn!(
            command = label,
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "Notification command failed"
        ),
        Ok(_) => {}
        Err(e) => debug!(command = label, error = %e, "Failed to wait for notification command"),
    });
    Ok(())
}

fn notify_send_args(app_name: &str, request: &DisplayRequest) -> Vec<String> {
    let urgency = if request.require_interaction {
        "critical"
    } else {
        "normal"
    };
    vec![
        format!("--app-name={app_name}"),
        format!("--urgency={urgency}"),
        "--print-id".to_string(),
        "--wait".to_string(),
        "--action=default=Open".to_string(),
        format!("--hint=string:x-canonical-private-synchronous:{}", request.tag),
        format!("{} {}", request.icon, request.title),
        request.body.clone(),
    ]
}

#[derive(Debug, PartialEq, Eq)]
enum NotifySendLine {
    ServerId(u32),
    Clicked,
}

fn parse_notify_send_line(line: &str) -> Option<NotifySendLine> {
    let line = line.trim();
    if line == "default" {
        return Some(NotifySendLine::Clicked);
    }
    line.parse().ok().map(NotifySendLine::ServerId)
}

fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::category::NotificationKind;

    fn request(kind: NotificationKind) -> DisplayRequest {
        DisplayRequest {
            kind,
            title: kind.title().to_string(),
            body: "Your post is live".to_string(),
            icon: kind.icon().to_string(),
            tag: kind.tag(),
            require_interaction: kind.is_persistent(),
        }
    }

    #[test]
    fn test_notify_send_args_failure_is_critical() {
        let args = notify_send_args("rtn", &request(NotificationKind::Failure));
        assert!(args.contains(&"--urgency=critical".to_string()));
        assert!(args.contains(&"--app-name=rtn".to_string()));
        assert!(args
            .iter()
            .any(|a| a.ends_with("x-canonical-private-synchronous:scheduled-post-failure")));
        assert_eq!(args.last().map(String::as_str), Some("Your post is live"));
    }

    #[test]
    fn test_notify_send_args_success_is_normal() {
        let args = notify_send_args("rtn", &request(NotificationKind::Success));
        assert!(args.contains(&"--urgency=normal".to_string()));
    }

    #[test]
    fn test_parse_notify_send_line() {
        assert_eq!(parse_notify_send_line("42"), Some(NotifySendLine::ServerId(42)));
        assert_eq!(parse_notify_send_line("default\n"), Some(NotifySendLine::Clicked));
        assert_eq!(parse_notify_send_line("something"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_detached_does_not_wait_for_exit() {
        let start = std::time::Instant::now();
        spawn_detached(Command::new("sh").args(["-c", "sleep 3"]), "sleep").unwrap();
        assert!(start.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn test_spawn_detached_reports_missing_program() {
        let result = spawn_detached(&mut Command::new("rtn-no-such-command"), "missing");
        assert!(result.is_err());
    }

    #[test]
    fn test_escape_applescript() {
        assert_eq!(escape_applescript(r#"say "hi" \o/"#), r#"say \"hi\" \\o/"#);
    }

    #[test]
    fn test_host_without_backend_is_unsupported() {
        let host = DesktopHost {
            app_name: DEFAULT_APP_NAME.to_string(),
            backend: None,
            focus_command: None,
            next_id: AtomicU64::new(1),
            server_ids: Arc::new(Mutex::new(HashMap::new())),
            click_handler: Arc::new(Mutex::new(None)),
        };
        assert_eq!(host.permission(), Permission::Unsupported);
        assert!(host.show(&request(NotificationKind::Info)).is_err());
    }
}
