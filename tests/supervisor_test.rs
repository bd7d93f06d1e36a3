//! 监督者测试 - 对外操作、通知展示和 token 变化

use realtime_notify::notification::{
    ConnectionEvent, EventCategory, NotificationInbox, NotificationKind, Permission,
    RecordingHost,
};
use realtime_notify::session::{
    ConnectionState, Credential, RetryPolicy, ScriptedConnector, ServerEndpoint,
    DEFAULT_NOTIFICATIONS_PATH,
};
use realtime_notify::supervisor::{
    SessionSupervisor, SharedToken, StaticTokenProvider, SupervisorBuilder,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn builder(connector: &Arc<ScriptedConnector>, token: Option<&str>) -> SupervisorBuilder {
    let endpoint = ServerEndpoint::parse("https://api.example.com", DEFAULT_NOTIFICATIONS_PATH).unwrap();
    SessionSupervisor::builder(endpoint)
        .connector(connector.clone())
        .token_provider(Arc::new(StaticTokenProvider::new(token.and_then(Credential::new))))
        .health_check_interval(None)
}

async fn wait_for_state(supervisor: &SessionSupervisor, state: ConnectionState) {
    let mut rx = supervisor.watch().expect("supervisor initialized");
    rx.wait_for(|s| s.state == state).await.unwrap();
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn test_init_connects_with_provider_token() {
    let connector = Arc::new(ScriptedConnector::new());
    connector.accept();
    let supervisor = builder(&connector, Some("abc")).build();

    assert_eq!(supervisor.status(), ConnectionState::Disconnected);
    supervisor.init();
    supervisor.init();
    wait_for_state(&supervisor, ConnectionState::Connected).await;

    assert!(supervisor.is_connected());
    assert_eq!(connector.open_count(), 1);
    assert_eq!(
        connector.opened_urls()[0].as_str(),
        "wss://api.example.com/ws/notifications?token=abc"
    );
}

#[tokio::test(start_paused = true)]
async fn test_ensure_connected_is_noop_while_connected() {
    let connector = Arc::new(ScriptedConnector::new());
    connector.accept();
    let supervisor = builder(&connector, Some("abc")).build();
    supervisor.init();
    wait_for_state(&supervisor, ConnectionState::Connected).await;

    for _ in 0..5 {
        supervisor.ensure_connected();
    }
    settle().await;
    assert_eq!(connector.open_count(), 1);
    assert!(supervisor.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_ensure_connected_reconnects_before_timer() {
    let connector = Arc::new(ScriptedConnector::new());
    let server = connector.accept();
    connector.accept();
    let supervisor = builder(&connector, Some("abc")).build();
    supervisor.init();
    wait_for_state(&supervisor, ConnectionState::Connected).await;

    server.close(1006, "network lost");
    let mut rx = supervisor.watch().unwrap();
    rx.wait_for(|s| s.pending_retry_ms.is_some()).await.unwrap();

    supervisor.ensure_connected();
    settle().await;
    assert!(supervisor.is_connected());
    assert_eq!(connector.open_count(), 2);
    assert_eq!(supervisor.snapshot().pending_retry_ms, None);
}

#[tokio::test(start_paused = true)]
async fn test_missing_credential_is_silent_noop() {
    let connector = Arc::new(ScriptedConnector::new());
    let supervisor = builder(&connector, None).build();
    supervisor.init();

    supervisor.connect(None);
    supervisor.ensure_connected();
    supervisor.force_reconnect();
    settle().await;

    assert_eq!(connector.open_count(), 0);
    assert_eq!(supervisor.status(), ConnectionState::Disconnected);
    assert!(!supervisor.has_credential());
}

#[tokio::test(start_paused = true)]
async fn test_operations_before_init_are_ignored() {
    let connector = Arc::new(ScriptedConnector::new());
    let supervisor = builder(&connector, Some("abc")).build();

    supervisor.connect(Credential::new("abc"));
    supervisor.ensure_connected();
    supervisor.disconnect();
    settle().await;

    assert_eq!(connector.open_count(), 0);
    assert!(supervisor.watch().is_none());
    assert!(!supervisor.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_drops_credential() {
    let connector = Arc::new(ScriptedConnector::new());
    let server = connector.accept();
    let supervisor = builder(&connector, Some("abc")).build();
    supervisor.init();
    wait_for_state(&supervisor, ConnectionState::Connected).await;

    supervisor.disconnect();
    wait_for_state(&supervisor, ConnectionState::Disconnected).await;
    assert!(!supervisor.has_credential());
    assert_eq!(server.client_close(), Some((1000, "User disconnected".to_string())));

    supervisor.ensure_connected();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(connector.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_success_status_renders_auto_dismissing_notification() {
    let connector = Arc::new(ScriptedConnector::new());
    let server = connector.accept();
    let host = Arc::new(RecordingHost::new(Permission::Granted));
    let supervisor = builder(&connector, Some("abc"))
        .notification_host(host.clone())
        .build();

    let payloads = Arc::new(Mutex::new(Vec::new()));
    let sink = payloads.clone();
    supervisor.subscribe(EventCategory::ScheduledPostStatus, move |event| {
        if let Some(n) = event.as_notification() {
            sink.lock().unwrap().push(n.to_value());
        }
    });

    supervisor.init();
    wait_for_state(&supervisor, ConnectionState::Connected).await;
    server.send_frame(r#"{"type":"scheduled_post_status","status":"success","message":"Posted!"}"#);
    settle().await;

    let shown = host.shown();
    assert_eq!(shown.len(), 1);
    let (id, request) = &shown[0];
    assert_eq!(request.kind, NotificationKind::Success);
    assert_eq!(request.title, "Post Published Successfully!");
    assert_eq!(request.body, "Posted!");
    assert_eq!(request.tag, "scheduled-post-success");
    assert!(!request.require_interaction);

    assert_eq!(
        *payloads.lock().unwrap(),
        vec![json!({"type": "scheduled_post_status", "status": "success", "message": "Posted!"})]
    );

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(host.dismissed(), vec![*id]);
}

#[tokio::test(start_paused = true)]
async fn test_failure_status_renders_persistent_notification() {
    let connector = Arc::new(ScriptedConnector::new());
    let server = connector.accept();
    let host = Arc::new(RecordingHost::new(Permission::Granted));
    let supervisor = builder(&connector, Some("abc"))
        .notification_host(host.clone())
        .build();
    supervisor.init();
    wait_for_state(&supervisor, ConnectionState::Connected).await;

    server.send_frame(r#"{"type":"scheduled_post_status","status":"failure","message":"Token expired"}"#);
    settle().await;

    let shown = host.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].1.kind, NotificationKind::Failure);
    assert_eq!(shown[0].1.body, "Token expired");
    assert!(shown[0].1.require_interaction);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(host.dismissed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_type_published_but_not_rendered() {
    let connector = Arc::new(ScriptedConnector::new());
    let server = connector.accept();
    let host = Arc::new(RecordingHost::new(Permission::Granted));
    let supervisor = builder(&connector, Some("abc"))
        .notification_host(host.clone())
        .build();
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    supervisor.subscribe(EventCategory::Other("weekly_digest".into()), move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });

    supervisor.init();
    wait_for_state(&supervisor, ConnectionState::Connected).await;
    server.send_frame(r#"{"type":"weekly_digest","posts":3}"#);
    settle().await;

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(host.shown().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_panicking_subscriber_does_not_affect_session() {
    let connector = Arc::new(ScriptedConnector::new());
    let server = connector.accept();
    let supervisor = builder(&connector, Some("abc")).build();

    supervisor.subscribe(EventCategory::TestNotification, |_| panic!("subscriber bug"));
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    supervisor.subscribe(EventCategory::TestNotification, move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });

    supervisor.init();
    wait_for_state(&supervisor, ConnectionState::Connected).await;
    server.send_frame(r#"{"type":"test_notification"}"#);
    server.send_frame(r#"{"type":"test_notification","message":"again"}"#);
    settle().await;

    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert!(supervisor.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_inbox_collects_notifications() {
    let connector = Arc::new(ScriptedConnector::new());
    let server = connector.accept();
    let supervisor = builder(&connector, Some("abc")).build();
    let inbox = Arc::new(NotificationInbox::new());
    inbox.attach(&supervisor.registry());

    supervisor.init();
    wait_for_state(&supervisor, ConnectionState::Connected).await;
    server.send_frame(r#"{"type":"scheduled_post_reminder","prompt":"Launch day","minutes_until":15}"#);
    server.send_frame(r#"{"type":"test_notification"}"#);
    settle().await;

    let entries = inbox.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].kind, NotificationKind::Info);
    assert_eq!(entries[1].kind, NotificationKind::Reminder);
    assert_eq!(
        entries[1].message,
        "Your post \"Launch day\" will be published in 15 minutes"
    );
    assert_eq!(inbox.unread_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_token_change_reconnects_and_logout_disconnects() {
    let connector = Arc::new(ScriptedConnector::new());
    let first = connector.accept();
    connector.accept();
    let token = SharedToken::new(Credential::new("old"));
    let endpoint = ServerEndpoint::parse("http://localhost:8000", DEFAULT_NOTIFICATIONS_PATH).unwrap();
    let supervisor = SessionSupervisor::builder(endpoint)
        .connector(connector.clone())
        .token_provider(Arc::new(token.clone()))
        .health_check_interval(None)
        .build();

    supervisor.init();
    wait_for_state(&supervisor, ConnectionState::Connected).await;

    token.login(Credential::new("new").unwrap());
    while connector.open_count() < 2 {
        settle().await;
    }
    wait_for_state(&supervisor, ConnectionState::Connected).await;
    assert!(first.client_close().is_some());
    assert!(connector.opened_urls()[1].as_str().ends_with("token=new"));

    token.logout();
    wait_for_state(&supervisor, ConnectionState::Disconnected).await;
    assert!(!supervisor.has_credential());
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.open_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_health_check_leaves_backoff_and_failed_alone() {
    let connector = Arc::new(ScriptedConnector::new());
    let supervisor = builder(&connector, Some("abc"))
        .retry_policy(RetryPolicy::new(Duration::from_secs(20), 2.0, 1))
        .health_check_interval(Some(Duration::from_secs(5)))
        .build();

    supervisor.init();
    let mut rx = supervisor.watch().unwrap();
    rx.wait_for(|s| s.pending_retry_ms.is_some()).await.unwrap();

    // 健康检查不打断 20s 的退避
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(connector.open_count(), 1);

    wait_for_state(&supervisor, ConnectionState::Failed).await;
    assert_eq!(connector.open_count(), 2);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.open_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_health_check_skips_failed_session() {
    let connector = Arc::new(ScriptedConnector::new());
    let server = connector.accept();
    connector.accept();
    let supervisor = builder(&connector, Some("abc"))
        .retry_policy(RetryPolicy::new(Duration::from_secs(1), 2.0, 0))
        .stop_on_auth_rejection(false)
        .health_check_interval(Some(Duration::from_secs(5)))
        .build();

    supervisor.init();
    wait_for_state(&supervisor, ConnectionState::Connected).await;

    // 没有重连次数时，服务端关闭直接进入 Failed，健康检查不会救活
    server.close(1011, "restart");
    wait_for_state(&supervisor, ConnectionState::Failed).await;
    tokio::time::sleep(Duration::from_secs(12)).await;
    assert_eq!(connector.open_count(), 1);

    // 显式 connect 从头开始
    supervisor.connect(None);
    wait_for_state(&supervisor, ConnectionState::Connected).await;
    assert_eq!(connector.open_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_transport() {
    let connector = Arc::new(ScriptedConnector::new());
    let server = connector.accept();
    let supervisor = builder(&connector, Some("abc")).build();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    supervisor.subscribe(EventCategory::Connection, move |event| {
        if let Some(c) = event.as_connection() {
            sink.lock().unwrap().push(c.clone());
        }
    });

    supervisor.init();
    wait_for_state(&supervisor, ConnectionState::Connected).await;
    supervisor.shutdown().await;

    assert!(!supervisor.is_running());
    assert_eq!(supervisor.status(), ConnectionState::Disconnected);
    assert_eq!(server.client_close(), Some((1000, "Client shutdown".to_string())));
    assert_eq!(
        events.lock().unwrap().last(),
        Some(&ConnectionEvent::Disconnected {
            code: 1000,
            reason: "Client shutdown".to_string()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_supervisors_are_independent() {
    let first_connector = Arc::new(ScriptedConnector::new());
    let second_connector = Arc::new(ScriptedConnector::new());
    first_connector.accept();
    second_connector.accept();

    let first = builder(&first_connector, Some("a")).build();
    let second = builder(&second_connector, Some("b")).build();
    first.init();
    second.init();
    wait_for_state(&first, ConnectionState::Connected).await;
    wait_for_state(&second, ConnectionState::Connected).await;

    first.disconnect();
    wait_for_state(&first, ConnectionState::Disconnected).await;
    assert!(second.is_connected());
    assert_eq!(first.registry().total_listeners(), 0);
}
