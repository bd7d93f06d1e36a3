//! 内存连接器 - 按脚本成功或失败，替代真实网络
//!
//! 每次 `open` 从队列头取一个结果；队列为空时按连接被拒处理。
//! 成功的连接由 [`ScriptedServer`] 驱动：推送帧、从服务端关闭、
//! 查看客户端是否主动关闭。

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

use super::transport::{Connector, Transport, TransportEvent};
use crate::error::TransportError;

enum Scripted {
    Accept(Arc<ServerState>, mpsc::UnboundedReceiver<TransportEvent>),
    Fail(TransportError),
}

#[derive(Default)]
struct ServerState {
    /// 客户端主动关闭时的 (code, reason)
    client_close: Mutex<Option<(u16, String)>>,
}

#[derive(Default)]
struct Counters {
    opens: AtomicUsize,
    live: AtomicUsize,
    peak_live: AtomicUsize,
}

/// 脚本化连接器
#[derive(Default)]
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Scripted>>,
    counters: Arc<Counters>,
    open_delay: Mutex<Duration>,
    urls: Mutex<Vec<Url>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 下一次 open 成功，返回服务端句柄
    pub fn accept(&self) -> ScriptedServer {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(ServerState::default());
        lock(&self.script).push_back(Scripted::Accept(state.clone(), rx));
        ScriptedServer { tx, state }
    }

    /// 下一次 open 失败
    pub fn fail(&self, error: TransportError) {
        lock(&self.script).push_back(Scripted::Fail(error));
    }

    /// 每次 open 之前等待的时间
    pub fn set_open_delay(&self, delay: Duration) {
        *lock(&self.open_delay) = delay;
    }

    /// open 被调用的次数
    pub fn open_count(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    /// 尚未关闭或释放的连接数
    pub fn live_transports(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    /// 同时存活连接数的最大值
    pub fn peak_live_transports(&self) -> usize {
        self.counters.peak_live.load(Ordering::SeqCst)
    }

    /// 所有 open 请求的地址
    pub fn opened_urls(&self) -> Vec<Url> {
        lock(&self.urls).clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, url: &Url) -> Result<Box<dyn Transport>, TransportError> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        lock(&self.urls).push(url.clone());

        let delay = *lock(&self.open_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let next = lock(&self.script).pop_front();
        match next {
            Some(Scripted::Accept(state, events)) => {
                let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
                self.counters.peak_live.fetch_max(live, Ordering::SeqCst);
                Ok(Box::new(ScriptedTransport {
                    events,
                    state,
                    counters: self.counters.clone(),
                    released: false,
                }))
            }
            Some(Scripted::Fail(error)) => Err(error),
            None => Err(TransportError::Connect("connection refused".to_string())),
        }
    }
}

/// 服务端句柄
#[derive(Clone)]
pub struct ScriptedServer {
    tx: mpsc::UnboundedSender<TransportEvent>,
    state: Arc<ServerState>,
}

impl ScriptedServer {
    /// 推送一个文本帧
    pub fn send_frame(&self, text: impl Into<String>) {
        let _ = self.tx.send(TransportEvent::Frame(text.into()));
    }

    /// 服务端关闭连接
    pub fn close(&self, code: u16, reason: impl Into<String>) {
        let _ = self.tx.send(TransportEvent::Closed {
            code,
            reason: reason.into(),
        });
    }

    /// 客户端主动关闭时使用的 (code, reason)
    pub fn client_close(&self) -> Option<(u16, String)> {
        lock(&self.state.client_close).clone()
    }
}

struct ScriptedTransport {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    state: Arc<ServerState>,
    counters: Arc<Counters>,
    released: bool,
}

impl ScriptedTransport {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.counters.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn next_event(&mut self) -> TransportEvent {
        if self.released {
            return std::future::pending().await;
        }
        match self.events.recv().await {
            Some(event) => {
                if matches!(event, TransportEvent::Closed { .. }) {
                    self.release();
                }
                event
            }
            // 服务端句柄已丢弃，连接保持静默
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self, code: u16, reason: &str) {
        *lock(&self.state.client_close) = Some((code, reason.to_string()));
        self.release();
    }
}

impl Drop for ScriptedTransport {
    fn drop(&mut self) {
        self.release();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("ws://localhost/ws/notifications?token=t").unwrap()
    }

    #[tokio::test]
    async fn test_accept_then_frames_and_close() {
        let connector = ScriptedConnector::new();
        let server = connector.accept();
        let mut transport = connector.open(&url()).await.unwrap();
        assert_eq!(connector.live_transports(), 1);

        server.send_frame("hello");
        server.close(1000, "bye");
        assert_eq!(transport.next_event().await, TransportEvent::Frame("hello".into()));
        assert_eq!(
            transport.next_event().await,
            TransportEvent::Closed { code: 1000, reason: "bye".into() }
        );
        assert_eq!(connector.live_transports(), 0);
    }

    #[tokio::test]
    async fn test_empty_script_refuses() {
        let connector = ScriptedConnector::new();
        assert!(matches!(
            connector.open(&url()).await,
            Err(TransportError::Connect(_))
        ));
        assert_eq!(connector.open_count(), 1);
    }

    #[tokio::test]
    async fn test_client_close_and_drop_release() {
        let connector = ScriptedConnector::new();
        let server = connector.accept();
        connector.accept();

        let mut first = connector.open(&url()).await.unwrap();
        let second = connector.open(&url()).await.unwrap();
        assert_eq!(connector.peak_live_transports(), 2);

        first.close(1000, "User disconnected").await;
        assert_eq!(server.client_close(), Some((1000, "User disconnected".into())));
        drop(second);
        assert_eq!(connector.live_transports(), 0);
    }
}
