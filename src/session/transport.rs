//! WebSocket transport layer
//!
//! The session only sees the [`Connector`] and [`Transport`] traits: open a
//! connection, read the next event, close. No knowledge of notifications,
//! retries or state. [`WebSocketConnector`] is the production implementation
//! on top of tokio-tungstenite.

use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        protocol::{frame::coding::CloseCode, CloseFrame, Message},
        Error as WsError,
    },
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};
use url::Url;

use crate::error::TransportError;

/// Close code used when the client goes away on purpose.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code for a policy violation; the server sends it for a bad token.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// Close code reported when the peer vanished without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Close code for a close frame without a status.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Something the transport reports to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One text frame.
    Frame(String),
    /// The connection is gone. Read errors surface here as code 1006.
    Closed { code: u16, reason: String },
}

/// A live connection.
#[async_trait]
pub trait Transport: Send {
    /// Wait for the next frame or the close.
    async fn next_event(&mut self) -> TransportEvent;

    /// Close from the client side.
    async fn close(&mut self, code: u16, reason: &str);
}

/// Opens transports.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &Url) -> Result<Box<dyn Transport>, TransportError>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// tokio-tungstenite connector (ws and wss).
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &Url) -> Result<Box<dyn Transport>, TransportError> {
        let connect = connect_async(url.as_str());
        let (stream, response) = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => return Err(map_ws_error(e)),
            Err(_) => {
                return Err(TransportError::Connect(format!(
                    "timed out after {}s",
                    self.connect_timeout.as_secs()
                )))
            }
        };

        debug!(status = response.status().as_u16(), "WebSocket handshake complete");
        Ok(Box::new(WebSocketTransport {
            stream,
            closed: false,
        }))
    }
}

fn map_ws_error(error: WsError) -> TransportError {
    match error {
        WsError::Http(response) => TransportError::Rejected {
            status: response.status().as_u16(),
        },
        WsError::Io(e) => TransportError::Connect(e.to_string()),
        WsError::Url(e) => TransportError::InvalidEndpoint(e.to_string()),
        other => TransportError::Protocol(other.to_string()),
    }
}

/// A connected WebSocket.
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn next_event(&mut self) -> TransportEvent {
        if self.closed {
            return std::future::pending().await;
        }
        loop {
            let event = match self.stream.next().await {
                Some(Ok(Message::Text(text))) => TransportEvent::Frame(text),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => TransportEvent::Frame(text),
                    Err(_) => {
                        warn!("Dropping non UTF-8 binary frame");
                        continue;
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.into_owned()))
                        .unwrap_or((CLOSE_NO_STATUS, String::new()));
                    TransportEvent::Closed { code, reason }
                }
                // ping/pong are answered by tungstenite
                Some(Ok(_)) => continue,
                Some(Err(e)) => TransportEvent::Closed {
                    code: CLOSE_ABNORMAL,
                    reason: e.to_string(),
                },
                None => TransportEvent::Closed {
                    code: CLOSE_ABNORMAL,
                    reason: "connection closed".to_string(),
                },
            };
            if matches!(event, TransportEvent::Closed { .. }) {
                self.closed = true;
            }
            return event;
        }
    }

    async fn close(&mut self, code: u16, reason: &str) {
        if self.closed {
            return;
        }
        self.closed = true;
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        if let Err(e) = self.stream.close(Some(frame)).await {
            debug!(error = %e, "WebSocket close handshake failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_io_error() {
        let err = WsError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(matches!(map_ws_error(err), TransportError::Connect(_)));
    }

    #[test]
    fn test_map_protocol_error() {
        let err = WsError::ConnectionClosed;
        assert!(matches!(map_ws_error(err), TransportError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_refused_connection_is_connect_error() {
        // 绑定后立即释放，端口上没有监听者
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = Url::parse(&format!("ws://127.0.0.1:{port}/ws/notifications?token=x")).unwrap();
        let result = WebSocketConnector::new()
            .with_connect_timeout(Duration::from_secs(2))
            .open(&url)
            .await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }
}
