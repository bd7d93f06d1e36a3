//! Error types for the transport and frame decoding
//!
//! Nothing here is ever returned from a session operation: transport errors
//! drive the reconnection policy and frame errors are logged and dropped.

use thiserror::Error;

/// Failure to open or keep the notification transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Network-level failure (DNS, refused, TLS, timeout).
    #[error("connect failed: {0}")]
    Connect(String),
    /// The server answered the upgrade request with an HTTP error status.
    #[error("handshake rejected with HTTP {status}")]
    Rejected { status: u16 },
    /// The endpoint URL could not be built from the configuration.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// Anything else reported by the WebSocket layer.
    #[error("websocket protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// 401/403 at handshake means the credential was refused.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, TransportError::Rejected { status: 401 | 403 })
    }
}

/// A frame that could not be decoded as a notification.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no string `type` field")]
    MissingType,
}
