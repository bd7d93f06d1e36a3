//! 服务端地址 - 由 HTTP 基地址推导 WebSocket 通知地址
//!
//! `http://host` → `ws://host/ws/notifications?token=...`，
//! `https://host` → `wss://...`。基地址自带的路径前缀会保留。

use url::Url;

use super::credential::Credential;
use crate::error::TransportError;

/// 默认通知路径
pub const DEFAULT_NOTIFICATIONS_PATH: &str = "/ws/notifications";

const REDACTED: &str = "***";

/// WebSocket 通知端点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    base: Url,
}

impl ServerEndpoint {
    /// 解析服务端基地址并拼接通知路径
    pub fn parse(server_url: &str, notifications_path: &str) -> Result<Self, TransportError> {
        let mut base = Url::parse(server_url.trim())
            .map_err(|e| TransportError::InvalidEndpoint(format!("{server_url}: {e}")))?;

        let scheme = match base.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(TransportError::InvalidEndpoint(format!(
                    "unsupported scheme `{other}`"
                )))
            }
        };
        if base.host_str().is_none() {
            return Err(TransportError::InvalidEndpoint(format!(
                "{server_url}: missing host"
            )));
        }
        base.set_scheme(scheme)
            .map_err(|_| TransportError::InvalidEndpoint(format!("cannot use scheme {scheme}")))?;

        let prefix = base.path().trim_end_matches('/').to_string();
        let suffix = notifications_path.trim().trim_start_matches('/');
        base.set_path(&format!("{prefix}/{suffix}"));
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self { base })
    }

    /// 带 token 的连接地址
    pub fn url_for(&self, credential: &Credential) -> Url {
        self.with_token(credential.expose())
    }

    /// 日志用地址，token 已脱敏
    pub fn redacted(&self) -> String {
        self.with_token(REDACTED).to_string()
    }

    /// 不带 token 的地址
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn with_token(&self, token: &str) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut().append_pair("token", token);
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(s: &str) -> Credential {
        Credential::new(s).unwrap()
    }

    #[test]
    fn test_http_maps_to_ws() {
        let endpoint = ServerEndpoint::parse("http://localhost:8000", DEFAULT_NOTIFICATIONS_PATH).unwrap();
        assert_eq!(
            endpoint.url_for(&token("abc")).as_str(),
            "ws://localhost:8000/ws/notifications?token=abc"
        );
    }

    #[test]
    fn test_https_maps_to_wss_and_keeps_prefix() {
        let endpoint = ServerEndpoint::parse("https://api.example.com/v1/", "ws/notifications").unwrap();
        assert_eq!(
            endpoint.url_for(&token("abc")).as_str(),
            "wss://api.example.com/v1/ws/notifications?token=abc"
        );
    }

    #[test]
    fn test_ws_schemes_accepted() {
        let endpoint = ServerEndpoint::parse("wss://example.com", DEFAULT_NOTIFICATIONS_PATH).unwrap();
        assert_eq!(endpoint.base().scheme(), "wss");
    }

    #[test]
    fn test_token_is_encoded() {
        let endpoint = ServerEndpoint::parse("http://localhost", DEFAULT_NOTIFICATIONS_PATH).unwrap();
        let url = endpoint.url_for(&token("a b&c=d"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("token".to_string(), "a b&c=d".to_string())]);
    }

    #[test]
    fn test_redacted_hides_token() {
        let endpoint = ServerEndpoint::parse("http://localhost:8000", DEFAULT_NOTIFICATIONS_PATH).unwrap();
        let redacted = endpoint.redacted();
        assert!(redacted.ends_with("token=***"));
    }

    #[test]
    fn test_invalid_endpoints() {
        assert!(matches!(
            ServerEndpoint::parse("ftp://example.com", DEFAULT_NOTIFICATIONS_PATH),
            Err(TransportError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            ServerEndpoint::parse("not a url", DEFAULT_NOTIFICATIONS_PATH),
            Err(TransportError::InvalidEndpoint(_))
        ));
    }
}
