//! 凭证来源 - 当前 token 与登录/登出变化

use tokio::sync::watch;

use crate::session::Credential;

/// 凭证来源
pub trait TokenProvider: Send + Sync {
    /// 当前 token
    fn current_token(&self) -> Option<Credential>;

    /// token 变化通知（登录为 `Some`，登出为 `None`）；不会变化的来源返回 `None`
    fn subscribe_changes(&self) -> Option<watch::Receiver<Option<Credential>>> {
        None
    }
}

/// 固定 token
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<Credential>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<Credential>) -> Self {
        Self { token }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn current_token(&self) -> Option<Credential> {
        self.token.clone()
    }
}

/// 可变 token，登录/登出时通知监听者
#[derive(Debug, Clone)]
pub struct SharedToken {
    tx: std::sync::Arc<watch::Sender<Option<Credential>>>,
}

impl SharedToken {
    pub fn new(initial: Option<Credential>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    pub fn login(&self, credential: Credential) {
        self.tx.send_replace(Some(credential));
    }

    pub fn logout(&self) {
        self.tx.send_replace(None);
    }
}

impl TokenProvider for SharedToken {
    fn current_token(&self) -> Option<Credential> {
        self.tx.borrow().clone()
    }

    fn subscribe_changes(&self) -> Option<watch::Receiver<Option<Credential>>> {
        Some(self.tx.subscribe())
    }
}
