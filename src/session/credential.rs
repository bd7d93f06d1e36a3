//! Bearer token held by the supervisor and the session.

use std::fmt;
use std::sync::Arc;

/// Opaque bearer token. Replaced wholesale on login/logout, never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Arc<str>);

impl Credential {
    /// Returns `None` for an empty or whitespace-only token.
    pub fn new(token: impl AsRef<str>) -> Option<Self> {
        let token = token.as_ref().trim();
        if token.is_empty() {
            None
        } else {
            Some(Self(Arc::from(token)))
        }
    }

    pub fn from_optional(token: Option<impl AsRef<str>>) -> Option<Self> {
        token.and_then(Self::new)
    }

    /// The raw token, for building the endpoint URL only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_is_none() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new("   ").is_none());
        assert!(Credential::from_optional(None::<String>).is_none());
        assert_eq!(Credential::new(" abc ").unwrap().expose(), "abc");
    }

    #[test]
    fn test_debug_is_redacted() {
        let credential = Credential::new("secret-token").unwrap();
        assert_eq!(format!("{credential:?}"), "Credential(***)");
    }
}
