//! Browser identity from a trusted reverse-proxy header.

use async_trait::async_trait;
use axum::http::{HeaderName, request::Parts};
use wyrm_auth::{CurrentUserProvider, UserIdentity};

/// Reads the logged-in user's handle from a header the login proxy sets.
///
/// The handle doubles as the stable id: the proxy owns the account store.
#[derive(Debug, Clone)]
pub struct ProxyHeaderUsers {
    header: HeaderName,
}

impl ProxyHeaderUsers {
    /// Returns `None` if `header` is not a valid header name.
    pub fn new(header: &str) -> Option<Self> {
        HeaderName::from_bytes(header.trim().as_bytes())
            .ok()
            .map(|header| Self { header })
    }
}

#[async_trait]
impl CurrentUserProvider for ProxyHeaderUsers {
    async fn current_user(&self, parts: &Parts) -> Option<UserIdentity> {
        let username = parts.headers.get(&self.header)?.to_str().ok()?.trim();
        if username.is_empty() {
            return None;
        }
        Some(UserIdentity::new(username, username))
    }
}
