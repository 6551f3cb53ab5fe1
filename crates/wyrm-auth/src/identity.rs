//! Resource owner identity.
//!
//! User accounts and browser login live outside this crate. The server only
//! needs a stable id and the local handle it reports back as `username`.

use async_trait::async_trait;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

/// An authenticated platform user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Stable identifier.
    pub id: String,

    /// Local handle, returned to clients as `username`.
    pub username: String,

    /// Display name, if the user set one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl UserIdentity {
    /// Creates an identity without a display name.
    #[must_use]
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            display_name: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Name to show in pages: the display name, falling back to the handle.
    #[must_use]
    pub fn display(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// Resolves the browser user behind an inbound request.
///
/// Returning `None` means the request is anonymous; the authorization
/// endpoint then defers to the login page.
#[async_trait]
pub trait CurrentUserProvider: Send + Sync {
    /// Returns the authenticated user for this request, if any.
    async fn current_user(&self, parts: &Parts) -> Option<UserIdentity>;
}

/// Provider for deployments without browser sessions: every request is anonymous.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousUsers;

#[async_trait]
impl CurrentUserProvider for AnonymousUsers {
    async fn current_user(&self, _parts: &Parts) -> Option<UserIdentity> {
        None
    }
}
