//! Stored bearer tokens.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::identity::UserIdentity;
use crate::scopes::ScopeSet;

use super::random_secret;

/// An access token with its refresh token, as persisted by the token store.
///
/// A token is valid while `now < expires_at`. Refresh tokens carry no
/// expiry of their own and stay redeemable while the record exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerToken {
    /// Access token value.
    pub token: String,

    /// Refresh token value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Client the token was issued to.
    pub client_id: String,

    /// Resource owner.
    pub user: UserIdentity,

    /// Granted scopes.
    pub scope: ScopeSet,

    /// Issuance time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Expiration date of the access token.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl BearerToken {
    /// Mints a new access token with a fresh refresh token.
    #[must_use]
    pub fn issue(
        client_id: impl Into<String>,
        user: UserIdentity,
        scope: ScopeSet,
        now: OffsetDateTime,
        lifetime: Duration,
    ) -> Self {
        Self {
            token: random_secret(),
            refresh_token: Some(random_secret()),
            client_id: client_id.into(),
            user,
            scope,
            created_at: now,
            expires_at: now + lifetime,
        }
    }

    /// Returns `true` once `now` has reached the expiration date.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Lifetime in whole seconds, as reported in `expires_in`.
    #[must_use]
    pub fn expires_in(&self) -> u64 {
        u64::try_from((self.expires_at - self.created_at).whole_seconds()).unwrap_or(0)
    }
}
