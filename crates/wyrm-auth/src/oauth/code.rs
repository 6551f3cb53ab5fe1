//! Authorization code records.
//!
//! # Lifecycle
//!
//! 1. Created when the user consents on the authorization page
//! 2. Looked up by the token endpoint to recover user, scopes and PKCE binding
//! 3. Deleted exactly once by the token endpoint, whatever the exchange outcome
//! 4. Swept by the cleanup task if never redeemed
//!
//! Codes are 256 bits of randomness and are never updated after creation.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::identity::UserIdentity;
use crate::scopes::ScopeSet;
use crate::token::random_secret;

use super::authorize::AuthorizationCredentials;
use super::pkce::PkceChallengeMethod;

/// A single-use authorization code bound to a user, a client and a PKCE challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// The code value sent to the client.
    pub code: String,

    /// Client the code was issued to.
    pub client_id: String,

    /// Granted scopes.
    pub scopes: ScopeSet,

    /// Redirect URI the code was issued for; must match at exchange.
    pub redirect_uri: String,

    /// Client state from the authorization request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// PKCE challenge from the authorization request.
    pub code_challenge: String,

    /// PKCE method from the authorization request.
    pub code_challenge_method: PkceChallengeMethod,

    /// The consenting user.
    pub user: UserIdentity,

    /// Issuance time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// The code cannot be redeemed at or after this time.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl AuthorizationCode {
    /// Issues a fresh code for a validated request.
    #[must_use]
    pub fn issue(
        credentials: &AuthorizationCredentials,
        scopes: ScopeSet,
        user: UserIdentity,
        now: OffsetDateTime,
        lifetime: Duration,
    ) -> Self {
        Self {
            code: random_secret(),
            client_id: credentials.client_id.clone(),
            scopes,
            redirect_uri: credentials.redirect_uri.clone(),
            state: credentials.state.clone(),
            code_challenge: credentials.code_challenge.clone(),
            code_challenge_method: credentials.code_challenge_method,
            user,
            created_at: now,
            expires_at: now + lifetime,
        }
    }

    /// Returns `true` once `now` has reached the expiry.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}
