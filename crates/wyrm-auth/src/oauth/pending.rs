//! Pending authorizations.
//!
//! A pending authorization carries a validated request from the GET that
//! rendered the consent page (or sent the user to log in) to the POST that
//! answers it. It is keyed by a random id stored in a browser cookie, expires
//! on its own, and is deleted by every POST outcome.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use url::form_urlencoded;
use uuid::Uuid;

use crate::scopes::ScopeSet;

use super::authorize::AuthorizationCredentials;

/// Path of the authorization endpoint, used to build resume URLs.
pub const AUTHORIZE_PATH: &str = "/oauth/authorize";

/// A validated authorization request waiting for the user's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    /// Identifier stored in the browser cookie.
    pub id: Uuid,

    /// Requested scopes.
    pub scopes: ScopeSet,

    /// Validated request parameters.
    pub credentials: AuthorizationCredentials,

    /// Creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// The record is ignored at or after this time.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl PendingAuthorization {
    /// Creates a pending authorization with a fresh id.
    #[must_use]
    pub fn new(
        scopes: ScopeSet,
        credentials: AuthorizationCredentials,
        now: OffsetDateTime,
        lifetime: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            scopes,
            credentials,
            created_at: now,
            expires_at: now + lifetime,
        }
    }

    /// Returns `true` once `now` has reached the expiry.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Authorization URL that replays this request, for the login page's
    /// `next` parameter.
    #[must_use]
    pub fn resume_url(&self) -> String {
        let credentials = &self.credentials;
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("response_type", &credentials.response_type)
            .append_pair("client_id", &credentials.client_id)
            .append_pair("redirect_uri", &credentials.redirect_uri);
        if let Some(ref state) = credentials.state {
            query.append_pair("state", state);
        }
        query
            .append_pair("code_challenge", &credentials.code_challenge)
            .append_pair(
                "code_challenge_method",
                credentials.code_challenge_method.as_str(),
            )
            .append_pair("scope", &self.scopes.to_string());
        format!("{AUTHORIZE_PATH}?{}", query.finish())
    }
}
