//! Authorization endpoint types.
//!
//! Request parsing, the validated credential set carried from the consent
//! page to code issuance, and the redirect responses sent back to clients.
//!
//! # Security Requirements
//!
//! - PKCE is required (`code_challenge`, with `S256` or `plain`)
//! - `redirect_uri` must equal the client's declared redirect URI exactly

use std::fmt;

use serde::{Deserialize, Serialize};

use super::pkce::PkceChallengeMethod;

/// Authorization request parameters, as received on the query string.
///
/// Every field is optional here so that a missing parameter becomes a
/// protocol error with the right disposition instead of an extractor
/// rejection.
///
/// # Example
///
/// ```ignore
/// GET /oauth/authorize?
///   response_type=code
///   &client_id=https://app.example/id
///   &redirect_uri=https://app.example/cb
///   &scope=user
///   &state=af0ifjsldkj
///   &code_challenge=E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM
///   &code_challenge_method=S256
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthorizationRequest {
    /// Must be "code".
    #[serde(default)]
    pub response_type: Option<String>,

    /// Client id URL.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Must equal the client's declared redirect URI.
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// Requested scopes (space-separated).
    #[serde(default)]
    pub scope: Option<String>,

    /// Opaque client state, echoed back on every redirect.
    #[serde(default)]
    pub state: Option<String>,

    /// PKCE code challenge.
    #[serde(default)]
    pub code_challenge: Option<String>,

    /// PKCE method; `plain` when absent.
    #[serde(default)]
    pub code_challenge_method: Option<String>,
}

/// A validated authorization request, minus the scopes.
///
/// Produced by the authorization service once every check passed and
/// stored in the pending authorization until the user decides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCredentials {
    /// Client id URL.
    pub client_id: String,
    /// Verified redirect URI.
    pub redirect_uri: String,
    /// Client state, if any.
    pub state: Option<String>,
    /// Always "code".
    pub response_type: String,
    /// PKCE challenge.
    pub code_challenge: String,
    /// PKCE method.
    pub code_challenge_method: PkceChallengeMethod,
}

/// Successful authorization redirect parameters.
///
/// ```ignore
/// HTTP/1.1 302 Found
/// Location: https://app.example/cb?code=SplxlOBeZQQYbYS6WxSbIA&state=af0ifjsldkj
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationResponse {
    /// Single-use authorization code.
    pub code: String,

    /// Echoed state, when the client sent one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl AuthorizationResponse {
    /// Creates a new authorization response.
    #[must_use]
    pub fn new(code: String, state: Option<String>) -> Self {
        Self { code, state }
    }

    /// Builds the redirect URL with response parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `redirect_uri` is not an absolute URL.
    pub fn to_redirect_url(&self, redirect_uri: &str) -> Result<String, url::ParseError> {
        let mut url = url::Url::parse(redirect_uri)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("code", &self.code);
            if let Some(ref state) = self.state {
                pairs.append_pair("state", state);
            }
        }
        Ok(url.to_string())
    }
}

/// Authorization error delivered by redirect.
///
/// Only used once the client and its redirect URI are trusted.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationError {
    /// OAuth 2.0 error code.
    pub error: AuthorizationErrorCode,

    /// Human-readable error description (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,

    /// Echoed state, when the client sent one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl AuthorizationError {
    /// Creates a new authorization error.
    #[must_use]
    pub fn new(error: AuthorizationErrorCode, state: Option<String>) -> Self {
        Self {
            error,
            error_description: None,
            state,
        }
    }

    /// Creates a new authorization error with description.
    #[must_use]
    pub fn with_description(
        error: AuthorizationErrorCode,
        description: impl Into<String>,
        state: Option<String>,
    ) -> Self {
        Self {
            error,
            error_description: Some(description.into()),
            state,
        }
    }

    /// Builds the redirect URL with error parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `redirect_uri` is not an absolute URL.
    pub fn to_redirect_url(&self, redirect_uri: &str) -> Result<String, url::ParseError> {
        let mut url = url::Url::parse(redirect_uri)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("error", self.error.as_str());
            if let Some(ref desc) = self.error_description {
                pairs.append_pair("error_description", desc);
            }
            if let Some(ref state) = self.state {
                pairs.append_pair("state", state);
            }
        }
        Ok(url.to_string())
    }
}

/// OAuth 2.0 authorization error codes (RFC 6749 Section 4.1.2.1), plus
/// `user_cancelled` for an explicit cancel on the consent page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationErrorCode {
    /// Missing or malformed parameter.
    InvalidRequest,
    /// The client may not use this method.
    UnauthorizedClient,
    /// The resource owner or server denied the request.
    AccessDenied,
    /// Only `code` is supported.
    UnsupportedResponseType,
    /// Unknown scope.
    InvalidScope,
    /// Unexpected server condition.
    ServerError,
    /// The user pressed cancel on the consent page.
    UserCancelled,
}

impl AuthorizationErrorCode {
    /// Returns the string representation of the error code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::AccessDenied => "access_denied",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::InvalidScope => "invalid_scope",
            Self::ServerError => "server_error",
            Self::UserCancelled => "user_cancelled",
        }
    }

    /// Maps an OAuth error code string back to the enum, defaulting to
    /// `server_error` for codes the authorization endpoint never emits.
    #[must_use]
    pub fn from_oauth_code(code: &str) -> Self {
        match code {
            "invalid_request" => Self::InvalidRequest,
            "unauthorized_client" => Self::UnauthorizedClient,
            "access_denied" => Self::AccessDenied,
            "unsupported_response_type" => Self::UnsupportedResponseType,
            "invalid_scope" => Self::InvalidScope,
            "user_cancelled" => Self::UserCancelled,
            _ => Self::ServerError,
        }
    }
}

impl fmt::Display for AuthorizationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
