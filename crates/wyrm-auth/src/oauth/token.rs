//! Token endpoint types.
//!
//! # Supported Grant Types
//!
//! - `authorization_code` - Exchange an authorization code for tokens
//! - `refresh_token` - Mint a new token pair from a refresh token

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Grant types accepted by the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization code exchange.
    AuthorizationCode,
    /// Refresh token exchange.
    RefreshToken,
}

impl GrantType {
    /// Parses a `grant_type` parameter; `None` for anything unsupported.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "authorization_code" => Some(Self::AuthorizationCode),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }

    /// Returns the wire name of the grant type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token request parameters (form-encoded body).
///
/// - `authorization_code`: client_id, code, redirect_uri, code_verifier
/// - `refresh_token`: client_id, refresh_token, (optional) scope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    /// OAuth 2.0 grant type.
    #[serde(default)]
    pub grant_type: Option<String>,

    /// Client id URL.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Authorization code (for authorization_code grant).
    #[serde(default)]
    pub code: Option<String>,

    /// Redirect URI (must match the authorization request).
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// PKCE code verifier (for authorization_code grant).
    #[serde(default)]
    pub code_verifier: Option<String>,

    /// Refresh token (for refresh_token grant).
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Requested scope (for refresh_token grant, must be a subset of the original).
    #[serde(default)]
    pub scope: Option<String>,
}

/// Successful token response.
///
/// ```json
/// {
///   "access_token": "mF_9.B5f-4.1JqM",
///   "token_type": "bearer",
///   "expires_in": 3600,
///   "refresh_token": "tGzv3JOkF0XG5Qx2TlKWIA",
///   "scope": "user",
///   "username": "alice"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The access token.
    pub access_token: String,

    /// Token type, always "bearer".
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: u64,

    /// Refresh token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// Local handle of the resource owner.
    pub username: String,
}

impl TokenResponse {
    /// Creates a new token response with required fields.
    #[must_use]
    pub fn new(access_token: String, expires_in: u64, scope: String, username: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
            expires_in,
            refresh_token: None,
            scope,
            username,
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, token: String) -> Self {
        self.refresh_token = Some(token);
        self
    }
}

/// Token error response (RFC 6749 Section 5.2).
#[derive(Debug, Clone, Serialize)]
pub struct TokenError {
    /// OAuth 2.0 error code.
    pub error: TokenErrorCode,

    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl TokenError {
    /// Creates a new token error with description.
    #[must_use]
    pub fn with_description(error: TokenErrorCode, description: impl Into<String>) -> Self {
        Self {
            error,
            error_description: Some(description.into()),
        }
    }
}

impl From<&AuthError> for TokenError {
    fn from(error: &AuthError) -> Self {
        let code = match error {
            AuthError::InvalidClient { .. } => TokenErrorCode::InvalidClient,
            AuthError::InvalidGrant { .. } => TokenErrorCode::InvalidGrant,
            AuthError::InvalidScope { .. } => TokenErrorCode::InvalidScope,
            AuthError::UnsupportedGrantType { .. } => TokenErrorCode::UnsupportedGrantType,
            AuthError::AccessDenied { .. } => TokenErrorCode::UnauthorizedClient,
            AuthError::InvalidRedirectUri { .. }
            | AuthError::InvalidRequest { .. }
            | AuthError::UnsupportedResponseType { .. } => TokenErrorCode::InvalidRequest,
            AuthError::Storage { .. }
            | AuthError::Configuration { .. }
            | AuthError::Internal { .. } => TokenErrorCode::ServerError,
        };
        Self::with_description(code, error.description())
    }
}

/// OAuth 2.0 token error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenErrorCode {
    /// Missing or malformed parameter.
    InvalidRequest,
    /// The client could not be identified.
    InvalidClient,
    /// Invalid, expired, used, or foreign code or refresh token; PKCE failure.
    InvalidGrant,
    /// The client may not use this grant type.
    UnauthorizedClient,
    /// Grant type not supported.
    UnsupportedGrantType,
    /// Requested scope exceeds the original grant.
    InvalidScope,
    /// Unexpected server condition.
    ServerError,
}

impl TokenErrorCode {
    /// Returns the string representation of the error code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
            Self::ServerError => "server_error",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidClient => 401,
            Self::ServerError => 500,
            Self::InvalidRequest
            | Self::InvalidGrant
            | Self::UnauthorizedClient
            | Self::UnsupportedGrantType
            | Self::InvalidScope => 400,
        }
    }
}

impl fmt::Display for TokenErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_type_parse() {
        assert_eq!(
            GrantType::parse("authorization_code"),
            Some(GrantType::AuthorizationCode)
        );
        assert_eq!(GrantType::parse("refresh_token"), Some(GrantType::RefreshToken));
        assert_eq!(GrantType::parse("password"), None);
        assert_eq!(GrantType::parse("Refresh_Token"), None);
    }

    #[test]
    fn test_token_request_deserialization() {
        let json = r#"{
            "grant_type": "authorization_code",
            "client_id": "https://app.example/id",
            "code": "SplxlOBeZQQYbYS6WxSbIA",
            "redirect_uri": "https://app.example/cb",
            "code_verifier": "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"
        }"#;

        let request: TokenRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.grant_type.as_deref(), Some("authorization_code"));
        assert_eq!(request.code.as_deref(), Some("SplxlOBeZQQYbYS6WxSbIA"));
        assert!(request.refresh_token.is_none());
        assert!(request.scope.is_none());
    }

    #[test]
    fn test_token_response_serialization() {
        let response = TokenResponse::new(
            "at".to_string(),
            3600,
            "user".to_string(),
            "alice".to_string(),
        )
        .with_refresh_token("rt".to_string());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "access_token": "at",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "rt",
                "scope": "user",
                "username": "alice"
            })
        );
    }

    #[test]
    fn test_token_error_serialization() {
        let error = TokenError::with_description(TokenErrorCode::InvalidGrant, "Code already used");
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["error"], "invalid_grant");
        assert_eq!(json["error_description"], "Code already used");
    }

    #[test]
    fn test_token_error_from_auth_error() {
        let error = TokenError::from(&AuthError::invalid_grant("Invalid authorization grant"));
        assert_eq!(error.error, TokenErrorCode::InvalidGrant);

        let error = TokenError::from(&AuthError::storage("connection refused"));
        assert_eq!(error.error, TokenErrorCode::ServerError);
        assert_eq!(
            error.error_description.as_deref(),
            Some("The server encountered an unexpected condition")
        );
    }

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(TokenErrorCode::InvalidClient.http_status(), 401);
        assert_eq!(TokenErrorCode::InvalidGrant.http_status(), 400);
        assert_eq!(TokenErrorCode::InvalidScope.http_status(), 400);
        assert_eq!(TokenErrorCode::ServerError.http_status(), 500);
    }
}
