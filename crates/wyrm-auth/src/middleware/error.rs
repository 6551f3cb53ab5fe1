//! Error responses for the token endpoint.
//!
//! `AuthError` renders as an RFC 6749 Section 5.2 JSON error. Only the token
//! endpoint answers with a bare `AuthError`; the authorization endpoint
//! renders pages or redirects, and the resource guard answers 403.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::error::AuthError;
use crate::oauth::token::TokenError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let error = TokenError::from(&self);
        let status = StatusCode::from_u16(error.error.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.is_server_error() {
            tracing::error!(category = %self.category(), error = %self, "Token endpoint failure");
        } else {
            tracing::debug!(category = %self.category(), error = %self, "Token request rejected");
        }

        let mut headers = no_store_headers();
        if status == StatusCode::UNAUTHORIZED {
            headers.insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer error=\"invalid_client\""),
            );
        }

        (status, headers, Json(error)).into_response()
    }
}

/// `Cache-Control: no-store` and `Pragma: no-cache`, required on every
/// token endpoint response.
#[must_use]
pub fn no_store_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_grant_response() {
        let response = AuthError::invalid_grant("Invalid authorization grant").into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
        assert_eq!(response.headers().get(header::PRAGMA).unwrap(), "no-cache");
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());

        let body = body_json(response).await;
        assert_eq!(
            body,
            serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Invalid authorization grant"
            })
        );
    }

    #[tokio::test]
    async fn test_invalid_client_is_401() {
        let response = AuthError::invalid_client("Client could not be identified").into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_some());
        assert_eq!(body_json(response).await["error"], "invalid_client");
    }

    #[tokio::test]
    async fn test_server_error_hides_details() {
        let response = AuthError::storage("database is on fire").into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "server_error");
        assert!(!body.to_string().contains("fire"));
    }
}
