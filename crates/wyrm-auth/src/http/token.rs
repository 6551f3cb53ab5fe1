//! OAuth 2.0 token endpoint handler.
//!
//! ```text
//! POST /oauth/token
//! Content-Type: application/x-www-form-urlencoded
//!
//! grant_type=authorization_code
//! &code=SplxlOBeZQQYbYS6WxSbIA
//! &redirect_uri=https://app.example/cb
//! &code_verifier=dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk
//! &client_id=https://app.example/id
//! ```

use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::AuthError;
use crate::middleware::no_store_headers;
use crate::oauth::token::TokenRequest;
use crate::token::TokenService;

/// State required for the token endpoint.
#[derive(Clone)]
pub struct TokenState {
    /// Grant redemption.
    pub service: TokenService,
}

impl TokenState {
    /// Creates a new token state.
    #[must_use]
    pub fn new(service: TokenService) -> Self {
        Self { service }
    }
}

/// POST /oauth/token handler.
///
/// Successful responses and errors alike carry `Cache-Control: no-store`.
pub async fn token_handler(
    State(state): State<TokenState>,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let request = match form {
        Ok(Form(request)) => request,
        Err(rejection) => {
            return AuthError::invalid_request(rejection.body_text()).into_response();
        }
    };

    match state.service.exchange(&request).await {
        Ok(response) => (StatusCode::OK, no_store_headers(), Json(response)).into_response(),
        Err(e) => e.into_response(),
    }
}
