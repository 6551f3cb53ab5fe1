//! HTTP middleware for protected resources.
//!
//! This module provides Axum pieces for:
//!
//! - Bearer token validation against required scopes ([`Scoped`])
//! - Best-effort identity attachment ([`passive_bearer_auth`])
//! - OAuth 2.0 JSON error responses for `AuthError`
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use wyrm_auth::middleware::{Scoped, UserScope};
//!
//! async fn protected_handler(Scoped(auth, ..): Scoped<UserScope>) -> String {
//!     format!("Hello, {}!", auth.username())
//! }
//! ```

pub mod auth;
pub mod error;
pub mod passive;
pub mod types;

pub use auth::{
    AnyScope, Forbidden, RequiredScopes, ResourceGuard, Scoped, UserScope, bearer_token,
};
pub use error::no_store_headers;
pub use passive::{
    Identity, OAUTH_PATH_PREFIX, OptionalBearer, PassiveAuthState, passive_bearer_auth,
};
pub use types::AuthContext;
