//! # wyrm-auth
//!
//! OAuth 2.0 authorization server for the Wyrm reading platform.
//!
//! This crate provides:
//! - The authorization-code grant with mandatory PKCE (RFC 7636)
//! - Refresh of access tokens
//! - Opaque bearer tokens and a resource guard for protected routes
//! - Client discovery from IndieAuth-style `h-app` client-id documents
//!
//! ## Modules
//!
//! - [`config`] - Lifetimes, discovery, session, and scope configuration
//! - [`discovery`] - Client-id document fetching, parsing, and caching
//! - [`oauth`] - Authorization endpoint, PKCE, and request validation
//! - [`token`] - Bearer token issuance and the token endpoint service
//! - [`storage`] - Storage traits and the in-memory store
//! - [`middleware`] - Resource guard, extractors, and passive authentication
//! - [`http`] - Axum handlers for the OAuth endpoints
//! - [`server`] - Wiring everything from an [`AuthConfig`]

pub mod clock;
pub mod config;
pub mod discovery;
pub mod error;
pub mod http;
pub mod identity;
pub mod middleware;
pub mod oauth;
pub mod scopes;
pub mod server;
pub mod storage;
pub mod token;
pub mod types;

#[cfg(test)]
mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use http::{AuthorizeState, TokenState, authorize_get, authorize_post, token_handler};
pub use identity::{AnonymousUsers, CurrentUserProvider, UserIdentity};
pub use middleware::{
    AnyScope, AuthContext, Forbidden, Identity, OptionalBearer, PassiveAuthState, RequiredScopes,
    ResourceGuard, Scoped, UserScope, passive_bearer_auth,
};
pub use scopes::{ScopeCatalog, ScopeSet, USER_SCOPE};
pub use server::{CleanupStats, OAuthServer, OAuthServerBuilder};
pub use storage::{CodeStorage, MemoryStore, PendingAuthorizationStorage, TokenStorage};
pub use types::Client;

/// Type alias for authorization server results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use wyrm_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::config::AuthConfig;
    pub use crate::error::AuthError;
    pub use crate::identity::{CurrentUserProvider, UserIdentity};
    pub use crate::middleware::{
        AuthContext, Identity, OptionalBearer, ResourceGuard, Scoped, UserScope,
        passive_bearer_auth,
    };
    pub use crate::scopes::ScopeSet;
    pub use crate::server::OAuthServer;
}
