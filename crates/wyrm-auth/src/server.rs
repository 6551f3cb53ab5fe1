//! Authorization server assembly.
//!
//! [`OAuthServer`] wires the stores, the client resolver, and the services
//! together from an [`AuthConfig`] and hands out the routes and the pieces
//! a host application needs to protect its own routes.
//!
//! Browser users are recognized by a [`CurrentUserProvider`] supplied by
//! the host; the default, [`AnonymousUsers`], knows nobody.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use axum::{Router, routing::get};
//! # use wyrm_auth::{AnonymousUsers, AuthConfig, OAuthServer, Scoped, UserScope};
//! # async fn me(_: Scoped<UserScope>) -> &'static str { "alice" }
//! # fn main() -> Result<(), wyrm_auth::AuthError> {
//! # let config = AuthConfig::default();
//! let oauth = OAuthServer::builder(config)
//!     .users(Arc::new(AnonymousUsers))
//!     .build()?;
//!
//! let app = Router::new()
//!     .route("/api/v1/me", get(me))
//!     .with_state(oauth.guard())
//!     .merge(oauth.routes());
//! # let _: Router = app;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AuthResult;
use crate::clock::{Clock, SystemClock, lifetime};
use crate::config::AuthConfig;
use crate::discovery::{CachedClientResolver, ClientResolver, HttpClientResolver};
use crate::error::AuthError;
use crate::http::{AuthorizeState, TokenState, authorize_get, authorize_post, token_handler};
use crate::identity::{AnonymousUsers, CurrentUserProvider};
use crate::middleware::{PassiveAuthState, ResourceGuard};
use crate::oauth::service::AuthorizationService;
use crate::oauth::validator::RequestValidator;
use crate::scopes::ScopeCatalog;
use crate::storage::{CodeStorage, MemoryStore, PendingAuthorizationStorage};
use crate::token::TokenService;

/// Route of the authorization endpoint.
pub const AUTHORIZE_ROUTE: &str = "/oauth/authorize";

/// Route of the token endpoint.
pub const TOKEN_ROUTE: &str = "/oauth/token";

/// Counts from one [`OAuthServer::cleanup_expired`] sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    /// Expired authorization codes removed.
    pub codes: u64,
    /// Expired pending authorizations removed.
    pub pending: u64,
}

/// Builder for [`OAuthServer`].
pub struct OAuthServerBuilder {
    config: AuthConfig,
    clock: Arc<dyn Clock>,
    resolver: Option<Arc<dyn ClientResolver>>,
    users: Arc<dyn CurrentUserProvider>,
    store: Option<Arc<MemoryStore>>,
}

impl OAuthServerBuilder {
    /// Replaces the wall clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the HTTP client-id resolver. The result is still cached.
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn ClientResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Sets how browser users are recognized. Defaults to nobody.
    #[must_use]
    pub fn users(mut self, users: Arc<dyn CurrentUserProvider>) -> Self {
        self.users = users;
        self
    }

    /// Shares an existing store instead of creating a fresh one.
    #[must_use]
    pub fn store(mut self, store: Arc<MemoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validates the configuration and assembles the server.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the configuration is invalid or the
    /// discovery HTTP client cannot be built.
    pub fn build(self) -> AuthResult<OAuthServer> {
        let config = self.config;
        config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        let resolver = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(
                HttpClientResolver::new(config.discovery.clone())
                    .map_err(|e| AuthError::configuration(e.to_string()))?,
            ),
        };
        let clients = Arc::new(CachedClientResolver::new(
            resolver,
            self.clock.clone(),
            config.discovery.cache_ttl,
        ));

        let store = self.store.unwrap_or_default();
        let catalog = ScopeCatalog::default().with_scopes(config.scopes.clone());
        let validator = RequestValidator::new(
            clients.clone(),
            store.clone(),
            store.clone(),
            self.clock.clone(),
            catalog,
        );

        let authorization = AuthorizationService::new(
            validator.clone(),
            store.clone(),
            lifetime(config.oauth.authorization_code_lifetime),
            lifetime(config.oauth.pending_authorization_lifetime),
        );
        let tokens = TokenService::new(
            validator.clone(),
            lifetime(config.oauth.access_token_lifetime),
            config.oauth.revoke_superseded_tokens,
        );

        tracing::info!(
            scopes = validator.scope_catalog().len(),
            cache_ttl = ?config.discovery.cache_ttl,
            "OAuth server initialized"
        );

        Ok(OAuthServer {
            config,
            store,
            clients,
            clock: self.clock,
            validator,
            authorization,
            tokens,
            users: self.users,
        })
    }
}

/// A fully wired authorization server.
#[derive(Clone)]
pub struct OAuthServer {
    config: AuthConfig,
    store: Arc<MemoryStore>,
    clients: Arc<CachedClientResolver>,
    clock: Arc<dyn Clock>,
    validator: RequestValidator,
    authorization: AuthorizationService,
    tokens: TokenService,
    users: Arc<dyn CurrentUserProvider>,
}

impl OAuthServer {
    /// Starts building a server from `config`.
    #[must_use]
    pub fn builder(config: AuthConfig) -> OAuthServerBuilder {
        OAuthServerBuilder {
            config,
            clock: Arc::new(SystemClock),
            resolver: None,
            users: Arc::new(AnonymousUsers),
            store: None,
        }
    }

    /// The configuration the server was built from.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// The request validator shared by every endpoint.
    #[must_use]
    pub fn validator(&self) -> &RequestValidator {
        &self.validator
    }

    /// The authorization endpoint service.
    #[must_use]
    pub fn authorization_service(&self) -> &AuthorizationService {
        &self.authorization
    }

    /// The token endpoint service.
    #[must_use]
    pub fn token_service(&self) -> &TokenService {
        &self.tokens
    }

    /// A guard for routes protected by bearer tokens.
    #[must_use]
    pub fn guard(&self) -> ResourceGuard {
        ResourceGuard::new(self.validator.clone())
    }

    /// State for [`passive_bearer_auth`](crate::middleware::passive_bearer_auth).
    #[must_use]
    pub fn passive_state(&self) -> PassiveAuthState {
        PassiveAuthState::new(self.guard(), self.users.clone())
    }

    /// The authorization and token endpoints.
    pub fn routes<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let authorize = AuthorizeState {
            service: self.authorization.clone(),
            users: self.users.clone(),
            session: self.config.session.clone(),
        };
        let token = TokenState::new(self.tokens.clone());

        Router::new()
            .route(AUTHORIZE_ROUTE, get(authorize_get).post(authorize_post))
            .with_state(authorize)
            .merge(
                Router::new()
                    .route(TOKEN_ROUTE, post(token_handler))
                    .with_state(token),
            )
    }

    /// Removes expired codes, pending authorizations, and cached clients.
    ///
    /// Access tokens are not swept: an expired token is refused on use and
    /// its refresh token keeps working.
    ///
    /// # Errors
    ///
    /// Returns the first storage error encountered.
    pub async fn cleanup_expired(&self) -> AuthResult<CleanupStats> {
        let now = self.clock.now();
        let codes = self.store.cleanup_expired_codes(now).await?;
        let pending = self.store.cleanup_expired_pending(now).await?;
        self.clients.cleanup().await;

        if codes > 0 || pending > 0 {
            tracing::debug!(codes, pending, "Swept expired authorization state");
        }
        Ok(CleanupStats { codes, pending })
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::oauth::pending::PendingAuthorization;
    use crate::scopes::ScopeSet;
    use crate::testing::{StaticResolver, code_for, credentials, test_clock};

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let mut config = AuthConfig::default();
        config.session.cookie_name = String::new();

        let result = OAuthServer::builder(config)
            .resolver(Arc::new(StaticResolver::example()))
            .build();
        assert!(matches!(result, Err(AuthError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_configured_scopes_are_recognized() {
        let mut config = AuthConfig::default();
        config
            .scopes
            .insert("shelves".to_string(), "Read your shelves.".to_string());

        let server = OAuthServer::builder(config)
            .resolver(Arc::new(StaticResolver::example()))
            .build()
            .unwrap();
        let catalog = server.validator().scope_catalog();
        assert!(catalog.recognizes("user"));
        assert!(catalog.recognizes("shelves"));
        assert!(!catalog.recognizes("admin"));
    }

    #[tokio::test]
    async fn test_cleanup_expired_sweeps_codes_and_pending() {
        let clock = test_clock();
        let server = OAuthServer::builder(AuthConfig::default())
            .resolver(Arc::new(StaticResolver::example()))
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        let store = server.store().clone();

        store.save_code(&code_for(&clock)).await.unwrap();
        store
            .create_pending(&PendingAuthorization::new(
                ScopeSet::parse("user"),
                credentials(),
                clock.now(),
                Duration::minutes(10),
            ))
            .await
            .unwrap();

        assert_eq!(server.cleanup_expired().await.unwrap(), CleanupStats::default());

        clock.advance(Duration::minutes(11));
        let stats = server.cleanup_expired().await.unwrap();
        assert_eq!(stats, CleanupStats { codes: 1, pending: 1 });
        assert_eq!(store.code_count(), 0);
        assert_eq!(store.pending_count(), 0);
    }
}
