//! Bearer token resource guard.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use wyrm_auth::middleware::{ResourceGuard, Scoped, UserScope};
//!
//! async fn me(Scoped(auth, ..): Scoped<UserScope>) -> String {
//!     format!("Hello, {}!", auth.username())
//! }
//!
//! let app = Router::new()
//!     .route("/api/v1/me", get(me))
//!     .with_state(guard);
//! ```

use std::marker::PhantomData;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};

use crate::oauth::validator::{RequestValidator, ValidationFailure};
use crate::scopes::{ScopeSet, USER_SCOPE};

use super::types::AuthContext;

// =============================================================================
// Guard
// =============================================================================

/// Validates bearer tokens against the scopes a protected operation needs.
///
/// Make it available to extractors via `FromRef`:
///
/// ```ignore
/// impl FromRef<AppState> for ResourceGuard {
///     fn from_ref(state: &AppState) -> Self {
///         state.guard.clone()
///     }
/// }
/// ```
#[derive(Clone)]
pub struct ResourceGuard {
    validator: RequestValidator,
}

impl ResourceGuard {
    /// Creates a guard over the token store the validator reads.
    #[must_use]
    pub fn new(validator: RequestValidator) -> Self {
        Self { validator }
    }

    /// Allows the request iff it carries a live bearer token granted every
    /// scope in `required`.
    ///
    /// # Errors
    ///
    /// Returns [`Forbidden`] for a missing, unknown, or expired token and for
    /// missing scopes alike.
    pub async fn guard(&self, headers: &HeaderMap, required: &ScopeSet) -> Result<AuthContext, Forbidden> {
        self.check(headers, required).await.map_err(|failure| {
            tracing::debug!(reason = %failure, "Bearer token rejected");
            Forbidden
        })
    }

    /// Like [`guard`](Self::guard), but reports why the token was refused.
    pub async fn check(
        &self,
        headers: &HeaderMap,
        required: &ScopeSet,
    ) -> Result<AuthContext, ValidationFailure> {
        let token = bearer_token(headers).ok_or(ValidationFailure::UnknownToken)?;
        let record = self.validator.validate_bearer_token(token, required).await?;
        Ok(AuthContext::from(record))
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
///
/// The scheme name is matched case-insensitively.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Generic refusal for protected operations.
///
/// Carries no detail so that callers cannot tell a missing token from an
/// expired one or from a missing scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Forbidden;

impl IntoResponse for Forbidden {
    fn into_response(self) -> Response {
        (StatusCode::FORBIDDEN, "Forbidden").into_response()
    }
}

// =============================================================================
// Scoped extractor
// =============================================================================

/// Scope requirements of a protected operation, declared as a type.
pub trait RequiredScopes: Send + Sync + 'static {
    /// Scopes the token must carry.
    const SCOPES: &'static [&'static str];

    /// The requirement as a scope set.
    fn scope_set() -> ScopeSet {
        Self::SCOPES.iter().copied().collect()
    }
}

/// Requires the `user` scope.
#[derive(Debug, Clone, Copy)]
pub struct UserScope;

impl RequiredScopes for UserScope {
    const SCOPES: &'static [&'static str] = &[USER_SCOPE];
}

/// Requires nothing beyond a live token.
#[derive(Debug, Clone, Copy)]
pub struct AnyScope;

impl RequiredScopes for AnyScope {
    const SCOPES: &'static [&'static str] = &[];
}

/// Axum extractor that runs the resource guard for `S`.
///
/// On success the resolved identity is also stored in the request
/// extensions for later extractors.
pub struct Scoped<S: RequiredScopes>(pub AuthContext, pub PhantomData<S>);

impl<S: RequiredScopes> Scoped<S> {
    /// The authenticated context.
    #[must_use]
    pub fn context(&self) -> &AuthContext {
        &self.0
    }
}

impl<St, S> FromRequestParts<St> for Scoped<S>
where
    St: Send + Sync,
    S: RequiredScopes,
    ResourceGuard: FromRef<St>,
{
    type Rejection = Forbidden;

    async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
        let guard = ResourceGuard::from_ref(state);
        let context = guard.guard(&parts.headers, &S::scope_set()).await?;
        parts.extensions.insert(context.clone());
        parts.extensions.insert(context.user.clone());
        Ok(Scoped(context, PhantomData))
    }
}
