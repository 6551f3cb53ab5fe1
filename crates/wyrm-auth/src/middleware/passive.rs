//! Best-effort bearer authentication for every route.
//!
//! Runs before routing. A request that already has a browser user keeps it;
//! otherwise a valid bearer token attaches its owner. Failures leave the
//! request anonymous and never block it. The OAuth endpoints themselves are
//! skipped.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::identity::{CurrentUserProvider, UserIdentity};
use crate::scopes::ScopeSet;

use super::auth::{ResourceGuard, bearer_token};
use super::types::AuthContext;

/// Requests under this prefix are never passively authenticated.
pub const OAUTH_PATH_PREFIX: &str = "/oauth";

/// State for [`passive_bearer_auth`].
#[derive(Clone)]
pub struct PassiveAuthState {
    guard: ResourceGuard,
    users: Arc<dyn CurrentUserProvider>,
}

impl PassiveAuthState {
    /// Creates the middleware state.
    pub fn new(guard: ResourceGuard, users: Arc<dyn CurrentUserProvider>) -> Self {
        Self { guard, users }
    }
}

/// Attaches an identity to the request when one can be established.
///
/// On success the request extensions carry a [`UserIdentity`], plus an
/// [`AuthContext`] when the identity came from a bearer token.
///
/// ```ignore
/// let app = Router::new()
///     .route("/api/v1/whoami", get(whoami))
///     .layer(axum::middleware::from_fn_with_state(passive_state, passive_bearer_auth));
/// ```
pub async fn passive_bearer_auth(
    State(state): State<PassiveAuthState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.uri().path().starts_with(OAUTH_PATH_PREFIX) {
        return next.run(req).await;
    }

    let (mut parts, body) = req.into_parts();

    if let Some(user) = state.users.current_user(&parts).await {
        parts.extensions.insert(user);
    } else if bearer_token(&parts.headers).is_some() {
        match state.guard.check(&parts.headers, &ScopeSet::default()).await {
            Ok(context) => {
                tracing::trace!(username = %context.username(), "Passive bearer authentication");
                parts.extensions.insert(context.user.clone());
                parts.extensions.insert(context);
            }
            Err(reason) => {
                tracing::trace!(reason = %reason, "Passive bearer authentication skipped");
            }
        }
    }

    next.run(Request::from_parts(parts, body)).await
}

/// The identity attached by passive authentication or a scoped extractor,
/// if any. Never rejects.
///
/// ```ignore
/// async fn whoami(Identity(user): Identity) -> String {
///     user.map_or_else(|| "anonymous".to_string(), |u| u.username)
/// }
/// ```
pub struct Identity(pub Option<UserIdentity>);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Identity(parts.extensions.get::<UserIdentity>().cloned()))
    }
}

/// The bearer token context attached by passive authentication, if any.
pub struct OptionalBearer(pub Option<AuthContext>);

impl<S> FromRequestParts<S> for OptionalBearer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalBearer(parts.extensions.get::<AuthContext>().cloned()))
    }
}
