//! Authentication context attached to requests.

use time::OffsetDateTime;

use crate::identity::UserIdentity;
use crate::scopes::ScopeSet;
use crate::token::BearerToken;

/// Who a validated bearer token speaks for.
///
/// Produced by the resource guard and by passive authentication, and stored
/// in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Resource owner.
    pub user: UserIdentity,

    /// Client the token was issued to.
    pub client_id: String,

    /// Granted scopes.
    pub scope: ScopeSet,

    /// Expiration date of the presented token.
    pub expires_at: OffsetDateTime,
}

impl AuthContext {
    /// Returns `true` if the token was granted `scope`.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.contains(scope)
    }

    /// The owner's local handle.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.user.username
    }
}

impl From<BearerToken> for AuthContext {
    fn from(token: BearerToken) -> Self {
        Self {
            user: token.user,
            client_id: token.client_id,
            scope: token.scope,
            expires_at: token.expires_at,
        }
    }
}
