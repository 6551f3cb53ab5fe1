//! Bearer token storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::token::BearerToken;

/// Storage trait for issued bearer tokens.
///
/// Records are looked up both by access token (resource requests) and by
/// refresh token (the refresh grant).
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Persists a newly minted token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be stored.
    async fn save_token(&self, token: &BearerToken) -> AuthResult<()>;

    /// Finds a token record by its access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_access_token(&self, access_token: &str) -> AuthResult<Option<BearerToken>>;

    /// Finds a token record by its refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_refresh_token(&self, refresh_token: &str)
    -> AuthResult<Option<BearerToken>>;

    /// Deletes a token record, access and refresh token alike.
    ///
    /// # Returns
    ///
    /// Returns `true` if a record was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_token(&self, access_token: &str) -> AuthResult<bool>;
}
