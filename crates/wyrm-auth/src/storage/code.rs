//! Authorization code storage trait.
//!
//! # Security Considerations
//!
//! - Never log authorization codes
//! - `take` must be atomic so a code can be redeemed at most once

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::oauth::code::AuthorizationCode;

/// Storage trait for authorization codes.
#[async_trait]
pub trait CodeStorage: Send + Sync {
    /// Stores a newly issued code.
    ///
    /// # Errors
    ///
    /// Returns an error if the code cannot be stored.
    async fn save_code(&self, code: &AuthorizationCode) -> AuthResult<()>;

    /// Finds a code without consuming it.
    ///
    /// Expired codes are returned too; callers check `is_expired`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_code(&self, code: &str) -> AuthResult<Option<AuthorizationCode>>;

    /// Atomically removes the code if it belongs to `client_id`.
    ///
    /// Of two concurrent callers for the same code, at most one receives
    /// `Some`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn take_code(&self, code: &str, client_id: &str)
    -> AuthResult<Option<AuthorizationCode>>;

    /// Deletes codes that expired at or before `now`.
    ///
    /// # Returns
    ///
    /// Returns the number of codes deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired_codes(&self, now: OffsetDateTime) -> AuthResult<u64>;
}
