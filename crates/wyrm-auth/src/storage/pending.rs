//! Pending authorization storage trait.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::oauth::pending::PendingAuthorization;

/// Storage trait for authorizations waiting on the consent page.
#[async_trait]
pub trait PendingAuthorizationStorage: Send + Sync {
    /// Stores a pending authorization.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be stored.
    async fn create_pending(&self, pending: &PendingAuthorization) -> AuthResult<()>;

    /// Removes and returns the pending authorization with `id`.
    ///
    /// Expired records are returned too; callers check `is_expired`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn take_pending(&self, id: Uuid) -> AuthResult<Option<PendingAuthorization>>;

    /// Deletes records that expired at or before `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired_pending(&self, now: OffsetDateTime) -> AuthResult<u64>;
}
