//! In-memory storage backed by `DashMap`.

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::oauth::code::AuthorizationCode;
use crate::oauth::pending::PendingAuthorization;
use crate::token::BearerToken;

use super::{CodeStorage, PendingAuthorizationStorage, TokenStorage};

/// Implements every storage trait with concurrent hash maps.
///
/// Data lives as long as the process. Sharded locking makes the
/// compare-and-delete in [`CodeStorage::take_code`] atomic per code.
#[derive(Debug, Default)]
pub struct MemoryStore {
    codes: DashMap<String, AuthorizationCode>,
    tokens: DashMap<String, BearerToken>,
    refresh_index: DashMap<String, String>,
    pending: DashMap<Uuid, PendingAuthorization>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored codes.
    #[must_use]
    pub fn code_count(&self) -> usize {
        self.codes.len()
    }

    /// Number of stored token records.
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Number of pending authorizations.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl CodeStorage for MemoryStore {
    async fn save_code(&self, code: &AuthorizationCode) -> AuthResult<()> {
        self.codes.insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn find_code(&self, code: &str) -> AuthResult<Option<AuthorizationCode>> {
        Ok(self.codes.get(code).map(|entry| entry.value().clone()))
    }

    async fn take_code(
        &self,
        code: &str,
        client_id: &str,
    ) -> AuthResult<Option<AuthorizationCode>> {
        Ok(self
            .codes
            .remove_if(code, |_, stored| stored.client_id == client_id)
            .map(|(_, stored)| stored))
    }

    async fn cleanup_expired_codes(&self, now: OffsetDateTime) -> AuthResult<u64> {
        let before = self.codes.len();
        self.codes.retain(|_, code| !code.is_expired(now));
        Ok(before.saturating_sub(self.codes.len()) as u64)
    }
}

#[async_trait]
impl TokenStorage for MemoryStore {
    async fn save_token(&self, token: &BearerToken) -> AuthResult<()> {
        if let Some(ref refresh_token) = token.refresh_token {
            self.refresh_index
                .insert(refresh_token.clone(), token.token.clone());
        }
        self.tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn find_by_access_token(&self, access_token: &str) -> AuthResult<Option<BearerToken>> {
        Ok(self.tokens.get(access_token).map(|entry| entry.value().clone()))
    }

    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> AuthResult<Option<BearerToken>> {
        let Some(access_token) = self
            .refresh_index
            .get(refresh_token)
            .map(|entry| entry.value().clone())
        else {
            return Ok(None);
        };
        Ok(self
            .tokens
            .get(&access_token)
            .map(|entry| entry.value().clone()))
    }

    async fn delete_token(&self, access_token: &str) -> AuthResult<bool> {
        match self.tokens.remove(access_token) {
            Some((_, token)) => {
                if let Some(refresh_token) = token.refresh_token {
                    self.refresh_index.remove(&refresh_token);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl PendingAuthorizationStorage for MemoryStore {
    async fn create_pending(&self, pending: &PendingAuthorization) -> AuthResult<()> {
        self.pending.insert(pending.id, pending.clone());
        Ok(())
    }

    async fn take_pending(&self, id: Uuid) -> AuthResult<Option<PendingAuthorization>> {
        Ok(self.pending.remove(&id).map(|(_, pending)| pending))
    }

    async fn cleanup_expired_pending(&self, now: OffsetDateTime) -> AuthResult<u64> {
        let before = self.pending.len();
        self.pending.retain(|_, pending| !pending.is_expired(now));
        Ok(before.saturating_sub(self.pending.len()) as u64)
    }
}
