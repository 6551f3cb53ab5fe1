//! TTL cache in front of a [`ClientResolver`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::types::Client;

use super::error::DiscoveryError;
use super::resolver::ClientResolver;

struct CachedClient {
    client: Client,
    fetched_at: OffsetDateTime,
}

/// Caches successful resolutions per client id.
///
/// Failures are never cached, so a client whose document was briefly
/// unreachable is retried on the next request. A zero TTL disables the
/// cache entirely.
pub struct CachedClientResolver {
    inner: Arc<dyn ClientResolver>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    cache: RwLock<HashMap<String, CachedClient>>,
}

impl CachedClientResolver {
    /// Wraps `inner` with a cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(inner: Arc<dyn ClientResolver>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            inner,
            clock,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn is_fresh(&self, entry: &CachedClient, now: OffsetDateTime) -> bool {
        now - entry.fetched_at < self.ttl
    }

    /// Drops the cached entry for `client_id`.
    pub async fn invalidate(&self, client_id: &str) {
        self.cache.write().await.remove(client_id);
        tracing::debug!(client_id = %client_id, "Invalidated cached client");
    }

    /// Removes every expired entry.
    pub async fn cleanup(&self) {
        let now = self.clock.now();
        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|_, entry| now - entry.fetched_at < self.ttl);
        let removed = before - cache.len();
        if removed > 0 {
            tracing::debug!(removed, "Cleaned up expired client cache entries");
        }
    }

    /// Number of cached entries, fresh or not.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Returns `true` if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}

#[async_trait]
impl ClientResolver for CachedClientResolver {
    async fn resolve(&self, client_id: &str) -> Result<Client, DiscoveryError> {
        if self.ttl.is_zero() {
            return self.inner.resolve(client_id).await;
        }

        let now = self.clock.now();
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(client_id)
                && self.is_fresh(entry, now)
            {
                tracing::trace!(client_id = %client_id, "Client cache hit");
                return Ok(entry.client.clone());
            }
        }

        let client = self.inner.resolve(client_id).await?;

        self.cache.write().await.insert(
            client_id.to_string(),
            CachedClient {
                client: client.clone(),
                fetched_at: now,
            },
        );

        Ok(client)
    }
}
