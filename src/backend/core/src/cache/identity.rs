//! Typed identity cache on top of a byte-level [`CacheBackend`].
//!
//! Entries are JSON snapshots keyed `user-{uuid}` with a fixed TTL. A snapshot
//! can be staler than the durable store by at most that TTL.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use super::backend::{CacheBackend, CacheStats};
use crate::error::Result;
use crate::identity::{Identity, UserId};

/// Snapshot of an identity as stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedIdentity {
    pub identity: Identity,
    pub inserted_at: DateTime<Utc>,
}

impl CachedIdentity {
    /// Time since the snapshot was taken.
    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.inserted_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Cache of resolved identities.
#[derive(Clone)]
pub struct IdentityCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl IdentityCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// Cache key for a user.
    pub fn key_for(id: &UserId) -> String {
        format!("user-{}", id)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Look up a snapshot. Undecodable entries are reported as a miss.
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn get(&self, id: &UserId) -> Result<Option<CachedIdentity>> {
        let key = Self::key_for(id);
        let Some(bytes) = self.backend.get(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_slice::<CachedIdentity>(&bytes) {
            Ok(entry) if entry.identity.id == *id => Ok(Some(entry)),
            Ok(entry) => {
                warn!(key = %key, found = %entry.identity.id, "cache entry belongs to another user");
                Ok(None)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "discarding malformed cache entry");
                Ok(None)
            }
        }
    }

    /// Store a snapshot of `identity`. The whole value is written in one command.
    #[instrument(skip(self, identity), fields(user_id = %identity.id))]
    pub async fn set(&self, identity: &Identity) -> Result<()> {
        let entry = CachedIdentity {
            identity: identity.clone(),
            inserted_at: Utc::now(),
        };
        let bytes = serde_json::to_vec(&entry)?;
        self.backend
            .set(&Self::key_for(&identity.id), &bytes, self.ttl)
            .await
    }

    /// Drop the snapshot for `id`, if any.
    pub async fn invalidate(&self, id: &UserId) -> Result<bool> {
        self.backend.delete(&Self::key_for(id)).await
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        self.backend.stats().await
    }
}

impl std::fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCache")
            .field("backend", &self.backend.name())
            .field("ttl", &self.ttl)
            .finish()
    }
}
