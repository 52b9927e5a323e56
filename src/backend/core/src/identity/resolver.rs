//! Cache-aside identity resolution.
//!
//! 1. Look the identity up in the [`IdentityCache`]; a hit returns at once.
//!    A failed or timed-out cache read fails the resolution; only a miss
//!    falls through to the store.
//! 2. On a miss, fetch it from the [`IdentityStore`]. `NotFound` propagates
//!    and is never cached.
//! 3. Write the fetched identity back to the cache before returning it. A
//!    failed write does not fail the read: it is reported through
//!    [`Resolution::FetchedUncached`] with a `CacheWriteFailure` error.
//!
//! Every cache or store call is bounded by the operation timeout; a whole
//! resolution can additionally be bounded with [`IdentityResolver::resolve_within`].
//! Concurrent misses for one user may each hit the store and each rewrite the
//! cache with the same value.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, instrument, warn};

use super::model::{Identity, UserId};
use super::store::IdentityStore;
use crate::cache::IdentityCache;
use crate::error::{GateError, Result};

const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

// ═══════════════════════════════════════════════════════════════════════════════
// Resolution
// ═══════════════════════════════════════════════════════════════════════════════

/// Where a resolved identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Cache,
    Store,
}

/// Result of a successful resolution.
#[derive(Debug)]
pub enum Resolution {
    /// Served from the cache without touching the store.
    CacheHit(Identity),
    /// Fetched from the store and written to the cache (or no cache configured).
    Fetched(Identity),
    /// Fetched from the store, but the cache could not be populated.
    FetchedUncached { identity: Identity, error: GateError },
}

impl Resolution {
    pub fn identity(&self) -> &Identity {
        match self {
            Self::CacheHit(identity) | Self::Fetched(identity) => identity,
            Self::FetchedUncached { identity, .. } => identity,
        }
    }

    pub fn into_identity(self) -> Identity {
        match self {
            Self::CacheHit(identity) | Self::Fetched(identity) => identity,
            Self::FetchedUncached { identity, .. } => identity,
        }
    }

    pub fn source(&self) -> ResolutionSource {
        match self {
            Self::CacheHit(_) => ResolutionSource::Cache,
            Self::Fetched(_) | Self::FetchedUncached { .. } => ResolutionSource::Store,
        }
    }

    /// The classified cache-population failure, if any.
    pub fn cache_write_error(&self) -> Option<&GateError> {
        match self {
            Self::FetchedUncached { error, .. } => Some(error),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resolver
// ═══════════════════════════════════════════════════════════════════════════════

/// Turns a user id into an [`Identity`], preferring the cache.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
    cache: Option<IdentityCache>,
    operation_timeout: Duration,
}

impl IdentityResolver {
    /// Create a resolver that always reads the store.
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self {
            store,
            cache: None,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    pub fn with_cache(mut self, cache: IdentityCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn cache(&self) -> Option<&IdentityCache> {
        self.cache.as_ref()
    }

    /// Resolve `id`, each backend call bounded by the operation timeout.
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn resolve(&self, id: UserId) -> Result<Resolution> {
        if let Some(cache) = &self.cache {
            match self.bounded("identity cache read", cache.get(&id)).await {
                Ok(Some(entry)) => {
                    counter!("feedgate_identity_resolutions_total", "source" => "cache").increment(1);
                    debug!(age_ms = entry.age().as_millis() as u64, "identity served from cache");
                    return Ok(Resolution::CacheHit(entry.identity));
                }
                Ok(None) => {}
                Err(error) => {
                    counter!("feedgate_identity_cache_read_failures_total").increment(1);
                    warn!(error = %error, "identity cache read failed");
                    return Err(error);
                }
            }
        }

        let identity = self
            .bounded("identity store read", self.store.get_by_id(id))
            .await?;

        let Some(cache) = &self.cache else {
            counter!("feedgate_identity_resolutions_total", "source" => "store").increment(1);
            return Ok(Resolution::Fetched(identity));
        };

        match self.bounded("identity cache write", cache.set(&identity)).await {
            Ok(()) => {
                counter!("feedgate_identity_resolutions_total", "source" => "store").increment(1);
                Ok(Resolution::Fetched(identity))
            }
            Err(source) => {
                let error = GateError::cache_write_failure(IdentityCache::key_for(&id)).with_source(source);
                counter!("feedgate_identity_resolutions_total", "source" => "store_uncached").increment(1);
                counter!("feedgate_identity_cache_write_failures_total").increment(1);
                warn!(error = %error, "identity resolved but cache population failed");
                Ok(Resolution::FetchedUncached { identity, error })
            }
        }
    }

    /// Resolve `id`, failing with `Timeout` if the whole resolution exceeds `budget`.
    pub async fn resolve_within(&self, id: UserId, budget: Duration) -> Result<Resolution> {
        match tokio::time::timeout(budget, self.resolve(id)).await {
            Ok(result) => result,
            Err(_) => Err(GateError::timeout("identity resolution", budget)),
        }
    }

    /// Drop the cached snapshot for `id` so the next resolution reads the store.
    pub async fn invalidate(&self, id: UserId) -> Result<()> {
        if let Some(cache) = &self.cache {
            self.bounded("identity cache invalidate", cache.invalidate(&id)).await?;
        }
        Ok(())
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(GateError::timeout(operation, self.operation_timeout)),
        }
    }
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("cache", &self.cache)
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
