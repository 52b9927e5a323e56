//! Caching layer.
//!
//! - [`backend`]: byte-level backends (in-memory, Redis)
//! - [`identity`]: the typed identity cache used by the resolver
//!
//! # Example
//!
//! ```rust,ignore
//! use feedgate_core::cache::{build_backend, CacheConfig, IdentityCache, RedisConfig};
//!
//! let config = CacheConfig::default();
//! let backend = build_backend(&RedisConfig::default(), &config.memory).await?;
//! let cache = IdentityCache::new(backend, config.identity_ttl);
//! ```

pub mod backend;
pub mod identity;

pub use backend::{CacheBackend, CacheStats, InMemoryBackend, InMemoryConfig, RedisBackend, RedisConfig};
pub use identity::{CachedIdentity, IdentityCache};

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::Result;

/// Identity cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Consult the cache before the durable store
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// How long a snapshot may be served (bounds staleness)
    #[serde(default = "default_identity_ttl", with = "humantime_serde")]
    pub identity_ttl: Duration,

    /// Deadline applied to each cache or store call made by the resolver
    #[serde(default = "default_operation_timeout", with = "humantime_serde")]
    pub operation_timeout: Duration,

    /// In-process backend settings (used when Redis is disabled)
    #[serde(default)]
    pub memory: InMemoryConfig,
}

fn default_enabled() -> bool { true }
fn default_identity_ttl() -> Duration { Duration::from_secs(60) }
fn default_operation_timeout() -> Duration { Duration::from_secs(2) }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            identity_ttl: default_identity_ttl(),
            operation_timeout: default_operation_timeout(),
            memory: InMemoryConfig::default(),
        }
    }
}

/// Pick the cache backend: Redis when enabled, otherwise in-process.
pub async fn build_backend(redis: &RedisConfig, memory: &InMemoryConfig) -> Result<Arc<dyn CacheBackend>> {
    if redis.enabled {
        let backend = RedisBackend::connect(redis.clone()).await?;
        Ok(Arc::new(backend))
    } else {
        info!("redis disabled, using in-process identity cache");
        Ok(Arc::new(InMemoryBackend::new(memory.clone())))
    }
}
