//! Cache backend implementations.
//!
//! This module provides pluggable byte-level cache backends:
//! - **InMemoryBackend**: process-local cache with per-entry expiry
//! - **RedisBackend**: shared cache using Redis `SET ... EX`
//!
//! A miss is `Ok(None)`; only transport or protocol problems are errors.

use crate::error::{GateError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use metrics::counter;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

// ═══════════════════════════════════════════════════════════════════════════════
// Cache Statistics
// ═══════════════════════════════════════════════════════════════════════════════

/// Cache statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Backend name
    pub backend: String,

    /// Total number of cache hits
    pub hits: u64,

    /// Total number of cache misses
    pub misses: u64,

    /// Entries currently held (None when the backend cannot tell cheaply)
    pub entries: Option<u64>,

    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
}

impl CacheStats {
    fn new(backend: &str, hits: u64, misses: u64, entries: Option<u64>) -> Self {
        let total = hits + misses;
        Self {
            backend: backend.to_string(),
            hits,
            misses,
            entries,
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Cache Backend Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Trait for cache backends.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get the bytes stored under `key`, or `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Delete a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Get cache statistics.
    async fn stats(&self) -> Result<CacheStats>;

    /// Get the backend name.
    fn name(&self) -> &'static str;
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-Memory Backend
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for the in-memory cache.
#[derive(Debug, Clone, Deserialize)]
pub struct InMemoryConfig {
    /// Maximum number of entries; expired entries are purged first when full
    #[serde(default = "default_max_capacity")]
    pub max_capacity: usize,
}

fn default_max_capacity() -> usize { 10_000 }

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
        }
    }
}

struct InMemoryEntry {
    data: Vec<u8>,
    expires_at: Instant,
}

/// Process-local cache backend.
pub struct InMemoryBackend {
    entries: DashMap<String, InMemoryEntry>,
    config: InMemoryConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryBackend {
    /// Create a new in-memory backend.
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Remove expired entries. Returns how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn make_room(&self, key: &str) {
        if self.entries.len() < self.config.max_capacity || self.entries.contains_key(key) {
            return;
        }
        let purged = self.cleanup_expired();
        if self.entries.len() >= self.config.max_capacity {
            // Still full of live entries: drop an arbitrary one.
            let victim = self.entries.iter().next().map(|e| e.key().clone());
            if let Some(victim) = victim {
                self.entries.remove(&victim);
            }
        }
        debug!(purged, "made room in in-memory cache");
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

#[async_trait]
impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        // The shard guard must be released before `remove_if` takes the write lock.
        let lookup = self
            .entries
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.data.clone()));

        let hit = match lookup {
            Some(Some(data)) => Some(data),
            Some(None) => {
                self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
                None
            }
            None => None,
        };

        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            counter!("feedgate_cache_hits_total", "backend" => "memory").increment(1);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            counter!("feedgate_cache_misses_total", "backend" => "memory").increment(1);
        }
        Ok(hit)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.make_room(key);
        self.entries.insert(
            key.to_string(),
            InMemoryEntry {
                data: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        counter!("feedgate_cache_sets_total", "backend" => "memory").increment(1);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn stats(&self) -> Result<CacheStats> {
        Ok(CacheStats::new(
            self.name(),
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            Some(self.entries.len() as u64),
        ))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Redis Backend
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for Redis cache.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Use Redis instead of the in-process cache
    #[serde(default)]
    pub enabled: bool,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Key prefix
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Connection timeout
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Command timeout
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,
}

fn default_redis_url() -> String { "redis://127.0.0.1:6379".to_string() }
fn default_key_prefix() -> String { "feedgate:".to_string() }
fn default_connect_timeout() -> Duration { Duration::from_secs(5) }
fn default_command_timeout() -> Duration { Duration::from_secs(2) }

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
            connect_timeout: default_connect_timeout(),
            command_timeout: default_command_timeout(),
        }
    }
}

/// Redis cache backend.
pub struct RedisBackend {
    conn: ConnectionManager,
    config: RedisConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RedisBackend {
    /// Connect to Redis and verify the connection with a PING.
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| GateError::invalid_configuration(format!("invalid redis url: {}", e)))?;

        let mut conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| GateError::timeout("redis connect", config.connect_timeout))??;

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!(url = %config.url, "redis cache backend connected");

        Ok(Self {
            conn,
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Build the full key with prefix.
    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.config.command_timeout, fut).await {
            Ok(result) => result.map_err(GateError::from),
            Err(_) => Err(GateError::timeout(operation, self.config.command_timeout)),
        }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let full_key = self.full_key(key);

        let data: Option<Vec<u8>> = self.bounded("redis GET", conn.get(&full_key)).await?;

        if data.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            counter!("feedgate_cache_hits_total", "backend" => "redis").increment(1);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            counter!("feedgate_cache_misses_total", "backend" => "redis").increment(1);
        }
        Ok(data)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let full_key = self.full_key(key);
        let ttl_secs = ttl.as_secs().max(1);

        self.bounded("redis SET", conn.set_ex::<_, _, ()>(&full_key, value, ttl_secs))
            .await?;

        counter!("feedgate_cache_sets_total", "backend" => "redis").increment(1);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let full_key = self.full_key(key);

        let deleted: i64 = self.bounded("redis DEL", conn.del(&full_key)).await?;
        Ok(deleted > 0)
    }

    async fn stats(&self) -> Result<CacheStats> {
        Ok(CacheStats::new(
            self.name(),
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            None,
        ))
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
