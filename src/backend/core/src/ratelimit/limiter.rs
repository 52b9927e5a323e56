//! Fixed-window admission control.
//!
//! Features:
//! - Per-client budget of `limit` requests per `window`
//! - Window anchored to the first request after the previous one closed
//! - Background reaper that forgets idle clients, stopped via cancellation
//! - Decision and table-size metrics
//!
//! # Example
//!
//! ```rust,ignore
//! use feedgate_core::ratelimit::{FixedWindowLimiter, RateLimitConfig};
//!
//! let limiter = Arc::new(FixedWindowLimiter::new(
//!     RateLimitConfig::builder().limit(20).window(Duration::from_secs(5)).build(),
//! )?);
//! let reaper = limiter.spawn_reaper(shutdown.child_token());
//!
//! let decision = limiter.allow(&ClientKey::from("203.0.113.9"));
//! ```

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::window::{ClientKey, ClientWindowTable, RateLimitDecision};
use crate::error::{GateError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// Longest accepted window or sweep interval. Keeps `Instant + Duration` in range.
pub const MAX_WINDOW: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Requests admitted per window
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Window length
    #[serde(default = "default_window", with = "humantime_serde")]
    pub window: Duration,

    /// How often the reaper sweeps closed windows (defaults to `window`)
    #[serde(default, with = "humantime_serde")]
    pub sweep_interval: Option<Duration>,

    /// Honour forwarding headers when deriving the client key
    #[serde(default)]
    pub trust_proxy_headers: bool,

    /// Headers consulted, in order, when `trust_proxy_headers` is set
    #[serde(default = "default_proxy_headers")]
    pub proxy_headers: Vec<String>,
}

fn default_enabled() -> bool { true }
fn default_limit() -> u64 { 20 }
fn default_window() -> Duration { Duration::from_secs(5) }
fn default_proxy_headers() -> Vec<String> {
    vec!["X-Forwarded-For".to_string(), "X-Real-IP".to_string()]
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            limit: default_limit(),
            window: default_window(),
            sweep_interval: None,
            trust_proxy_headers: false,
            proxy_headers: default_proxy_headers(),
        }
    }
}

impl RateLimitConfig {
    /// Create a new configuration builder.
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder {
            config: Self::default(),
        }
    }

    /// Effective reaper period.
    pub fn effective_sweep_interval(&self) -> Duration {
        self.sweep_interval.unwrap_or(self.window)
    }

    /// Reject settings the limiter cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.window.is_zero() {
            return Err(GateError::invalid_configuration("rate limit window must be non-zero"));
        }
        if self.effective_sweep_interval().is_zero() {
            return Err(GateError::invalid_configuration("rate limit sweep interval must be non-zero"));
        }
        if self.window > MAX_WINDOW || self.effective_sweep_interval() > MAX_WINDOW {
            return Err(GateError::invalid_configuration(format!(
                "rate limit window and sweep interval must not exceed {:?}",
                MAX_WINDOW
            )));
        }
        Ok(())
    }
}

/// Builder for rate limit configuration.
pub struct RateLimitConfigBuilder {
    config: RateLimitConfig,
}

impl RateLimitConfigBuilder {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.config.limit = limit;
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.config.window = window;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = Some(interval);
        self
    }

    pub fn trust_proxy_headers(mut self, trust: bool) -> Self {
        self.config.trust_proxy_headers = trust;
        self
    }

    pub fn build(self) -> RateLimitConfig {
        self.config
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Limiter
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-client fixed-window rate limiter.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    table: ClientWindowTable,
    config: RateLimitConfig,
}

impl FixedWindowLimiter {
    /// Create a limiter, rejecting a zero window.
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            table: ClientWindowTable::new(),
            config,
        })
    }

    /// Shorthand for an enabled limiter with default sweeping.
    pub fn with_limits(limit: u64, window: Duration) -> Result<Self> {
        Self::new(RateLimitConfig::builder().limit(limit).window(window).build())
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn limit(&self) -> u64 {
        self.config.limit
    }

    pub fn window(&self) -> Duration {
        self.config.window
    }

    /// Number of clients with an open or not-yet-reaped window.
    pub fn tracked_clients(&self) -> usize {
        self.table.len()
    }

    /// Decide whether one request from `key` may proceed now.
    pub fn allow(&self, key: &ClientKey) -> RateLimitDecision {
        self.allow_at(key, Instant::now())
    }

    /// Decide whether one request from `key` may proceed at `now`.
    pub fn allow_at(&self, key: &ClientKey, now: Instant) -> RateLimitDecision {
        if !self.config.enabled {
            return RateLimitDecision::allow(self.config.limit);
        }

        let decision = if self.config.limit == 0 {
            RateLimitDecision::deny(self.config.window)
        } else {
            self.table.admit(key, self.config.limit, self.config.window, now)
        };

        if decision.allowed {
            counter!("feedgate_ratelimit_decisions_total", "decision" => "allowed").increment(1);
        } else {
            counter!("feedgate_ratelimit_decisions_total", "decision" => "denied").increment(1);
            debug!(
                client = %key,
                retry_after_ms = decision.retry_after.as_millis() as u64,
                "request denied by rate limiter"
            );
        }

        decision
    }

    /// Remove every closed window.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let removed = self.table.sweep(now);
        let remaining = self.table.len();

        counter!("feedgate_ratelimit_reaped_total").increment(removed as u64);
        gauge!("feedgate_ratelimit_clients").set(remaining as f64);

        if removed > 0 {
            debug!(removed, remaining, "reaped idle rate limit windows");
        }
        removed
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Background Reaper
    // ═══════════════════════════════════════════════════════════════════════════

    /// Spawn the reaper. It sweeps every `sweep_interval` until `shutdown` is cancelled.
    pub fn spawn_reaper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        let period = self.config.effective_sweep_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(period_ms = period.as_millis() as u64, "rate limit reaper started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        limiter.sweep_expired();
                    }
                }
            }
            info!("rate limit reaper stopped");
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
