//! Per-client fixed counting windows.
//!
//! A [`ClientWindowTable`] maps each [`ClientKey`] to at most one
//! [`WindowState`]. Every read and write goes through a single table-wide
//! mutex, so transitions for one client are linearized: two concurrent
//! requests can never both observe "window just reset".

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

// ═══════════════════════════════════════════════════════════════════════════════
// Client Key
// ═══════════════════════════════════════════════════════════════════════════════

/// Opaque identifier of a caller, usually its source IP.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ClientKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<IpAddr> for ClientKey {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Window State
// ═══════════════════════════════════════════════════════════════════════════════

/// Request count inside the current window of one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    /// Requests admitted in this window
    pub count: u64,
    /// Instant at which the window closes
    pub reset_at: Instant,
}

impl WindowState {
    /// Open a window anchored at `now` with the first request already counted.
    pub fn open(now: Instant, window: Duration) -> Self {
        Self {
            count: 1,
            reset_at: now + window,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.reset_at
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Decision
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// How long the caller should wait before retrying (zero when allowed)
    #[serde(with = "humantime_serde")]
    pub retry_after: Duration,
    /// Requests left in the current window
    pub remaining: u64,
}

impl RateLimitDecision {
    pub fn allow(remaining: u64) -> Self {
        Self {
            allowed: true,
            retry_after: Duration::ZERO,
            remaining,
        }
    }

    pub fn deny(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after,
            remaining: 0,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Table
// ═══════════════════════════════════════════════════════════════════════════════

/// Concurrent map of client key to window state.
#[derive(Debug, Default)]
pub struct ClientWindowTable {
    windows: Mutex<HashMap<String, WindowState>>,
}

impl ClientWindowTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request from `key` against a budget of `limit` per `window`.
    ///
    /// A missing or expired window is replaced by a fresh one anchored at
    /// `now`. `limit` must be non-zero; a zero budget never reaches the table.
    pub fn admit(&self, key: &ClientKey, limit: u64, window: Duration, now: Instant) -> RateLimitDecision {
        let mut windows = self.windows.lock();

        if let Some(state) = windows.get_mut(key.as_str()) {
            if !state.is_expired(now) {
                if state.count >= limit {
                    return RateLimitDecision::deny(state.reset_at.saturating_duration_since(now));
                }
                state.count += 1;
                return RateLimitDecision::allow(limit - state.count);
            }
            *state = WindowState::open(now, window);
            return RateLimitDecision::allow(limit.saturating_sub(1));
        }

        windows.insert(key.as_str().to_owned(), WindowState::open(now, window));
        RateLimitDecision::allow(limit.saturating_sub(1))
    }

    /// Drop every window that has closed by `now`. Returns how many were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, state| !state.is_expired(now));
        before - windows.len()
    }

    /// Snapshot of the window held for `key`.
    pub fn get(&self, key: &ClientKey) -> Option<WindowState> {
        self.windows.lock().get(key.as_str()).copied()
    }

    /// Number of clients currently tracked.
    pub fn len(&self) -> usize {
        self.windows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
