//! Admission control.
//!
//! - [`ClientWindowTable`]: one counting window per client, behind one lock
//! - [`FixedWindowLimiter`]: allow/deny decisions and the background reaper
//!
//! The HTTP side lives in [`crate::middleware::rate_limit`].

pub mod limiter;
pub mod window;

pub use limiter::{FixedWindowLimiter, RateLimitConfig, RateLimitConfigBuilder, MAX_WINDOW};
pub use window::{ClientKey, ClientWindowTable, RateLimitDecision, WindowState};
