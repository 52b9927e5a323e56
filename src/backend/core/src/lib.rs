#![allow(clippy::result_large_err)]
//! # Feedgate Core
//!
//! Request admission and identity gating for a social-feed HTTP backend.
//!
//! ## Architecture
//!
//! - **Rate limiting**: Fixed-window admission per client key, with a background reaper
//! - **Identity resolution**: Cache-aside lookup of identities over Redis or in-memory storage
//! - **Authorization**: Ownership-or-rank checks against a role directory
//! - **Authentication**: HS256 bearer tokens and Basic auth for operator endpoints
//! - **Telemetry**: Structured logging and Prometheus metrics

pub mod api;
pub mod auth;
pub mod authz;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod ratelimit;
pub mod retry;
pub mod telemetry;

pub use error::{ErrorCode, ErrorDetails, ErrorSeverity, GateError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::{build_router, AppState};
    pub use crate::auth::{AuthConfig, Claims, TokenAuthenticator};
    pub use crate::authz::{AuthorizationGate, AuthzOutcome, PredefinedRole, RoleDirectory};
    pub use crate::cache::{CacheBackend, CacheConfig, IdentityCache};
    pub use crate::error::{ErrorCode, ErrorDetails, ErrorSeverity, GateError, Result};
    pub use crate::identity::{Identity, IdentityResolver, IdentityStore, Resolution, Role, UserId};
    pub use crate::middleware::{AuthLayer, CurrentIdentity, RateLimitLayer};
    pub use crate::ratelimit::{ClientKey, FixedWindowLimiter, RateLimitConfig, RateLimitDecision};
}
