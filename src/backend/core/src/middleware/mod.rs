//! HTTP middleware for feedgate.
pub mod auth;
pub mod basic_auth;
pub mod rate_limit;

pub use auth::{bearer_token, AuthLayer, CurrentIdentity};
pub use basic_auth::{require_basic_auth, BasicCredentials};
pub use rate_limit::{extract_client_key, RateLimitLayer};
