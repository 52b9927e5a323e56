//! Credentials: bearer tokens for users, Basic auth for operators.

pub mod token;

pub use token::{Claims, TokenAuthenticator};

use serde::Deserialize;
use std::time::Duration;

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for HS256 tokens
    #[serde(default)]
    pub jwt_secret: String,

    /// Expected `iss` claim
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Expected `aud` claim
    #[serde(default = "default_audience")]
    pub audience: String,

    /// Clock skew tolerated when checking `exp`/`nbf`
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,

    /// Lifetime of issued tokens
    #[serde(default = "default_token_ttl", with = "humantime_serde")]
    pub token_ttl: Duration,

    /// Basic auth user for operator endpoints
    #[serde(default = "default_admin_username")]
    pub admin_username: String,

    /// Basic auth password for operator endpoints
    #[serde(default)]
    pub admin_password: String,
}

fn default_issuer() -> String { "feedgate".to_string() }
fn default_audience() -> String { "feedgate".to_string() }
fn default_leeway_secs() -> u64 { 30 }
fn default_token_ttl() -> Duration { Duration::from_secs(3 * 24 * 60 * 60) }
fn default_admin_username() -> String { "admin".to_string() }

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: default_issuer(),
            audience: default_audience(),
            leeway_secs: default_leeway_secs(),
            token_ttl: default_token_ttl(),
            admin_username: default_admin_username(),
            admin_password: String::new(),
        }
    }
}
