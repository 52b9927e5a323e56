//! Configuration management.
//!
//! Values come from `FEEDGATE__`-prefixed environment variables (with `__`
//! between nested keys, e.g. `FEEDGATE__RATE_LIMIT__LIMIT=20`), optionally
//! layered over a config file. A `.env` file is read first if present.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::auth::AuthConfig;
use crate::cache::{CacheConfig, RedisConfig};
use crate::error::{GateError, Result};
use crate::ratelimit::RateLimitConfig;
use crate::retry::RetryPolicy;
use crate::telemetry::ObservabilityConfig;

const ENV_PREFIX: &str = "FEEDGATE";
const ENV_SEPARATOR: &str = "__";

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// Identity cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Admission control
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Token and operator credentials
    #[serde(default)]
    pub auth: AuthConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Deployment environment (development, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Upper bound on graceful shutdown
    #[serde(default = "default_shutdown_timeout", with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Deadline for acquiring a connection and for each query
    #[serde(default = "default_query_timeout", with = "humantime_serde")]
    pub query_timeout: Duration,

    /// Retries for the initial connection at startup
    #[serde(default)]
    pub connect_retry: RetryPolicy,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_environment() -> String { "development".to_string() }
fn default_shutdown_timeout() -> Duration { Duration::from_secs(5) }
fn default_max_connections() -> u32 { 30 }
fn default_min_connections() -> u32 { 5 }
fn default_query_timeout() -> Duration { Duration::from_secs(5) }

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
            .build()?;

        Self::finish(config)
    }

    /// Load from a config file, with the environment taking precedence.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
            .build()?;

        Self::finish(config)
    }

    fn finish(config: config::Config) -> Result<Self> {
        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the service cannot start with.
    pub fn validate(&self) -> Result<()> {
        self.rate_limit.validate()?;

        if self.auth.jwt_secret.trim().is_empty() {
            return Err(GateError::invalid_configuration("auth.jwt_secret must be set"));
        }
        if self.cache.enabled && self.cache.identity_ttl.is_zero() {
            return Err(GateError::invalid_configuration("cache.identity_ttl must be non-zero"));
        }
        if self.cache.operation_timeout.is_zero() {
            return Err(GateError::invalid_configuration("cache.operation_timeout must be non-zero"));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(GateError::invalid_configuration(
                "database.min_connections exceeds database.max_connections",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn parse(toml: &str) -> Result<Config> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;
        Config::finish(config)
    }

    const MINIMAL: &str = r#"
        [database]
        url = "postgres://localhost/feedgate"

        [auth]
        jwt_secret = "change-me"
    "#;

    #[test]
    fn test_defaults() {
        let config = parse(MINIMAL).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.rate_limit.limit, 20);
        assert_eq!(config.rate_limit.window, Duration::from_secs(5));
        assert_eq!(config.rate_limit.effective_sweep_interval(), Duration::from_secs(5));
        assert_eq!(config.cache.identity_ttl, Duration::from_secs(60));
        assert!(!config.redis.enabled);
        assert_eq!(config.database.query_timeout, Duration::from_secs(5));
        assert_eq!(config.database.connect_retry.max_attempts, 3);
    }

    #[test]
    fn test_humantime_durations() {
        let config = parse(&format!(
            "{}\n[rate_limit]\nlimit = 5\nwindow = \"1m\"\nsweep_interval = \"30s\"\n",
            MINIMAL
        ))
        .unwrap();

        assert_eq!(config.rate_limit.limit, 5);
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
        assert_eq!(config.rate_limit.sweep_interval, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let err = parse(&format!("{}\n[rate_limit]\nwindow = \"0s\"\n", MINIMAL)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let err = parse("[database]\nurl = \"postgres://localhost/feedgate\"\n").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);
    }

    #[test]
    fn test_missing_database_is_rejected() {
        assert!(parse("[auth]\njwt_secret = \"x\"\n").is_err());
    }
}
