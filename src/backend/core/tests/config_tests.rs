//! Tests for loading configuration from files.

use std::io::Write;
use std::time::Duration;

use feedgate_core::config::Config;
use feedgate_core::error::ErrorCode;
use feedgate_core::telemetry::LogFormat;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_full_file() {
    let file = write_config(
        r#"
        [server]
        port = 9090
        environment = "production"
        shutdown_timeout = "10s"

        [database]
        url = "postgres://feedgate:secret@db:5432/feedgate"
        max_connections = 10
        min_connections = 2

        [redis]
        enabled = true
        url = "redis://cache:6379"

        [cache]
        identity_ttl = "2m"

        [rate_limit]
        limit = 5
        window = "5s"
        trust_proxy_headers = true

        [auth]
        jwt_secret = "file-secret"
        admin_password = "ops"

        [observability]
        log_format = "compact"
        log_include_location = true
        metrics_enabled = false

        [observability.log_modules]
        sqlx = "warn"
        "#,
    );

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.server.bind_address(), "0.0.0.0:9090");
    assert_eq!(config.server.shutdown_timeout, Duration::from_secs(10));
    assert_eq!(config.database.max_connections, 10);
    assert!(config.redis.enabled);
    assert_eq!(config.cache.identity_ttl, Duration::from_secs(120));
    assert_eq!(config.rate_limit.limit, 5);
    assert!(config.rate_limit.trust_proxy_headers);
    assert_eq!(config.auth.admin_password, "ops");
    assert_eq!(config.observability.log_format, LogFormat::Compact);
    assert!(!config.observability.metrics_enabled);
    let logging = config.observability.logging();
    assert!(logging.include_location);
    assert_eq!(logging.module_levels.get("sqlx").map(String::as_str), Some("warn"));
}

#[test]
fn test_invalid_pool_bounds_are_rejected() {
    let file = write_config(
        r#"
        [database]
        url = "postgres://localhost/feedgate"
        max_connections = 2
        min_connections = 5

        [auth]
        jwt_secret = "x"
        "#,
    );

    let err = Config::from_file(file.path()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidConfiguration);
}

#[test]
fn test_missing_file_is_an_error() {
    let err = Config::from_file("/nonexistent/feedgate.toml").unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidConfiguration);
}
