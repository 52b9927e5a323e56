//! Telemetry: structured logging and Prometheus metrics.
//!
//! # Example
//!
//! ```rust,ignore
//! use feedgate_core::telemetry::{init_telemetry, ObservabilityConfig};
//!
//! let metrics = init_telemetry(&ObservabilityConfig::default(), "production")?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{init_metrics, MetricsConfig, MetricsRegistry};

use std::collections::HashMap;

use serde::Deserialize;

/// The `observability` config section.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Per-module level overrides, e.g. `sqlx = "warn"`.
    #[serde(default)]
    pub log_modules: HashMap<String, String>,

    #[serde(default)]
    pub log_include_location: bool,

    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String { "info".to_string() }
fn default_metrics_enabled() -> bool { true }

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            log_modules: HashMap::new(),
            log_include_location: false,
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ObservabilityConfig {
    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            format: self.log_format,
            module_levels: self.log_modules.clone(),
            include_location: self.log_include_location,
        }
    }

    pub fn metrics(&self) -> MetricsConfig {
        MetricsConfig {
            enabled: self.metrics_enabled,
        }
    }
}

/// Initialize logging, then metrics.
pub fn init_telemetry(config: &ObservabilityConfig, environment: &str) -> anyhow::Result<MetricsRegistry> {
    init_logging(&config.logging(), environment)?;
    init_metrics(&config.metrics())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_section_carries_module_levels() {
        let config: ObservabilityConfig = serde_json::from_str(
            r#"{"log_level":"debug","log_modules":{"sqlx":"warn"},"log_include_location":true}"#,
        )
        .unwrap();

        let logging = config.logging();
        assert_eq!(logging.level, "debug");
        assert_eq!(logging.module_levels.get("sqlx").map(String::as_str), Some("warn"));
        assert!(logging.include_location);
        assert!(config.metrics().enabled);
    }
}
