//! Prometheus metrics.
//!
//! Components record through the `metrics` facade; this module installs the
//! Prometheus recorder and renders the text exposition for `GET /metrics`.

use metrics::{describe_counter, describe_gauge, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

/// Handle for rendering recorded metrics.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    prometheus_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("prometheus_handle", &self.prometheus_handle.is_some())
            .finish()
    }
}

impl MetricsRegistry {
    /// A registry that renders nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.prometheus_handle.is_some()
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.prometheus_handle
            .as_ref()
            .map(|h| h.render())
            .unwrap_or_default()
    }
}

/// Install the global Prometheus recorder.
///
/// # Errors
///
/// Fails if a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> anyhow::Result<MetricsRegistry> {
    if !config.enabled {
        return Ok(MetricsRegistry::disabled());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metric_descriptions();

    tracing::info!("metrics initialized");
    Ok(MetricsRegistry {
        prometheus_handle: Some(handle),
    })
}

fn register_metric_descriptions() {
    describe_counter!(
        "feedgate_ratelimit_decisions_total",
        "Admission decisions by outcome"
    );
    describe_gauge!(
        "feedgate_ratelimit_clients",
        Unit::Count,
        "Clients with a tracked window after the last sweep"
    );
    describe_counter!(
        "feedgate_ratelimit_reaped_total",
        "Idle client windows removed by the reaper"
    );
    describe_counter!(
        "feedgate_identity_resolutions_total",
        "Identity resolutions by source"
    );
    describe_counter!(
        "feedgate_identity_cache_read_failures_total",
        "Cache reads that failed and fell back to the store"
    );
    describe_counter!(
        "feedgate_identity_cache_write_failures_total",
        "Resolved identities that could not be cached"
    );
    describe_counter!(
        "feedgate_authz_decisions_total",
        "Ownership-aware authorization decisions by outcome"
    );
    describe_counter!("feedgate_auth_failures_total", "Rejected credentials by reason");
    describe_counter!("feedgate_errors_total", "Errors raised, by code");
    describe_counter!("feedgate_cache_hits_total", "Cache backend hits");
    describe_counter!("feedgate_cache_misses_total", "Cache backend misses");
    describe_counter!("feedgate_cache_sets_total", "Cache backend writes");
}
