//! API request handlers.
//!
//! Handlers return `Result<impl IntoResponse, GateError>` so failures render
//! through the `IntoResponse` implementation on `GateError`.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::warn;

use super::{ApiResponse, AppState};
use crate::authz::PredefinedRole;
use crate::cache::CacheStats;
use crate::error::GateError;
use crate::identity::UserId;
use crate::middleware::CurrentIdentity;

// ═══════════════════════════════════════════════════════════════════════════════
// Health Check
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub env: String,
    pub version: &'static str,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(HealthStatus {
        status: "ok",
        env: state.environment.clone(),
        version: env!("CARGO_PKG_VERSION"),
    }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Users
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn current_user(CurrentIdentity(identity): CurrentIdentity) -> impl IntoResponse {
    Json(ApiResponse::success(identity))
}

/// Fetch a user. Callers may read themselves; reading others needs `moderator`.
pub async fn get_user(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, GateError> {
    let target: UserId = raw_id
        .parse()
        .map_err(|_| GateError::not_found("user", raw_id.as_str()))?;

    state
        .gate
        .authorize_owned(&caller, &target, PredefinedRole::Moderator.name())
        .await?;

    let identity = if caller.owns(&target) {
        caller
    } else {
        state.resolver.resolve(target).await?.into_identity()
    };

    Ok(Json(ApiResponse::success(identity)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Operator Endpoints
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
pub struct DebugVars {
    pub rate_limit: RateLimitVars,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
}

#[derive(Debug, Serialize)]
pub struct RateLimitVars {
    pub enabled: bool,
    pub limit: u64,
    #[serde(with = "humantime_serde")]
    pub window: std::time::Duration,
    pub tracked_clients: usize,
}

pub async fn debug_vars(State(state): State<AppState>) -> impl IntoResponse {
    let limiter = &state.limiter;
    let cache = match state.resolver.cache() {
        Some(cache) => match cache.stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!(error = %e, "cache stats unavailable");
                None
            }
        },
        None => None,
    };

    Json(ApiResponse::success(DebugVars {
        rate_limit: RateLimitVars {
            enabled: limiter.config().enabled,
            limit: limiter.limit(),
            window: limiter.window(),
            tracked_clients: limiter.tracked_clients(),
        },
        cache,
    }))
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
