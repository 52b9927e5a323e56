//! HTTP API for feedgate.
//!
//! Routes (all behind the rate limiter):
//!
//! | Route                | Guard         |
//! |----------------------|---------------|
//! | `GET /v1/health`     | none          |
//! | `GET /v1/debug/vars` | Basic auth    |
//! | `GET /v1/users/me`   | Bearer token  |
//! | `GET /v1/users/:id`  | Bearer token, owner or `moderator` |
//! | `GET /metrics`       | none          |

mod handlers;

use axum::{middleware as axum_middleware, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::TokenAuthenticator;
use crate::authz::AuthorizationGate;
use crate::identity::IdentityResolver;
use crate::middleware::{require_basic_auth, AuthLayer, BasicCredentials, RateLimitLayer};
use crate::ratelimit::FixedWindowLimiter;
use crate::telemetry::MetricsRegistry;

pub use handlers::{DebugVars, HealthStatus, RateLimitVars};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub environment: String,
    pub limiter: Arc<FixedWindowLimiter>,
    pub resolver: IdentityResolver,
    pub gate: AuthorizationGate,
    pub authenticator: Arc<TokenAuthenticator>,
    pub admin: BasicCredentials,
    pub metrics: MetricsRegistry,
}

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Build the API router.
///
/// ```rust,ignore
/// let app = build_router(state);
/// axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
/// ```
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let users = Router::new()
        .route("/me", get(handlers::current_user))
        .route("/:id", get(handlers::get_user))
        .layer(AuthLayer::new(state.authenticator.clone(), state.resolver.clone()));

    let debug = Router::new()
        .route("/vars", get(handlers::debug_vars))
        .layer(axum_middleware::from_fn_with_state(state.admin.clone(), require_basic_auth));

    let v1 = Router::new()
        .route("/health", get(handlers::health))
        .nest("/users", users)
        .nest("/debug", debug);

    Router::new()
        .nest("/v1", v1)
        .route("/metrics", get(handlers::prometheus_metrics))
        .layer(RateLimitLayer::new(state.limiter.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
