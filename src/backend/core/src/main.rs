//! Feedgate Server - Main entry point

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use feedgate_core::{
    api::{self, AppState},
    auth::TokenAuthenticator,
    authz::AuthorizationGate,
    cache::{self, IdentityCache},
    config::Config,
    db::{Database, PgIdentityStore, PgRoleDirectory},
    identity::IdentityResolver,
    middleware::BasicCredentials,
    ratelimit::FixedWindowLimiter,
    telemetry, GateError,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    let metrics = telemetry::init_telemetry(&config.observability, &config.server.environment)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.server.environment,
        "Starting Feedgate Server"
    );

    // Postgres
    let db = config
        .database
        .connect_retry
        .run(|| async {
            let db = Database::connect(&config.database).await?;
            db.ping().await?;
            Ok::<_, GateError>(db)
        })
        .await
        .context("failed to connect to postgres")?;
    tracing::info!(pool = ?db.pool_stats(), "postgres ready");

    // Identity resolution
    let mut resolver = IdentityResolver::new(Arc::new(PgIdentityStore::new(db.clone())))
        .with_operation_timeout(config.cache.operation_timeout);
    if config.cache.enabled {
        let backend = cache::build_backend(&config.redis, &config.cache.memory).await?;
        tracing::info!(backend = backend.name(), ttl = ?config.cache.identity_ttl, "identity cache enabled");
        resolver = resolver.with_cache(IdentityCache::new(backend, config.cache.identity_ttl));
    } else {
        tracing::warn!("identity cache disabled, every request reads postgres");
    }

    let gate = AuthorizationGate::new(Arc::new(PgRoleDirectory::new(db)));
    let authenticator = Arc::new(TokenAuthenticator::new(&config.auth)?);

    // Admission control
    let limiter = Arc::new(FixedWindowLimiter::new(config.rate_limit.clone())?);
    let shutdown = CancellationToken::new();
    let reaper = limiter.spawn_reaper(shutdown.clone());

    let app_state = AppState {
        environment: config.server.environment.clone(),
        limiter,
        resolver,
        gate,
        authenticator,
        admin: BasicCredentials::new(&config.auth.admin_username, &config.auth.admin_password),
        metrics,
    };

    let app = api::build_router(app_state);

    let addr: SocketAddr = config
        .server
        .bind_address()
        .parse()
        .context("invalid server bind address")?;
    tracing::info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    shutdown.cancel();
    if tokio::time::timeout(config.server.shutdown_timeout, reaper).await.is_err() {
        tracing::warn!(timeout = ?config.server.shutdown_timeout, "rate limit reaper did not stop in time");
    }
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
