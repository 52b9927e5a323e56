//! Admission control as a tower layer.
//!
//! Every request is charged against its client's fixed window before it
//! reaches a handler. Denied requests get `429 Too Many Requests` with
//! `Retry-After` (whole seconds, rounded up) and `X-RateLimit-Limit`.
//!
//! # Example
//!
//! ```rust,ignore
//! use feedgate_core::middleware::RateLimitLayer;
//!
//! let app = Router::new()
//!     .route("/v1/health", get(health))
//!     .layer(RateLimitLayer::new(limiter.clone()));
//! ```

use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    http::{HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};

use crate::error::GateError;
use crate::ratelimit::{ClientKey, FixedWindowLimiter, RateLimitConfig};

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Key used when neither the socket address nor a trusted header is known.
const UNKNOWN_CLIENT: &str = "unknown";

// ═══════════════════════════════════════════════════════════════════════════════
// Client Key Extraction
// ═══════════════════════════════════════════════════════════════════════════════

/// Derive the client key for a request.
///
/// Forwarding headers are only consulted when `trust_proxy_headers` is set;
/// otherwise the peer address is used.
pub fn extract_client_key(
    headers: &HeaderMap,
    remote_addr: Option<SocketAddr>,
    config: &RateLimitConfig,
) -> ClientKey {
    if config.trust_proxy_headers {
        if let Some(ip) = forwarded_ip(headers, &config.proxy_headers) {
            return ClientKey::from(ip);
        }
    }

    remote_addr
        .map(|addr| ClientKey::from(addr.ip()))
        .unwrap_or_else(|| ClientKey::from(UNKNOWN_CLIENT))
}

fn forwarded_ip(headers: &HeaderMap, names: &[String]) -> Option<IpAddr> {
    names.iter().find_map(|name| {
        let value = headers.get(name.as_str())?.to_str().ok()?;
        // X-Forwarded-For lists the originating client first
        value.split(',').next()?.trim().parse().ok()
    })
}

fn header_value(n: u64) -> HeaderValue {
    HeaderValue::from(n)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer and Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Rate limiting layer for Tower.
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<FixedWindowLimiter>,
}

impl RateLimitLayer {
    pub fn new(limiter: Arc<FixedWindowLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

/// Rate limiting service.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<FixedWindowLimiter>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let limiter = self.limiter.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let remote_addr = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0);
            let key = extract_client_key(request.headers(), remote_addr, limiter.config());

            let decision = limiter.allow(&key);
            let limit = header_value(limiter.limit());

            if !decision.allowed {
                let mut response = GateError::rate_limited(decision.retry_after).into_response();
                response.headers_mut().insert(X_RATELIMIT_LIMIT, limit);
                return Ok(response);
            }

            let mut response = inner.call(request).await?;
            if limiter.config().enabled {
                let headers = response.headers_mut();
                headers.insert(X_RATELIMIT_LIMIT, limit);
                headers.insert(X_RATELIMIT_REMAINING, header_value(decision.remaining));
            }
            Ok(response)
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
