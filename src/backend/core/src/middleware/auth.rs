//! Bearer authentication middleware.
//!
//! Validates the `Authorization: Bearer <jwt>` header, resolves the token's
//! subject through the [`IdentityResolver`], and injects [`CurrentIdentity`]
//! into the request extensions for handlers to extract.
//!
//! # Example
//!
//! ```rust,ignore
//! use feedgate_core::middleware::{AuthLayer, CurrentIdentity};
//!
//! async fn me(CurrentIdentity(identity): CurrentIdentity) -> Json<Identity> {
//!     Json(identity)
//! }
//!
//! let app = Router::new()
//!     .route("/v1/users/me", get(me))
//!     .layer(AuthLayer::new(authenticator, resolver));
//! ```

use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::debug;

use crate::auth::TokenAuthenticator;
use crate::error::{GateError, Result};
use crate::identity::{Identity, IdentityResolver};

/// The authenticated caller of the current request.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

/// Extract the bearer token, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}

/// Authenticate `headers` and resolve the caller.
async fn authenticate(
    headers: &HeaderMap,
    authenticator: &TokenAuthenticator,
    resolver: &IdentityResolver,
) -> Result<Identity> {
    let token = bearer_token(headers)
        .ok_or_else(|| GateError::unauthorized("missing or malformed authorization header"))?;
    let user_id = authenticator.authenticate(token)?;

    match resolver.resolve(user_id).await {
        Ok(resolution) => Ok(resolution.into_identity()),
        Err(e) if e.is_not_found() => {
            debug!(user_id = %user_id, "token subject no longer active");
            Err(GateError::unauthorized("invalid token"))
        }
        Err(e) => Err(e),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer and Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication layer for Tower.
#[derive(Clone)]
pub struct AuthLayer {
    authenticator: Arc<TokenAuthenticator>,
    resolver: IdentityResolver,
}

impl AuthLayer {
    pub fn new(authenticator: Arc<TokenAuthenticator>, resolver: IdentityResolver) -> Self {
        Self {
            authenticator,
            resolver,
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            authenticator: self.authenticator.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    authenticator: Arc<TokenAuthenticator>,
    resolver: IdentityResolver,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let authenticator = self.authenticator.clone();
        let resolver = self.resolver.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let outcome = authenticate(request.headers(), &authenticator, &resolver).await;
            match outcome {
                Ok(identity) => {
                    request.extensions_mut().insert(CurrentIdentity(identity));
                    inner.call(request).await
                }
                Err(e) => Ok(e.into_response()),
            }
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Extractor
// ═══════════════════════════════════════════════════════════════════════════════

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<CurrentIdentity>()
            .cloned()
            .ok_or_else(|| GateError::unauthorized("authentication required"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer xyz"));
        assert_eq!(bearer_token(&headers), Some("xyz"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
