//! End-to-end tests for the HTTP surface.
//!
//! Tests cover:
//! - Health check endpoint
//! - Rate limiting and Retry-After
//! - Bearer authentication
//! - Ownership and rank checks on user reads
//! - Basic auth on operator endpoints

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::Value;
use tower::ServiceExt;

use feedgate_core::api::{build_router, AppState};
use feedgate_core::auth::{AuthConfig, TokenAuthenticator};
use feedgate_core::authz::{AuthorizationGate, InMemoryRoleDirectory, PredefinedRole};
use feedgate_core::cache::{IdentityCache, InMemoryBackend, InMemoryConfig};
use feedgate_core::identity::{Identity, IdentityResolver, InMemoryIdentityStore, UserId};
use feedgate_core::middleware::BasicCredentials;
use feedgate_core::ratelimit::FixedWindowLimiter;
use feedgate_core::telemetry::MetricsRegistry;

// ============================================================================
// Harness
// ============================================================================

struct TestApp {
    router: Router,
    authenticator: Arc<TokenAuthenticator>,
    store: Arc<InMemoryIdentityStore>,
}

impl TestApp {
    fn new(limit: u64) -> Self {
        let store = Arc::new(InMemoryIdentityStore::new());
        let backend = Arc::new(InMemoryBackend::new(InMemoryConfig::default()));
        let resolver = IdentityResolver::new(store.clone())
            .with_cache(IdentityCache::new(backend, Duration::from_secs(60)));
        let authenticator = Arc::new(
            TokenAuthenticator::new(&AuthConfig {
                jwt_secret: "test-secret".to_string(),
                ..Default::default()
            })
            .unwrap(),
        );

        let state = AppState {
            environment: "test".to_string(),
            limiter: Arc::new(FixedWindowLimiter::with_limits(limit, Duration::from_secs(5)).unwrap()),
            resolver,
            gate: AuthorizationGate::new(Arc::new(InMemoryRoleDirectory::new())),
            authenticator: authenticator.clone(),
            admin: BasicCredentials::new("admin", "hunter2"),
            metrics: MetricsRegistry::disabled(),
        };

        Self {
            router: build_router(state),
            authenticator,
            store,
        }
    }

    fn add_user(&self, name: &str, role: PredefinedRole) -> Identity {
        let identity = Identity::new(UserId::new(), name, format!("{}@example.com", name), role.to_role());
        self.store.insert(identity.clone());
        identity
    }

    fn token_for(&self, identity: &Identity) -> String {
        self.authenticator.issue_for(&identity.id).unwrap()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
        let mut request = request;
        let peer: SocketAddr = "203.0.113.10:51000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn get_with_basic(uri: &str, user: &str, pass: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(
            header::AUTHORIZATION,
            format!("Basic {}", STANDARD.encode(format!("{}:{}", user, pass))),
        )
        .body(Body::empty())
        .unwrap()
}

// ============================================================================
// Health & Rate Limiting
// ============================================================================

#[tokio::test]
async fn test_health() {
    let app = TestApp::new(20);
    let (status, headers, body) = app.send(get("/v1/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["env"], "test");
    assert_eq!(headers["x-ratelimit-limit"], "20");
    assert_eq!(headers["x-ratelimit-remaining"], "19");
}

#[tokio::test]
async fn test_rate_limited_request_gets_retry_after() {
    let app = TestApp::new(2);

    for _ in 0..2 {
        let (status, _, _) = app.send(get("/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, headers, body) = app.send(get("/v1/health")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");

    let retry_after: u64 = headers[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!((1..=5).contains(&retry_after));
}

// ============================================================================
// Users
// ============================================================================

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new(20);
    let (status, _, body) = app.send(get("/v1/users/me")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let app = TestApp::new(20);
    let (status, _, _) = app.send(get_with_bearer("/v1/users/me", "not.a.jwt")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_current_user() {
    let app = TestApp::new(20);
    let alice = app.add_user("alice", PredefinedRole::User);

    let (status, _, body) = app
        .send(get_with_bearer("/v1/users/me", &app.token_for(&alice)))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["role"]["name"], "user");
}

#[tokio::test]
async fn test_token_for_removed_user_is_unauthorized() {
    let app = TestApp::new(20);
    let ghost = Identity::new(UserId::new(), "ghost", "ghost@example.com", PredefinedRole::User.to_role());

    let (status, _, _) = app
        .send(get_with_bearer("/v1/users/me", &app.token_for(&ghost)))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_reads_self_but_not_others() {
    let app = TestApp::new(20);
    let alice = app.add_user("alice", PredefinedRole::User);
    let bob = app.add_user("bob", PredefinedRole::User);
    let token = app.token_for(&alice);

    let (status, _, body) = app
        .send(get_with_bearer(&format!("/v1/users/{}", alice.id), &token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");

    let (status, _, body) = app
        .send(get_with_bearer(&format!("/v1/users/{}", bob.id), &token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_moderator_reads_others() {
    let app = TestApp::new(20);
    let moderator = app.add_user("mod", PredefinedRole::Moderator);
    let bob = app.add_user("bob", PredefinedRole::User);

    let (status, _, body) = app
        .send(get_with_bearer(
            &format!("/v1/users/{}", bob.id),
            &app.token_for(&moderator),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "bob");
}

#[tokio::test]
async fn test_moderator_gets_not_found_for_unknown_user() {
    let app = TestApp::new(20);
    let moderator = app.add_user("mod", PredefinedRole::Moderator);
    let token = app.token_for(&moderator);

    let (status, _, body) = app
        .send(get_with_bearer(&format!("/v1/users/{}", UserId::new()), &token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _, _) = app
        .send(get_with_bearer("/v1/users/not-a-uuid", &token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Operator Endpoints
// ============================================================================

#[tokio::test]
async fn test_debug_vars_requires_basic_auth() {
    let app = TestApp::new(20);

    let (status, headers, _) = app.send(get("/v1/debug/vars")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers[header::WWW_AUTHENTICATE]
        .to_str()
        .unwrap()
        .starts_with("Basic"));

    let (status, _, _) = app
        .send(get_with_basic("/v1/debug/vars", "admin", "wrong"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_debug_vars_with_credentials() {
    let app = TestApp::new(20);

    let (status, _, body) = app
        .send(get_with_basic("/v1/debug/vars", "admin", "hunter2"))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rate_limit"]["limit"], 20);
    assert_eq!(body["data"]["rate_limit"]["window"], "5s");
    assert_eq!(body["data"]["rate_limit"]["tracked_clients"], 1);
    assert_eq!(body["data"]["cache"]["backend"], "memory");
}
