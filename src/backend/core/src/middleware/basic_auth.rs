//! HTTP Basic authentication for operator endpoints.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use metrics::counter;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::{ErrorResponse, GateError};

/// The single operator account allowed through.
#[derive(Clone)]
pub struct BasicCredentials {
    username: Arc<str>,
    password: Arc<str>,
}

impl BasicCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Arc::from(username.into()),
            password: Arc::from(password.into()),
        }
    }

    /// Check an `Authorization` header. An empty configured password never matches.
    pub fn verify(&self, headers: &HeaderMap) -> bool {
        if self.password.is_empty() {
            return false;
        }
        let Some((user, pass)) = decode_basic(headers) else {
            return false;
        };
        // Both halves are always compared.
        let user_ok = user.as_bytes().ct_eq(self.username.as_bytes());
        let pass_ok = pass.as_bytes().ct_eq(self.password.as_bytes());
        (user_ok & pass_ok).into()
    }
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

fn decode_basic(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Middleware rejecting requests without the operator's Basic credentials.
pub async fn require_basic_auth(
    State(credentials): State<BasicCredentials>,
    request: Request,
    next: Next,
) -> Response {
    if credentials.verify(request.headers()) {
        return next.run(request).await;
    }

    debug!(path = %request.uri().path(), "basic auth rejected");
    counter!("feedgate_auth_failures_total", "reason" => "basic").increment(1);

    let error = GateError::unauthorized("unauthorized");
    let mut response = (StatusCode::UNAUTHORIZED, Json(ErrorResponse::from(&error))).into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static(r#"Basic realm="restricted", charset="UTF-8""#),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", user, pass)))
    }

    #[test]
    fn test_valid_credentials() {
        let creds = BasicCredentials::new("admin", "s3cret");
        assert!(creds.verify(&headers_with(&basic("admin", "s3cret"))));
    }

    #[test]
    fn test_wrong_password() {
        let creds = BasicCredentials::new("admin", "s3cret");
        assert!(!creds.verify(&headers_with(&basic("admin", "guess"))));
        assert!(!creds.verify(&headers_with(&basic("root", "s3cret"))));
        assert!(!creds.verify(&HeaderMap::new()));
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let creds = BasicCredentials::new("admin", "s3cret");
        assert!(!creds.verify(&headers_with(&basic("admin", "s3cret-and-more"))));
        assert!(!creds.verify(&headers_with(&basic("admin", "s3c"))));
        assert!(!creds.verify(&headers_with(&basic("administrator", "s3cret"))));
    }

    #[test]
    fn test_malformed_header() {
        let creds = BasicCredentials::new("admin", "s3cret");
        assert!(!creds.verify(&headers_with("Basic !!!not-base64")));
        assert!(!creds.verify(&headers_with(&format!("Basic {}", STANDARD.encode("no-colon")))));
        assert!(!creds.verify(&headers_with("Bearer abc")));
    }

    #[test]
    fn test_empty_configured_password_never_matches() {
        let creds = BasicCredentials::new("admin", "");
        assert!(!creds.verify(&headers_with(&basic("admin", ""))));
    }
}
