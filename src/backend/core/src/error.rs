//! Error handling for feedgate.
//!
//! This module provides:
//! - A small, stable error taxonomy for admission control and identity resolution
//! - HTTP status code mapping for API responses
//! - User-facing messages kept apart from internal diagnostics
//! - Retryability classification for transient backend failures
//! - Error logging with tracing integration and an error counter
//!
//! # Usage
//!
//! ```rust,ignore
//! use feedgate_core::error::{GateError, Result};
//!
//! fn lookup() -> Result<()> {
//!     Err(GateError::not_found("user", "42"))
//! }
//! ```

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for feedgate operations.
pub type Result<T> = std::result::Result<T, GateError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The identity (or another addressed record) does not exist.
    NotFound,
    /// Missing or invalid credentials.
    Unauthorized,
    /// Authenticated, but not allowed to act on the resource.
    Forbidden,
    /// Admission denied by the rate limiter.
    RateLimited,
    /// A backend (database, cache) could not be reached.
    Unavailable,
    /// A deadline elapsed before the backend answered.
    Timeout,
    /// The identity was resolved but could not be written to the cache.
    CacheWriteFailure,
    /// Configuration rejected at construction time.
    InvalidConfiguration,
    /// Anything else.
    Internal,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::NotFound => 1000,
            Self::Unauthorized => 1100,
            Self::Forbidden => 1101,
            Self::RateLimited => 1200,
            Self::Unavailable => 2000,
            Self::Timeout => 2001,
            Self::CacheWriteFailure => 2100,
            Self::InvalidConfiguration => 5000,
            Self::Internal => 9000,
        }
    }

    /// Get the HTTP status code for this error.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::CacheWriteFailure | Self::InvalidConfiguration | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Check if a caller may retry the failed operation.
    ///
    /// Only transient backend failures qualify. Rate limiting is surfaced to
    /// the client with a retry hint and never retried server-side.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable | Self::Timeout | Self::CacheWriteFailure
        )
    }

    /// Get the error category.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::NotFound => "lookup",
            Self::Unauthorized | Self::Forbidden => "auth",
            Self::RateLimited => "admission",
            Self::Unavailable | Self::Timeout | Self::CacheWriteFailure => "backend",
            Self::InvalidConfiguration => "configuration",
            Self::Internal => "internal",
        }
    }

    /// Whether the user-facing message must hide backend details.
    pub const fn is_opaque(&self) -> bool {
        matches!(
            self,
            Self::Unavailable
                | Self::Timeout
                | Self::CacheWriteFailure
                | Self::InvalidConfiguration
                | Self::Internal
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Caller errors (missing records, denied access)
    Low,
    /// Operational issues (transient backend failures)
    Medium,
    /// System errors (misconfiguration, bugs)
    High,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::NotFound
            | ErrorCode::Unauthorized
            | ErrorCode::Forbidden
            | ErrorCode::RateLimited => Self::Low,

            ErrorCode::Unavailable | ErrorCode::Timeout | ErrorCode::CacheWriteFailure => {
                Self::Medium
            }

            ErrorCode::InvalidConfiguration | ErrorCode::Internal => Self::High,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Additional structured details about an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Related entity type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Related entity ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Seconds the client should wait before retrying
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_secs = Some(seconds);
        self
    }

    fn is_empty(&self) -> bool {
        self.entity_type.is_none() && self.entity_id.is_none() && self.retry_after_secs.is_none()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for feedgate.
///
/// Carries a stable [`ErrorCode`], a message that is safe to show to clients,
/// an optional internal message for logs, and the underlying source error.
#[derive(Error, Debug)]
pub struct GateError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-friendly error message (safe to expose to clients)
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// Additional structured details
    details: ErrorDetails,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl GateError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            details: ErrorDetails::default(),
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::Internal, "error occurred on the server side", message)
    }

    /// Create a not found error.
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        let entity_type = entity_type.into();
        let entity_id = entity_id.into();
        Self::new(ErrorCode::NotFound, format!("{} not found", entity_type))
            .with_details(ErrorDetails::new().with_entity(entity_type, entity_id))
    }

    /// Create an unauthorized error.
    pub fn unauthorized(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Create a forbidden error.
    pub fn forbidden() -> Self {
        Self::new(ErrorCode::Forbidden, "access restricted")
    }

    /// Create a rate-limited error carrying the wait time.
    pub fn rate_limited(retry_after: Duration) -> Self {
        let secs = retry_after_secs(retry_after);
        Self::new(
            ErrorCode::RateLimited,
            format!("rate limit exceeded, retry after {}s", secs),
        )
        .with_details(ErrorDetails::new().with_retry_after(secs))
    }

    /// Create an unavailable error for a backend.
    pub fn unavailable(backend: &'static str, message: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::Unavailable,
            "service temporarily unavailable",
            format!("{}: {}", backend, message.into()),
        )
    }

    /// Create a timeout error for an operation.
    pub fn timeout(operation: &'static str, after: Duration) -> Self {
        Self::with_internal(
            ErrorCode::Timeout,
            "request timed out",
            format!("{} did not complete within {:?}", operation, after),
        )
    }

    /// Create a cache-write failure.
    pub fn cache_write_failure(key: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::CacheWriteFailure,
            "error occurred on the server side",
            format!("failed to populate cache entry {}", key.into()),
        )
    }

    /// Create a configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::InvalidConfiguration,
            "error occurred on the server side",
            message,
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add error details.
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the user-friendly message.
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Get the internal message (if any).
    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    /// Get the error details.
    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NotFound
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();
        let status = self.http_status().as_u16();

        match self.severity() {
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    source = ?self.source,
                    "internal error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    internal_message = ?self.internal_message,
                    "transient backend failure"
                );
            }
            ErrorSeverity::Low => {
                debug!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "request rejected"
                );
            }
        }
    }

    fn record_metrics(&self) {
        counter!(
            "feedgate_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category(),
            "retryable" => self.is_retryable().to_string(),
        )
        .increment(1);
    }
}

/// Round a wait time up to whole seconds, never below one.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    let secs = if retry_after.subsec_nanos() > 0 { secs + 1 } else { secs };
    secs.max(1)
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Error response for API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always false for errors
    pub success: bool,

    /// Error information
    pub error: ErrorInfo,
}

/// Detailed error information for API responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Numeric error code
    pub numeric_code: u32,

    /// User-friendly error message
    pub message: String,

    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,

    /// Timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&GateError> for ErrorResponse {
    fn from(error: &GateError) -> Self {
        Self {
            success: false,
            error: ErrorInfo {
                code: error.code,
                numeric_code: error.code.numeric_code(),
                message: error.user_message.to_string(),
                details: if error.details.is_empty() || error.code.is_opaque() {
                    None
                } else {
                    Some(error.details.clone())
                },
                timestamp: chrono::Utc::now(),
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Integration
// ═══════════════════════════════════════════════════════════════════════════════

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.http_status();
        let body = ErrorResponse::from(&self);
        let mut response = (status, Json(body)).into_response();

        if let Some(secs) = self.details.retry_after_secs {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations for Common Error Types
// ═══════════════════════════════════════════════════════════════════════════════

impl From<sqlx::Error> for GateError {
    fn from(error: sqlx::Error) -> Self {
        let code = match &error {
            sqlx::Error::RowNotFound => {
                return Self::with_internal(ErrorCode::NotFound, "resource not found", error.to_string())
                    .with_source(error);
            }
            sqlx::Error::PoolTimedOut => ErrorCode::Timeout,
            sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                ErrorCode::Unavailable
            }
            _ => ErrorCode::Internal,
        };

        let user_msg = match code {
            ErrorCode::Timeout => "request timed out",
            ErrorCode::Unavailable => "service temporarily unavailable",
            _ => "error occurred on the server side",
        };

        Self::with_internal(code, user_msg, format!("database: {}", error)).with_source(error)
    }
}

impl From<redis::RedisError> for GateError {
    fn from(error: redis::RedisError) -> Self {
        let (code, user_msg) = if error.is_timeout() {
            (ErrorCode::Timeout, "request timed out")
        } else if error.is_connection_refusal() || error.is_connection_dropped() || error.is_io_error() {
            (ErrorCode::Unavailable, "service temporarily unavailable")
        } else {
            (ErrorCode::Internal, "error occurred on the server side")
        };

        Self::with_internal(code, user_msg, format!("cache: {}", error)).with_source(error)
    }
}

impl From<serde_json::Error> for GateError {
    fn from(error: serde_json::Error) -> Self {
        Self::with_internal(
            ErrorCode::Internal,
            "error occurred on the server side",
            format!("json: {}", error),
        )
        .with_source(error)
    }
}

impl From<tokio::time::error::Elapsed> for GateError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Self::with_internal(ErrorCode::Timeout, "request timed out", error.to_string())
            .with_source(error)
    }
}

impl From<config::ConfigError> for GateError {
    fn from(error: config::ConfigError) -> Self {
        Self::invalid_configuration(error.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
