//! Centralized error types shared by squeak services.
//!
//! Two families live here:
//! - [`StoreError`] for storage backends, classified as retryable or not;
//! - [`ApiError`] for the caller-facing boundary, which collapses every
//!   internal failure into one of three uniform outcomes.

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Sensitive patterns that must never leak into caller-facing messages.
const SENSITIVE_PATTERNS: &[&str] = &[
    "password",
    "secret",
    "token",
    "key",
    "credential",
    "bearer",
    "authorization",
    "private",
    "signature",
];

/// Storage backend failure.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// The operation did not finish within the caller's deadline.
    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),

    /// A stored value could not be encoded or decoded.
    #[error("Storage serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Check if this error is retryable.
    ///
    /// Serialization failures are deterministic and will fail again.
    ///
    /// # Examples
    ///
    /// ```
    /// use squeak_common::StoreError;
    /// use std::time::Duration;
    ///
    /// assert!(StoreError::Timeout(Duration::from_secs(1)).is_retryable());
    /// assert!(!StoreError::Serialization("bad".to_string()).is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Timeout(_))
    }

    /// Create a backend error with the given message.
    #[must_use]
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Caller-facing error.
///
/// Validation failures are never distinguished beyond `Unauthorized`, and
/// internal failures carry no diagnostic detail past this boundary.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request was malformed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Authentication or authorization failed.
    #[error("Unauthorized")]
    Unauthorized,

    /// The backend failed; the source is kept for logging only.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Create a bad request error with the given message.
    #[must_use]
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::BadRequest(_) => ErrorCode::BadRequest,
            Self::Unauthorized => ErrorCode::Unauthorized,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Build the sanitized response for this error.
    #[must_use]
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse::from_error(self, Uuid::new_v4())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, retryable = err.is_retryable(), "Storage failure");
        Self::Internal(err.to_string())
    }
}

/// Stable error codes for responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed request
    BadRequest,
    /// Authentication failed
    Unauthorized,
    /// Backend failure
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Sanitized error as sent to a client, with a correlation ID that also
/// appears in the server log for the same failure.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable message (sanitized)
    pub message: String,
    /// Correlation ID for tracing
    pub correlation_id: Uuid,
}

impl ErrorResponse {
    /// Create a new error response from an [`ApiError`].
    #[must_use]
    pub fn from_error(error: &ApiError, correlation_id: Uuid) -> Self {
        let message = match error {
            ApiError::BadRequest(reason) => sanitize_message(reason),
            ApiError::Unauthorized => "Could not authorize".to_string(),
            // Never expose internal error details
            ApiError::Internal(_) => "Internal error".to_string(),
        };

        Self {
            code: error.code(),
            message,
            correlation_id,
        }
    }
}

/// Sanitize a message by removing sensitive information.
fn sanitize_message(message: &str) -> String {
    if contains_sensitive_info(message) {
        return "Invalid request".to_string();
    }
    message.to_string()
}

/// Check if a string contains sensitive information.
#[must_use]
pub fn contains_sensitive_info(text: &str) -> bool {
    let lower = text.to_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}
