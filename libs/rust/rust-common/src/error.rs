//! Centralized error types for all Rust libraries.
//!
//! This module provides a unified error type for outbound platform I/O,
//! with built-in retryability classification.

use thiserror::Error;

/// Common error type for platform operations.
///
/// All errors are classified as either retryable or non-retryable,
/// which helps callers decide whether to retry failed operations.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// HTTP transport failed before a response was received
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote endpoint answered with an unexpected status
    #[error("unexpected HTTP status {status}: {body}")]
    Status {
        /// Response status code
        status: u16,
        /// Response body, lossily decoded
        body: String,
    },

    /// Transport failure reported by a non-reqwest [`HttpGet`](crate::HttpGet)
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl PlatformError {
    /// Check if this error is retryable.
    ///
    /// Retryable errors are transient failures that may succeed on retry,
    /// such as connection failures, 5xx/429 answers, or timeouts.
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_common::PlatformError;
    ///
    /// let err = PlatformError::Status { status: 503, body: String::new() };
    /// assert!(err.is_retryable());
    ///
    /// let err = PlatformError::Status { status: 404, body: String::new() };
    /// assert!(!err.is_retryable());
    /// ```
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Unavailable(_) => true,
        }
    }

    /// Create an unexpected-status error from a raw response body.
    #[must_use]
    pub fn status(status: u16, body: &[u8]) -> Self {
        Self::Status {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    /// Create an unavailable error with the given message.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
