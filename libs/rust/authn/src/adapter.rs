//! Service-level error adapter
//!
//! Translates [`AuthError`] into the coarse taxonomy exposed at the service
//! boundary, and from there into gRPC statuses with stable error codes and a
//! correlation ID.

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tonic::{Code, Status};
use uuid::Uuid;

use crate::authenticator::Authenticate;
use crate::error::{AuthError, KeySourceError};
use crate::jwt::Entity;

/// Patterns that must never reach a client in an error message
const SENSITIVE_PATTERNS: &[&str] = &[
    "password",
    "secret",
    "credential",
    "bearer",
    "authorization",
    "api_key",
    "apikey",
    "private",
];

/// Service-boundary authentication errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServiceAuthError {
    /// The token itself is garbage.
    #[error("invalid token: {0}")]
    InvalidToken(#[source] AuthError),

    /// The token was not accepted.
    #[error("unauthenticated: {0}")]
    Unauthenticated(#[source] AuthError),

    /// Anything else, passed through untouched.
    #[error(transparent)]
    Other(AuthError),
}

impl From<AuthError> for ServiceAuthError {
    fn from(err: AuthError) -> Self {
        if err.is_bad_token() {
            Self::InvalidToken(err)
        } else if err.is_not_authenticated() || err.is_unverifiable() {
            Self::Unauthenticated(err)
        } else {
            Self::Other(err)
        }
    }
}

/// Error codes for gRPC/API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Token is malformed or its signature is invalid
    TokenInvalid,
    /// Token was rejected
    Unauthenticated,
    /// Signing keys could not be obtained
    KeysUnavailable,
    /// Caller cancelled the request
    Cancelled,
    /// Anything else
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TokenInvalid => "AUTH_TOKEN_INVALID",
            Self::Unauthenticated => "AUTH_UNAUTHENTICATED",
            Self::KeysUnavailable => "AUTH_KEYS_UNAVAILABLE",
            Self::Cancelled => "CANCELLED",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Get the gRPC status code for this error
    #[must_use]
    pub const fn grpc_code(&self) -> Code {
        match self {
            Self::TokenInvalid | Self::Unauthenticated => Code::Unauthenticated,
            Self::KeysUnavailable => Code::Unavailable,
            Self::Cancelled => Code::Cancelled,
            Self::Internal => Code::Internal,
        }
    }
}

/// Structured error response with correlation ID
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
    /// Builds the client-facing response for `error`.
    #[must_use]
    pub fn from_error(error: &ServiceAuthError, correlation_id: Uuid) -> Self {
        let message = match error {
            ServiceAuthError::InvalidToken(_) => "Token is invalid".to_string(),
            ServiceAuthError::Unauthenticated(inner) => match inner.root() {
                AuthError::NotAuthenticated { reason } => sanitize_message(reason),
                _ => "Token could not be verified".to_string(),
            },
            ServiceAuthError::Other(inner) => match inner.root() {
                AuthError::KeySource(KeySourceError::Cancelled) => "Request cancelled".to_string(),
                AuthError::KeySource(_) => "Key validation temporarily unavailable".to_string(),
                // Never expose internal error details
                _ => "Internal error".to_string(),
            },
        };

        Self {
            code: error.code(),
            message,
            correlation_id,
        }
    }

    /// Convert to gRPC Status
    #[must_use]
    pub fn to_status(&self) -> Status {
        let message = format!(
            "{}: {} [correlation_id: {}]",
            self.code.as_str(),
            self.message,
            self.correlation_id
        );
        Status::new(self.code.grpc_code(), message)
    }
}

impl ServiceAuthError {
    /// Get the error code for this error
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidToken(_) => ErrorCode::TokenInvalid,
            Self::Unauthenticated(_) => ErrorCode::Unauthenticated,
            Self::Other(inner) => match inner.root() {
                AuthError::KeySource(KeySourceError::Cancelled) => ErrorCode::Cancelled,
                AuthError::KeySource(_) => ErrorCode::KeysUnavailable,
                _ => ErrorCode::Internal,
            },
        }
    }

    /// The wrapped authentication error.
    #[must_use]
    pub const fn inner(&self) -> &AuthError {
        match self {
            Self::InvalidToken(inner) | Self::Unauthenticated(inner) | Self::Other(inner) => inner,
        }
    }

    /// Convert to gRPC Status with correlation ID
    #[must_use]
    pub fn to_status(&self, correlation_id: Uuid) -> Status {
        ErrorResponse::from_error(self, correlation_id).to_status()
    }
}

impl From<ServiceAuthError> for Status {
    fn from(err: ServiceAuthError) -> Self {
        let correlation_id = Uuid::new_v4();
        tracing::debug!(%correlation_id, error = %err, "authentication rejected");
        err.to_status(correlation_id)
    }
}

/// Sanitize a message by removing sensitive information
fn sanitize_message(message: &str) -> String {
    if contains_sensitive_info(message) {
        return "Authentication failed".to_string();
    }
    message.to_string()
}

/// Check if a string contains sensitive information
#[must_use]
pub fn contains_sensitive_info(text: &str) -> bool {
    let lower = text.to_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Wraps an [`Authenticate`] implementation and reports service-level errors.
#[derive(Debug, Clone)]
pub struct ErrorAdapter<A> {
    inner: A,
}

impl<A: Authenticate> ErrorAdapter<A> {
    /// Wraps `inner`.
    #[must_use]
    pub const fn new(inner: A) -> Self {
        Self { inner }
    }

    /// The wrapped authenticator.
    #[must_use]
    pub const fn inner(&self) -> &A {
        &self.inner
    }

    /// Authenticates `raw`, translating errors.
    ///
    /// # Errors
    ///
    /// Returns the [`ServiceAuthError`] corresponding to the inner failure.
    pub async fn authenticate(
        &self,
        ctx: &CancellationToken,
        raw: &str,
    ) -> Result<Entity, ServiceAuthError> {
        self.inner
            .authenticate(ctx, raw)
            .await
            .map_err(ServiceAuthError::from)
    }
}
