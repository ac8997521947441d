//! Error taxonomy for key sources and token authentication.
//!
//! Callers make security decisions on these variants, so their meaning is
//! stable:
//! - [`AuthError::BadToken`]: the token is garbage (malformed, bad signature,
//!   unusable key or algorithm)
//! - [`AuthError::NotAuthenticated`]: signed correctly but not acceptable now
//!   (expired, not yet valid, wrong audience/issuer/subject, missing claim)
//! - [`AuthError::TokenUnverifiable`]: no key was found for the token's kid, so
//!   the signature could not be checked at all

use thiserror::Error;

/// Errors reported by a [`KeySource`](crate::keys::KeySource).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum KeySourceError {
    /// No key is known for the requested kid.
    #[error("key not found: {kid:?}")]
    KeyNotFound {
        /// Requested key ID
        kid: String,
    },

    /// The source was started in non-blocking mode and its initial fetch
    /// has not completed yet.
    #[error("key source is not ready")]
    NotReady,

    /// The caller's cancellation token fired.
    #[error("key lookup cancelled")]
    Cancelled,

    /// Fetching or parsing the remote key set failed.
    #[error("failed to fetch key set: {reason}")]
    Fetch {
        /// Description of the failure
        reason: String,
    },
}

impl KeySourceError {
    /// Shorthand for [`KeySourceError::KeyNotFound`].
    #[must_use]
    pub fn not_found(kid: impl Into<String>) -> Self {
        Self::KeyNotFound { kid: kid.into() }
    }

    /// Whether this is a [`KeySourceError::KeyNotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }
}

/// Authentication errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AuthError {
    /// Malformed token, invalid signature, or unusable key/algorithm.
    #[error("bad token: {reason}")]
    BadToken {
        /// Description of the failure
        reason: String,
    },

    /// Well-formed and signed, but semantically not acceptable.
    #[error("not authenticated: {reason}")]
    NotAuthenticated {
        /// Description of the failure
        reason: String,
    },

    /// No verification key is available for the token's kid.
    #[error("token is unverifiable: no key for kid {kid:?}")]
    TokenUnverifiable {
        /// Key ID named by the token header
        kid: String,
    },

    /// The key source failed for a reason other than a missing key.
    #[error(transparent)]
    KeySource(KeySourceError),

    /// Parsing failed; wraps the parser's error.
    #[error("failed to parse token: {0}")]
    ParseFailed(#[source] Box<AuthError>),

    /// Failure raised by a post-parse hook.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Shorthand for [`AuthError::BadToken`].
    #[must_use]
    pub fn bad_token(reason: impl Into<String>) -> Self {
        Self::BadToken {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`AuthError::NotAuthenticated`].
    #[must_use]
    pub fn not_authenticated(reason: impl Into<String>) -> Self {
        Self::NotAuthenticated {
            reason: reason.into(),
        }
    }

    /// The underlying cause, looking through [`AuthError::ParseFailed`].
    #[must_use]
    pub fn root(&self) -> &Self {
        let mut current = self;
        while let Self::ParseFailed(inner) = current {
            current = inner;
        }
        current
    }

    /// Whether the root cause is [`AuthError::BadToken`].
    #[must_use]
    pub fn is_bad_token(&self) -> bool {
        matches!(self.root(), Self::BadToken { .. })
    }

    /// Whether the root cause is [`AuthError::NotAuthenticated`].
    #[must_use]
    pub fn is_not_authenticated(&self) -> bool {
        matches!(self.root(), Self::NotAuthenticated { .. })
    }

    /// Whether the root cause is [`AuthError::TokenUnverifiable`].
    #[must_use]
    pub fn is_unverifiable(&self) -> bool {
        matches!(self.root(), Self::TokenUnverifiable { .. })
    }

    /// Whether the root cause is a cancelled key lookup.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::KeySource(KeySourceError::Cancelled))
    }
}

impl From<KeySourceError> for AuthError {
    fn from(err: KeySourceError) -> Self {
        match err {
            KeySourceError::KeyNotFound { kid } => Self::TokenUnverifiable { kid },
            other => Self::KeySource(other),
        }
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
