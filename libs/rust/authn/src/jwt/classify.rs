//! Mapping from `jsonwebtoken` failures to the authentication taxonomy.
//!
//! This is the only place library errors are interpreted. Structural and
//! cryptographic failures make a token *bad*; failures of claims that were
//! correctly signed make it *not authenticated*. Anything unrecognized is
//! treated as bad.

use jsonwebtoken::errors::{Error as JwtError, ErrorKind};

use crate::error::AuthError;

/// Which side of the taxonomy a library error falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Maps to [`AuthError::BadToken`]
    BadToken,
    /// Maps to [`AuthError::NotAuthenticated`]
    NotAuthenticated,
}

/// Classifies an error kind.
#[must_use]
#[allow(clippy::match_same_arms)]
pub const fn classify_kind(kind: &ErrorKind) -> Classification {
    match kind {
        ErrorKind::ExpiredSignature
        | ErrorKind::ImmatureSignature
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidSubject
        | ErrorKind::MissingRequiredClaim(_) => Classification::NotAuthenticated,

        ErrorKind::InvalidToken
        | ErrorKind::InvalidSignature
        | ErrorKind::InvalidEcdsaKey
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::MissingAlgorithm
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => Classification::BadToken,

        _ => Classification::BadToken,
    }
}

/// Converts a library error into an [`AuthError`].
#[must_use]
pub fn classify(err: &JwtError) -> AuthError {
    let reason = describe(err.kind());
    match classify_kind(err.kind()) {
        Classification::BadToken => AuthError::bad_token(reason),
        Classification::NotAuthenticated => AuthError::not_authenticated(reason),
    }
}

fn describe(kind: &ErrorKind) -> String {
    match kind {
        ErrorKind::ExpiredSignature => "token is expired".to_string(),
        ErrorKind::ImmatureSignature => "token is not valid yet".to_string(),
        ErrorKind::InvalidAudience => "token has an invalid audience".to_string(),
        ErrorKind::InvalidIssuer => "token has an invalid issuer".to_string(),
        ErrorKind::InvalidSubject => "token has an invalid subject".to_string(),
        ErrorKind::MissingRequiredClaim(claim) => format!("token is missing required claim {claim:?}"),
        ErrorKind::InvalidSignature => "token signature is invalid".to_string(),
        ErrorKind::InvalidToken => "token is malformed".to_string(),
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName | ErrorKind::MissingAlgorithm => {
            "token signing method is not allowed for this key".to_string()
        }
        ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
            "verification key is unusable".to_string()
        }
        other => format!("token is unverifiable: {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_time_and_claim_failures_are_not_authenticated() {
        for kind in [
            ErrorKind::ExpiredSignature,
            ErrorKind::ImmatureSignature,
            ErrorKind::InvalidAudience,
            ErrorKind::InvalidIssuer,
            ErrorKind::InvalidSubject,
            ErrorKind::MissingRequiredClaim("exp".to_string()),
        ] {
            assert_eq!(classify_kind(&kind), Classification::NotAuthenticated, "{kind:?}");
        }
    }

    #[test]
    fn test_structural_failures_are_bad_token() {
        for kind in [
            ErrorKind::InvalidToken,
            ErrorKind::InvalidSignature,
            ErrorKind::InvalidEcdsaKey,
            ErrorKind::InvalidKeyFormat,
            ErrorKind::InvalidAlgorithm,
            ErrorKind::InvalidAlgorithmName,
            ErrorKind::MissingAlgorithm,
        ] {
            assert_eq!(classify_kind(&kind), Classification::BadToken, "{kind:?}");
        }
    }

    #[test]
    fn test_classify_builds_matching_error() {
        let err = classify(&JwtError::from(ErrorKind::ExpiredSignature));
        assert!(matches!(err, AuthError::NotAuthenticated { ref reason } if reason == "token is expired"));

        let err = classify(&JwtError::from(ErrorKind::InvalidSignature));
        assert!(err.is_bad_token());
    }

    proptest! {
        #[test]
        fn prop_missing_claim_always_not_authenticated(claim in "[a-z_]{1,16}") {
            let err = classify(&JwtError::from(ErrorKind::MissingRequiredClaim(claim.clone())));
            prop_assert!(err.is_not_authenticated());
            prop_assert!(err.to_string().contains(&claim));
        }
    }
}
