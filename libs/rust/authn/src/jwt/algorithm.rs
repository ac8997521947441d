//! JWS signing algorithm names.
//!
//! A superset of [`jsonwebtoken::Algorithm`]: ES512 has no `jsonwebtoken`
//! counterpart and is verified by [`super::es512`].

use std::fmt;
use std::str::FromStr;

use jsonwebtoken::Algorithm;

/// A JWS `alg` value this crate can verify.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    /// HMAC with SHA-256
    HS256,
    /// HMAC with SHA-384
    HS384,
    /// HMAC with SHA-512
    HS512,
    /// ECDSA P-256 with SHA-256
    ES256,
    /// ECDSA P-384 with SHA-384
    ES384,
    /// ECDSA P-521 with SHA-512
    ES512,
    /// RSASSA-PKCS1-v1_5 with SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 with SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 with SHA-512
    RS512,
    /// RSASSA-PSS with SHA-256
    PS256,
    /// RSASSA-PSS with SHA-384
    PS384,
    /// RSASSA-PSS with SHA-512
    PS512,
    /// Ed25519
    EdDSA,
}

impl SigningAlgorithm {
    /// The registered `alg` name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::ES512 => "ES512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
            Self::EdDSA => "EdDSA",
        }
    }

    /// The `jsonwebtoken` algorithm, or `None` for ES512.
    #[must_use]
    pub const fn to_jwt(self) -> Option<Algorithm> {
        Some(match self {
            Self::HS256 => Algorithm::HS256,
            Self::HS384 => Algorithm::HS384,
            Self::HS512 => Algorithm::HS512,
            Self::ES256 => Algorithm::ES256,
            Self::ES384 => Algorithm::ES384,
            Self::ES512 => return None,
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::RS512 => Algorithm::RS512,
            Self::PS256 => Algorithm::PS256,
            Self::PS384 => Algorithm::PS384,
            Self::PS512 => Algorithm::PS512,
            Self::EdDSA => Algorithm::EdDSA,
        })
    }
}

impl From<Algorithm> for SigningAlgorithm {
    fn from(alg: Algorithm) -> Self {
        match alg {
            Algorithm::HS256 => Self::HS256,
            Algorithm::HS384 => Self::HS384,
            Algorithm::HS512 => Self::HS512,
            Algorithm::ES256 => Self::ES256,
            Algorithm::ES384 => Self::ES384,
            Algorithm::RS256 => Self::RS256,
            Algorithm::RS384 => Self::RS384,
            Algorithm::RS512 => Self::RS512,
            Algorithm::PS256 => Self::PS256,
            Algorithm::PS384 => Self::PS384,
            Algorithm::PS512 => Self::PS512,
            Algorithm::EdDSA => Self::EdDSA,
        }
    }
}

/// An `alg` name outside [`SigningAlgorithm`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown signing algorithm {0:?}")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for SigningAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "ES512" {
            return Ok(Self::ES512);
        }
        Algorithm::from_str(s)
            .map(Self::from)
            .map_err(|_| UnknownAlgorithm(s.to_string()))
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_jsonwebtoken() {
        for alg in [
            SigningAlgorithm::ES256,
            SigningAlgorithm::ES384,
            SigningAlgorithm::PS512,
            SigningAlgorithm::RS256,
            SigningAlgorithm::EdDSA,
        ] {
            let jwt = alg.to_jwt().unwrap();
            assert_eq!(SigningAlgorithm::from(jwt), alg);
            assert_eq!(alg.as_str().parse::<SigningAlgorithm>().unwrap(), alg);
        }
    }

    #[test]
    fn test_es512_has_no_jsonwebtoken_counterpart() {
        let alg: SigningAlgorithm = "ES512".parse().unwrap();
        assert_eq!(alg, SigningAlgorithm::ES512);
        assert_eq!(alg.to_jwt(), None);
        assert_eq!(alg.to_string(), "ES512");
    }

    #[test]
    fn test_unknown_names_rejected() {
        for name in ["ES256K", "none", "RSA-OAEP", "es256", ""] {
            let err = name.parse::<SigningAlgorithm>().unwrap_err();
            assert_eq!(err, UnknownAlgorithm(name.to_string()));
        }
    }
}
