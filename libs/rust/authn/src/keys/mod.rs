//! Signing key sources
//!
//! A [`KeySource`] resolves a key ID (`kid`) to a public verification key.
//! Variants:
//! - [`FixedKeySource`]: one key, kid ignored
//! - [`MapKeySource`]: explicit kid → key table
//! - [`JwksKeySource`]: remote JWKS with background refresh and on-demand fetch
//! - [`FallbackKeySource`]: tries one named source, then another

mod fallback;
mod fixed;
mod jwks;
mod ready;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::Jwk;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::KeySourceError;
use crate::jwt::SigningAlgorithm;

pub use fallback::FallbackKeySource;
pub use fixed::{FixedKeySource, MapKeySource};
pub use jwks::{JwksKeySource, JwksOptions};
pub use ready::ReadySignal;

/// Length of a P-521 field element.
const P521_COORDINATE_LEN: usize = 66;

/// Resolves key IDs to public verification keys.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Returns the key registered under `kid`.
    ///
    /// # Errors
    ///
    /// - [`KeySourceError::Cancelled`] if `ctx` is cancelled before or during
    ///   the lookup
    /// - [`KeySourceError::KeyNotFound`] if no key is known for `kid`
    /// - other variants for source-specific failures
    async fn fetch_public_key(
        &self,
        ctx: &CancellationToken,
        kid: &str,
    ) -> Result<PublicKey, KeySourceError>;
}

#[async_trait]
impl<T: KeySource + ?Sized> KeySource for Arc<T> {
    async fn fetch_public_key(
        &self,
        ctx: &CancellationToken,
        kid: &str,
    ) -> Result<PublicKey, KeySourceError> {
        (**self).fetch_public_key(ctx, kid).await
    }
}

/// Verification material behind a [`PublicKey`].
#[derive(Clone)]
pub(crate) enum KeyMaterial {
    /// Anything `jsonwebtoken` can verify with
    Jwt(Arc<DecodingKey>),
    /// P-521 curve point for ES512
    P521(Arc<p521::ecdsa::VerifyingKey>),
}

/// Public verification key.
///
/// Cheap to clone. A key derived from a JWK carrying an `alg` member is pinned
/// to that algorithm and will not verify tokens signed with any other.
#[derive(Clone)]
pub struct PublicKey {
    material: KeyMaterial,
    algorithm: Option<SigningAlgorithm>,
}

impl PublicKey {
    /// Wraps an existing decoding key with no algorithm pin.
    #[must_use]
    pub fn from_decoding_key(key: DecodingKey) -> Self {
        Self {
            material: KeyMaterial::Jwt(Arc::new(key)),
            algorithm: None,
        }
    }

    /// Wraps a P-521 verifying key, pinned to ES512.
    #[must_use]
    pub fn from_p521(key: p521::ecdsa::VerifyingKey) -> Self {
        Self {
            material: KeyMaterial::P521(Arc::new(key)),
            algorithm: Some(SigningAlgorithm::ES512),
        }
    }

    /// Derives the public key from a JWK.
    ///
    /// Only public members are read, so a JWK that also carries private
    /// material yields its public half.
    ///
    /// # Errors
    ///
    /// Returns [`KeySourceError::Fetch`] if the key parameters are unusable.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, KeySourceError> {
        let kid = jwk.common.key_id.as_deref().unwrap_or("");
        let key = DecodingKey::from_jwk(jwk).map_err(|e| invalid_key(kid, e))?;

        // Encryption algorithms (RSA-OAEP etc.) don't parse as signing
        // algorithms and leave the key unpinned.
        let algorithm = jwk
            .common
            .key_algorithm
            .as_ref()
            .and_then(|alg| serde_json::to_value(alg).ok())
            .and_then(|value| value.as_str().and_then(|s| SigningAlgorithm::from_str(s).ok()));

        Ok(Self {
            material: KeyMaterial::Jwt(Arc::new(key)),
            algorithm,
        })
    }

    /// Derives the public key from one raw JWKS entry.
    ///
    /// P-521 EC keys are handled here; every other entry goes through
    /// [`Jwk`] and [`from_jwk`](Self::from_jwk).
    ///
    /// # Errors
    ///
    /// Returns [`KeySourceError::Fetch`] if the entry is not a key this crate
    /// can represent.
    pub fn from_jwk_value(entry: &Value) -> Result<Self, KeySourceError> {
        let kid = entry.get("kid").and_then(Value::as_str).unwrap_or("");
        let member = |name: &str| entry.get(name).and_then(Value::as_str);

        if member("kty") == Some("EC") && member("crv") == Some("P-521") {
            if let Some(alg) = member("alg").filter(|alg| *alg != "ES512") {
                return Err(invalid_key(kid, format!("alg {alg} does not fit a P-521 key")));
            }
            let x = p521_coordinate(kid, member("x"))?;
            let y = p521_coordinate(kid, member("y"))?;

            let mut point = Vec::with_capacity(1 + 2 * P521_COORDINATE_LEN);
            point.push(0x04);
            point.extend_from_slice(&x);
            point.extend_from_slice(&y);
            let key = p521::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                .map_err(|_| invalid_key(kid, "point is not on P-521"))?;
            return Ok(Self::from_p521(key));
        }

        let jwk: Jwk = serde_json::from_value(entry.clone())
            .map_err(|e| invalid_key(kid, format!("unsupported key: {e}")))?;
        Self::from_jwk(&jwk)
    }

    /// Parses a PEM-encoded public key, trying RSA, EC, then Ed25519.
    ///
    /// # Errors
    ///
    /// Returns the last parse error if no key type matches.
    pub fn from_pem(pem: &[u8]) -> Result<Self, jsonwebtoken::errors::Error> {
        let key = DecodingKey::from_rsa_pem(pem)
            .or_else(|_| DecodingKey::from_ec_pem(pem))
            .or_else(|_| DecodingKey::from_ed_pem(pem))?;
        Ok(Self::from_decoding_key(key))
    }

    /// Pins the key to a single algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: impl Into<SigningAlgorithm>) -> Self {
        self.algorithm = Some(algorithm.into());
        self
    }

    /// The `jsonwebtoken` decoding key, unless this is a P-521 key.
    #[must_use]
    pub fn decoding_key(&self) -> Option<&DecodingKey> {
        match &self.material {
            KeyMaterial::Jwt(key) => Some(key),
            KeyMaterial::P521(_) => None,
        }
    }

    pub(crate) const fn material(&self) -> &KeyMaterial {
        &self.material
    }

    /// The pinned algorithm, if any.
    #[must_use]
    pub const fn algorithm(&self) -> Option<SigningAlgorithm> {
        self.algorithm
    }

    /// Whether this key may verify a token signed with `alg`.
    #[must_use]
    pub fn permits(&self, alg: SigningAlgorithm) -> bool {
        self.algorithm.is_none_or(|pinned| pinned == alg)
    }
}

fn invalid_key(kid: &str, reason: impl fmt::Display) -> KeySourceError {
    KeySourceError::Fetch {
        reason: format!("invalid key {kid:?}: {reason}"),
    }
}

fn p521_coordinate(kid: &str, encoded: Option<&str>) -> Result<Vec<u8>, KeySourceError> {
    let bytes = encoded
        .ok_or_else(|| invalid_key(kid, "missing P-521 coordinate"))
        .and_then(|encoded| {
            URL_SAFE_NO_PAD
                .decode(encoded)
                .map_err(|e| invalid_key(kid, format!("coordinate is not base64url: {e}")))
        })?;
    if bytes.len() != P521_COORDINATE_LEN {
        return Err(invalid_key(kid, format!("P-521 coordinate has {} bytes", bytes.len())));
    }
    Ok(bytes)
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Keys by kid. Replaced wholesale on every successful JWKS fetch.
pub type KeySet = HashMap<String, PublicKey>;

/// Advisory warning sink.
pub type WarnFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Warning sink that logs through `tracing`.
#[must_use]
pub fn tracing_warn() -> WarnFn {
    Arc::new(|message: &str| tracing::warn!("{message}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::fixtures;

    #[test]
    fn test_from_jwk_pins_algorithm() {
        let jwk: Jwk = serde_json::from_value(fixtures::ec_jwk_json(
            fixtures::KID_PRIMARY,
            &fixtures::PRIMARY_EC_KEY,
        ))
        .unwrap();

        let key = PublicKey::from_jwk(&jwk).unwrap();
        assert_eq!(key.algorithm(), Some(SigningAlgorithm::ES256));
        assert!(key.permits(SigningAlgorithm::ES256));
        assert!(!key.permits(SigningAlgorithm::RS256));
    }

    #[test]
    fn test_from_jwk_without_alg_is_unpinned() {
        let mut value = fixtures::ec_jwk_json(fixtures::KID_PRIMARY, &fixtures::PRIMARY_EC_KEY);
        value.as_object_mut().unwrap().remove("alg");
        let jwk: Jwk = serde_json::from_value(value).unwrap();

        let key = PublicKey::from_jwk(&jwk).unwrap();
        assert_eq!(key.algorithm(), None);
        assert!(key.permits(SigningAlgorithm::ES384));
    }

    #[test]
    fn test_from_jwk_ignores_private_members() {
        let mut value = fixtures::ec_jwk_json(fixtures::KID_PRIMARY, &fixtures::PRIMARY_EC_KEY);
        value
            .as_object_mut()
            .unwrap()
            .insert("d".into(), serde_json::json!("c2VjcmV0LXNjYWxhci1ub3QtdXNlZA"));
        let jwk: Jwk = serde_json::from_value(value).unwrap();

        assert!(PublicKey::from_jwk(&jwk).is_ok());
    }

    #[test]
    fn test_from_jwk_value_builds_p521_key() {
        let key = PublicKey::from_jwk_value(&fixtures::p521_jwk_json(fixtures::KID_P521)).unwrap();
        assert_eq!(key.algorithm(), Some(SigningAlgorithm::ES512));
        assert!(key.decoding_key().is_none());
        assert!(matches!(key.material(), KeyMaterial::P521(_)));
    }

    #[test]
    fn test_from_jwk_value_rejects_bad_p521_members() {
        let mut wrong_alg = fixtures::p521_jwk_json(fixtures::KID_P521);
        wrong_alg["alg"] = serde_json::json!("ES256");
        let err = PublicKey::from_jwk_value(&wrong_alg).unwrap_err();
        assert!(err.to_string().contains(fixtures::KID_P521));

        let mut short_x = fixtures::p521_jwk_json(fixtures::KID_P521);
        short_x["x"] = serde_json::json!("AQID");
        assert!(PublicKey::from_jwk_value(&short_x).is_err());

        let mut no_y = fixtures::p521_jwk_json(fixtures::KID_P521);
        no_y.as_object_mut().unwrap().remove("y");
        assert!(PublicKey::from_jwk_value(&no_y).is_err());
    }

    #[test]
    fn test_from_jwk_value_rejects_unknown_key_types() {
        let secp256k1 = serde_json::json!({
            "kty": "EC", "crv": "secp256k1", "alg": "ES256K", "kid": "k1",
            "x": "AQID", "y": "BAUG",
        });
        assert!(PublicKey::from_jwk_value(&secp256k1).is_err());

        let unknown_kty = serde_json::json!({ "kty": "XYZ", "kid": "odd" });
        assert!(PublicKey::from_jwk_value(&unknown_kty).is_err());
    }

    #[test]
    fn test_from_jwk_value_matches_from_jwk_for_ec256() {
        let value = fixtures::ec_jwk_json(fixtures::KID_PRIMARY, &fixtures::PRIMARY_EC_KEY);
        let key = PublicKey::from_jwk_value(&value).unwrap();
        assert_eq!(key.algorithm(), Some(SigningAlgorithm::ES256));
        assert!(key.decoding_key().is_some());
    }

    #[test]
    fn test_from_pem_accepts_ec_key() {
        let key = PublicKey::from_pem(fixtures::PRIMARY_EC_KEY.public_pem.as_bytes()).unwrap();
        assert_eq!(key.algorithm(), None);
    }

    #[test]
    fn test_from_pem_rejects_garbage() {
        assert!(PublicKey::from_pem(b"not a pem").is_err());
    }

    #[test]
    fn test_debug_hides_key_material() {
        let key = PublicKey::from_pem(fixtures::PRIMARY_EC_KEY.public_pem.as_bytes())
            .unwrap()
            .with_algorithm(SigningAlgorithm::ES256);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("ES256"));
        assert!(!rendered.contains("MFkw"));
    }
}
