//! Static key sources.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{KeySet, KeySource, PublicKey};
use crate::error::KeySourceError;

/// Returns the same key for every kid.
#[derive(Debug, Clone)]
pub struct FixedKeySource {
    key: PublicKey,
}

impl FixedKeySource {
    /// Creates a source that always answers with `key`.
    #[must_use]
    pub const fn new(key: PublicKey) -> Self {
        Self { key }
    }
}

#[async_trait]
impl KeySource for FixedKeySource {
    async fn fetch_public_key(
        &self,
        ctx: &CancellationToken,
        _kid: &str,
    ) -> Result<PublicKey, KeySourceError> {
        if ctx.is_cancelled() {
            return Err(KeySourceError::Cancelled);
        }
        Ok(self.key.clone())
    }
}

/// Exact kid → key lookup over an in-memory table.
#[derive(Debug, Clone, Default)]
pub struct MapKeySource {
    keys: KeySet,
}

impl MapKeySource {
    /// Creates a source over `keys`.
    #[must_use]
    pub const fn new(keys: KeySet) -> Self {
        Self { keys }
    }

    /// Adds or replaces the key for `kid`.
    #[must_use]
    pub fn with_key(mut self, kid: impl Into<String>, key: PublicKey) -> Self {
        self.keys.insert(kid.into(), key);
        self
    }

    /// Number of keys held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl From<HashMap<String, PublicKey>> for MapKeySource {
    fn from(keys: HashMap<String, PublicKey>) -> Self {
        Self::new(keys)
    }
}

#[async_trait]
impl KeySource for MapKeySource {
    async fn fetch_public_key(
        &self,
        ctx: &CancellationToken,
        kid: &str,
    ) -> Result<PublicKey, KeySourceError> {
        if ctx.is_cancelled() {
            return Err(KeySourceError::Cancelled);
        }
        self.keys
            .get(kid)
            .cloned()
            .ok_or_else(|| KeySourceError::not_found(kid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::SigningAlgorithm;
    use test_utils::fixtures;

    fn key() -> PublicKey {
        PublicKey::from_pem(fixtures::PRIMARY_EC_KEY.public_pem.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_fixed_ignores_kid() {
        let source = FixedKeySource::new(key().with_algorithm(SigningAlgorithm::ES256));
        let ctx = CancellationToken::new();

        for kid in ["", "a", "anything-at-all"] {
            let found = source.fetch_public_key(&ctx, kid).await.unwrap();
            assert_eq!(found.algorithm(), Some(SigningAlgorithm::ES256));
        }
    }

    #[tokio::test]
    async fn test_map_exact_lookup() {
        let source = MapKeySource::default().with_key("kid-a", key());
        let ctx = CancellationToken::new();

        assert!(source.fetch_public_key(&ctx, "kid-a").await.is_ok());
        let err = source.fetch_public_key(&ctx, "kid-A").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_cancelled_context_short_circuits() {
        let ctx = CancellationToken::new();
        ctx.cancel();

        let fixed = FixedKeySource::new(key());
        assert!(matches!(
            fixed.fetch_public_key(&ctx, "kid").await,
            Err(KeySourceError::Cancelled)
        ));

        let map = MapKeySource::default().with_key("kid", key());
        assert!(matches!(
            map.fetch_public_key(&ctx, "kid").await,
            Err(KeySourceError::Cancelled)
        ));
    }
}
