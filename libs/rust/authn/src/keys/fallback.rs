//! Fallback between two named key sources.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{KeySource, PublicKey, WarnFn, tracing_warn};
use crate::error::KeySourceError;

/// Tries a primary source and, on any error, a secondary one.
///
/// Each failed primary lookup emits exactly one warning naming both sources;
/// the secondary's result is returned unchanged.
pub struct FallbackKeySource {
    primary_name: String,
    primary: Arc<dyn KeySource>,
    secondary_name: String,
    secondary: Arc<dyn KeySource>,
    warn: WarnFn,
}

impl FallbackKeySource {
    /// Creates a fallback from `primary` to `secondary`.
    pub fn new(
        primary_name: impl Into<String>,
        primary: Arc<dyn KeySource>,
        secondary_name: impl Into<String>,
        secondary: Arc<dyn KeySource>,
    ) -> Self {
        Self {
            primary_name: primary_name.into(),
            primary,
            secondary_name: secondary_name.into(),
            secondary,
            warn: tracing_warn(),
        }
    }

    /// Replaces the warning sink.
    #[must_use]
    pub fn with_warn(mut self, warn: WarnFn) -> Self {
        self.warn = warn;
        self
    }
}

impl fmt::Debug for FallbackKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackKeySource")
            .field("primary", &self.primary_name)
            .field("secondary", &self.secondary_name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KeySource for FallbackKeySource {
    async fn fetch_public_key(
        &self,
        ctx: &CancellationToken,
        kid: &str,
    ) -> Result<PublicKey, KeySourceError> {
        match self.primary.fetch_public_key(ctx, kid).await {
            Ok(key) => Ok(key),
            Err(err) => {
                (self.warn)(&format!(
                    "key source {:?} failed for kid {kid:?}, falling back to {:?}: {err}",
                    self.primary_name, self.secondary_name
                ));
                self.secondary.fetch_public_key(ctx, kid).await
            }
        }
    }
}
