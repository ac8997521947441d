//! Authentication service assembled from configuration.
//!
//! With JWKS enabled the key source is a [`JwksKeySource`] over a retrying
//! HTTP client, falling back to the fixed key when one is configured. With
//! JWKS disabled the fixed key is the only source.

use std::fmt;
use std::sync::Arc;

use rust_common::{HttpConfig, HttpGet, RetryConfig, RetryPolicy, RetryingClient, build_http_client};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adapter::{ErrorAdapter, ServiceAuthError};
use crate::authenticator::{Authenticator, PostParseHook};
use crate::config::{AuthConfig, ConfigError};
use crate::error::KeySourceError;
use crate::jwt::{Entity, JwtParser};
use crate::keys::{
    FallbackKeySource, FixedKeySource, JwksKeySource, JwksOptions, KeySource, ReadySignal, WarnFn,
    tracing_warn,
};
use crate::metrics::AuthMetrics;

/// Name of the JWKS source in fallback warnings.
pub const JWKS_SOURCE_NAME: &str = "jwks";
/// Name of the fixed key source in fallback warnings.
pub const FIXED_KEY_SOURCE_NAME: &str = "fixed-key";

/// Errors building an [`AuthService`].
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BuildError {
    /// Configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The JWKS source could not be started
    #[error("failed to start JWKS key source: {0}")]
    KeySource(#[from] KeySourceError),
}

/// Bearer token authentication service.
pub struct AuthService {
    adapter: ErrorAdapter<Authenticator>,
    jwks: Option<Arc<JwksKeySource>>,
    ready: ReadySignal,
}

impl AuthService {
    /// Starts building a service from `config`.
    #[must_use]
    pub fn builder(config: AuthConfig) -> AuthServiceBuilder {
        AuthServiceBuilder::new(config)
    }

    /// Builds a service from `config` with default collaborators.
    ///
    /// # Errors
    ///
    /// See [`AuthServiceBuilder::build`].
    pub async fn from_config(config: AuthConfig) -> Result<Self, BuildError> {
        Self::builder(config).build().await
    }

    /// Authenticates a bearer token.
    ///
    /// # Errors
    ///
    /// Returns the service-level error for a rejected token.
    pub async fn authenticate(
        &self,
        ctx: &CancellationToken,
        raw: &str,
    ) -> Result<Entity, ServiceAuthError> {
        self.adapter.authenticate(ctx, raw).await
    }

    /// Readiness of the key source. Already fired unless JWKS runs in
    /// non-blocking mode.
    #[must_use]
    pub fn ready(&self) -> ReadySignal {
        self.ready.clone()
    }

    /// The JWKS source, when JWKS is enabled.
    #[must_use]
    pub fn jwks(&self) -> Option<&Arc<JwksKeySource>> {
        self.jwks.as_ref()
    }

    /// Stops background key refresh and waits for it to exit.
    pub async fn shutdown(&self) {
        if let Some(jwks) = &self.jwks {
            jwks.shutdown().await;
        }
        info!("authentication service shut down");
    }
}

impl fmt::Debug for AuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthService")
            .field("jwks", &self.jwks)
            .field("ready", &self.ready.is_ready())
            .finish_non_exhaustive()
    }
}

/// Builder for [`AuthService`].
pub struct AuthServiceBuilder {
    config: AuthConfig,
    client: Option<Arc<dyn HttpGet>>,
    hook: Option<PostParseHook>,
    metrics: Option<Arc<AuthMetrics>>,
    warn: WarnFn,
}

impl AuthServiceBuilder {
    fn new(config: AuthConfig) -> Self {
        Self {
            config,
            client: None,
            hook: None,
            metrics: None,
            warn: tracing_warn(),
        }
    }

    /// Uses `client` for JWKS requests. It is still wrapped in the retry
    /// policy.
    #[must_use]
    pub fn with_http_client(mut self, client: Arc<dyn HttpGet>) -> Self {
        self.client = Some(client);
        self
    }

    /// Installs a post-parse hook.
    #[must_use]
    pub fn with_hook(mut self, hook: PostParseHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Records metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<AuthMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replaces the warning sink for key source advisories.
    #[must_use]
    pub fn with_warn(mut self, warn: WarnFn) -> Self {
        self.warn = warn;
        self
    }

    /// Validates the configuration and starts the key sources.
    ///
    /// In blocking mode this waits for the initial JWKS fetch.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the JWKS source
    /// fails to start.
    pub async fn build(self) -> Result<AuthService, BuildError> {
        self.config.validate()?;

        let fixed: Option<Arc<dyn KeySource>> = self
            .config
            .fixed_public_key
            .clone()
            .map(|key| Arc::new(FixedKeySource::new(key)) as Arc<dyn KeySource>);

        let (keys, jwks, ready) = if self.config.jwks.enabled {
            let source = Arc::new(self.start_jwks().await?);
            let ready = source.ready();
            let keys: Arc<dyn KeySource> = match fixed {
                Some(fixed) => Arc::new(
                    FallbackKeySource::new(
                        JWKS_SOURCE_NAME,
                        source.clone(),
                        FIXED_KEY_SOURCE_NAME,
                        fixed,
                    )
                    .with_warn(Arc::clone(&self.warn)),
                ),
                None => source.clone(),
            };
            (keys, Some(source), ready)
        } else {
            let keys = fixed.ok_or_else(|| {
                ConfigError::MissingRequired("fixed_public_key (required when JWKS is disabled)".to_string())
            })?;
            (keys, None, ReadySignal::fired())
        };

        let mut authenticator =
            Authenticator::with_parser(Arc::new(JwtParser::new(self.config.parser_options())), keys);
        if let Some(hook) = self.hook {
            authenticator = authenticator.with_hook(hook);
        }
        if let Some(metrics) = self.metrics {
            authenticator = authenticator.with_metrics(metrics);
        }

        info!(
            jwks = self.config.jwks.enabled,
            fixed_key = self.config.fixed_public_key.is_some(),
            "authentication service started"
        );

        Ok(AuthService {
            adapter: ErrorAdapter::new(authenticator),
            jwks,
            ready,
        })
    }

    async fn start_jwks(&self) -> Result<JwksKeySource, BuildError> {
        let jwks = &self.config.jwks;

        let base: Arc<dyn HttpGet> = match &self.client {
            Some(client) => Arc::clone(client),
            None => Arc::new(build_http_client(&HttpConfig::default()).map_err(|e| {
                KeySourceError::Fetch {
                    reason: format!("failed to build HTTP client: {e}"),
                }
            })?),
        };
        let policy = RetryPolicy::new(RetryConfig::default().with_max_retries(jwks.max_retries));

        let mut options = JwksOptions::default()
            .with_client(Arc::new(RetryingClient::new(base, policy)))
            .with_refresh_interval(jwks.refresh_interval)
            .with_request_on_unknown_kid(jwks.request_on_unknown_kid)
            .with_rate_limit(jwks.request_rate_limit, jwks.request_rate_limit_window)
            .with_warn(Arc::clone(&self.warn));
        if let Some(metrics) = &self.metrics {
            options = options.with_metrics(Arc::clone(metrics));
        }

        if jwks.non_blocking {
            let (source, _ready) = JwksKeySource::start(jwks.endpoint.clone(), options)?;
            Ok(source)
        } else {
            Ok(JwksKeySource::new(jwks.endpoint.clone(), options).await?)
        }
    }
}

impl fmt::Debug for AuthServiceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthServiceBuilder")
            .field("config", &self.config)
            .field("hook", &self.hook.is_some())
            .finish_non_exhaustive()
    }
}
