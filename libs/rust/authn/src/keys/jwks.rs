//! JWKS-backed key source
//!
//! Fetches a JSON Web Key Set over HTTP and caches the derived public keys.
//! - The cache is refreshed by a background task on a fixed interval
//! - Unknown kids can optionally trigger an on-demand fetch, gated by a
//!   fixed-window rate limiter
//! - Fetches are serialized; the cache is swapped atomically, so readers
//!   never block on I/O and never observe a partially built set
//! - Entries are converted one at a time. Encryption keys are dropped
//!   silently and entries that can't be represented are dropped with a
//!   warning; only an unusable document fails the fetch

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_common::{HttpConfig, HttpGet, build_http_client};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::ready::ReadyTrigger;
use super::{KeySet, KeySource, PublicKey, ReadySignal, WarnFn, tracing_warn};
use crate::error::KeySourceError;
use crate::metrics::AuthMetrics;
use crate::rate_limiter::{FixedWindowRateLimiter, RateLimitDecision};

/// Default background refresh interval.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest accepted refresh interval.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(10);

/// What caused a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchTrigger {
    Initial,
    Refresh,
    OnDemand,
    Manual,
}

impl FetchTrigger {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Refresh => "refresh",
            Self::OnDemand => "on_demand",
            Self::Manual => "manual",
        }
    }
}

/// Options for [`JwksKeySource`].
#[derive(Clone)]
pub struct JwksOptions {
    client: Option<Arc<dyn HttpGet>>,
    refresh_interval: Duration,
    request_on_unknown_kid: bool,
    warn: WarnFn,
    rate_limit: Option<(u32, Duration)>,
    metrics: Option<Arc<AuthMetrics>>,
}

impl Default for JwksOptions {
    fn default() -> Self {
        Self {
            client: None,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            request_on_unknown_kid: false,
            warn: tracing_warn(),
            rate_limit: None,
            metrics: None,
        }
    }
}

impl JwksOptions {
    /// Uses `client` for fetches instead of a default reqwest client.
    #[must_use]
    pub fn with_client(mut self, client: Arc<dyn HttpGet>) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the background refresh interval (default 60s).
    #[must_use]
    pub const fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Fetch the key set when a lookup misses the cache (default off).
    #[must_use]
    pub const fn with_request_on_unknown_kid(mut self, enabled: bool) -> Self {
        self.request_on_unknown_kid = enabled;
        self
    }

    /// Replaces the advisory warning sink.
    #[must_use]
    pub fn with_warn(mut self, warn: WarnFn) -> Self {
        self.warn = warn;
        self
    }

    /// Allows at most `limit` on-demand fetches per `window`. A limit of 0
    /// disables limiting.
    #[must_use]
    pub const fn with_rate_limit(mut self, limit: u32, window: Duration) -> Self {
        self.rate_limit = Some((limit, window));
        self
    }

    /// Records fetch metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<AuthMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl fmt::Debug for JwksOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwksOptions")
            .field("refresh_interval", &self.refresh_interval)
            .field("request_on_unknown_kid", &self.request_on_unknown_kid)
            .field("rate_limit", &self.rate_limit)
            .finish_non_exhaustive()
    }
}

/// State shared between the source and its refresh task.
struct Inner {
    url: String,
    client: Arc<dyn HttpGet>,
    keys: ArcSwap<KeySet>,
    /// Held across the network call and the swap.
    fetch_lock: tokio::sync::Mutex<()>,
    warn: WarnFn,
    metrics: Option<Arc<AuthMetrics>>,
}

impl Inner {
    fn lookup(&self, kid: &str) -> Option<PublicKey> {
        self.keys.load().get(kid).cloned()
    }

    async fn fetch(&self, ctx: &CancellationToken, trigger: FetchTrigger) -> Result<usize, KeySourceError> {
        let result = self.fetch_and_swap(ctx, trigger).await;
        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(_) => "success",
                Err(KeySourceError::Cancelled) => "cancelled",
                Err(_) => "error",
            };
            metrics.record_jwks_fetch(trigger.as_str(), outcome);
        }
        result
    }

    #[instrument(skip(self, ctx), fields(url = %self.url, trigger = trigger.as_str()))]
    async fn fetch_and_swap(
        &self,
        ctx: &CancellationToken,
        trigger: FetchTrigger,
    ) -> Result<usize, KeySourceError> {
        let _guard = tokio::select! {
            biased;
            () = ctx.cancelled() => return Err(KeySourceError::Cancelled),
            guard = self.fetch_lock.lock() => guard,
        };

        let response = tokio::select! {
            biased;
            () = ctx.cancelled() => return Err(KeySourceError::Cancelled),
            response = self.client.get(&self.url) => response,
        }
        .map_err(|e| KeySourceError::Fetch {
            reason: format!("request to {} failed: {e}", self.url),
        })?;

        if !response.is_ok() {
            return Err(KeySourceError::Fetch {
                reason: format!(
                    "unexpected status {} from {}: {}",
                    response.status,
                    self.url,
                    String::from_utf8_lossy(&response.body)
                ),
            });
        }

        let document: Value =
            serde_json::from_slice(&response.body).map_err(|e| KeySourceError::Fetch {
                reason: format!("malformed key set from {}: {e}", self.url),
            })?;
        let entries = document
            .get("keys")
            .and_then(Value::as_array)
            .ok_or_else(|| KeySourceError::Fetch {
                reason: format!("malformed key set from {}: no keys array", self.url),
            })?;

        let mut keys = KeySet::with_capacity(entries.len());
        for entry in entries {
            let kid = entry.get("kid").and_then(Value::as_str).unwrap_or_default();
            if entry.get("use").and_then(Value::as_str) == Some("enc") {
                debug!(kid = %kid, "skipping encryption key");
                continue;
            }
            match PublicKey::from_jwk_value(entry) {
                Ok(key) => {
                    keys.insert(kid.to_string(), key);
                }
                Err(e) => (self.warn)(&format!("skipping JWKS entry {kid:?} from {}: {e}", self.url)),
            }
        }

        let count = keys.len();
        self.keys.store(Arc::new(keys));
        if let Some(metrics) = &self.metrics {
            metrics.set_jwks_keys(count);
        }
        debug!(keys = count, "JWKS cache replaced");
        Ok(count)
    }
}

/// Key source backed by a remote JWKS endpoint.
///
/// Dropping the source stops its refresh task.
pub struct JwksKeySource {
    inner: Arc<Inner>,
    request_on_unknown_kid: bool,
    limiter: Option<FixedWindowRateLimiter>,
    ready: ReadySignal,
    stop: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl JwksKeySource {
    /// Fetches the key set once, then starts background refresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the initial
    /// fetch fails.
    pub async fn new(url: impl Into<String>, options: JwksOptions) -> Result<Self, KeySourceError> {
        let mut source = Self::build(url.into(), &options, ReadySignal::fired())?;

        let count = source.inner.fetch(&source.stop, FetchTrigger::Initial).await?;
        info!(url = %source.inner.url, keys = count, "JWKS loaded");

        source.spawn_refresh(options.refresh_interval, None);
        Ok(source)
    }

    /// Starts the source without waiting for the initial fetch.
    ///
    /// Lookups report [`KeySourceError::NotReady`] until the initial fetch
    /// attempt completes, which the returned [`ReadySignal`] announces
    /// whether or not that attempt succeeded. Must be called within a tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn start(
        url: impl Into<String>,
        options: JwksOptions,
    ) -> Result<(Self, ReadySignal), KeySourceError> {
        let (trigger, ready) = ReadySignal::new();
        let mut source = Self::build(url.into(), &options, ready.clone())?;
        source.spawn_refresh(options.refresh_interval, Some(trigger));
        Ok((source, ready))
    }

    fn build(url: String, options: &JwksOptions, ready: ReadySignal) -> Result<Self, KeySourceError> {
        let client = match &options.client {
            Some(client) => Arc::clone(client),
            None => Arc::new(build_http_client(&HttpConfig::default()).map_err(|e| {
                KeySourceError::Fetch {
                    reason: format!("failed to build HTTP client: {e}"),
                }
            })?),
        };

        let limiter = options
            .rate_limit
            .map(|(limit, window)| FixedWindowRateLimiter::new(limit, window))
            .filter(|limiter| !limiter.is_disabled());

        Ok(Self {
            inner: Arc::new(Inner {
                url,
                client,
                keys: ArcSwap::from_pointee(KeySet::new()),
                fetch_lock: tokio::sync::Mutex::new(()),
                warn: Arc::clone(&options.warn),
                metrics: options.metrics.clone(),
            }),
            request_on_unknown_kid: options.request_on_unknown_kid,
            limiter,
            ready,
            stop: CancellationToken::new(),
            task: Mutex::new(None),
        })
    }

    fn spawn_refresh(&mut self, interval: Duration, initial: Option<ReadyTrigger>) {
        let handle = tokio::spawn(refresh_loop(
            Arc::clone(&self.inner),
            self.stop.clone(),
            interval.max(MIN_REFRESH_INTERVAL),
            initial,
        ));
        *self.task.get_mut() = Some(handle);
    }

    /// Readiness of the initial fetch.
    #[must_use]
    pub fn ready(&self) -> ReadySignal {
        self.ready.clone()
    }

    /// The JWKS endpoint.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Number of cached keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.inner.keys.load().len()
    }

    /// Whether [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Fetches the key set now, bypassing the rate limiter.
    ///
    /// Returns the number of keys in the new set.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is stopped, `ctx` is cancelled, or the
    /// fetch fails. The cache is left untouched on error.
    pub async fn refresh(&self, ctx: &CancellationToken) -> Result<usize, KeySourceError> {
        if self.is_stopped() {
            return Err(KeySourceError::Fetch {
                reason: "key source is stopped".to_string(),
            });
        }
        self.inner.fetch(ctx, FetchTrigger::Manual).await
    }

    /// Stops background refresh and on-demand fetching. Idempotent.
    ///
    /// Cached keys remain available.
    pub fn stop(&self) {
        if !self.stop.is_cancelled() {
            info!(url = %self.inner.url, "stopping JWKS refresh");
            self.stop.cancel();
        }
    }

    /// Stops the source and waits for the refresh task to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "JWKS refresh task ended abnormally");
            }
        }
    }
}

impl Drop for JwksKeySource {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

impl fmt::Debug for JwksKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwksKeySource")
            .field("url", &self.inner.url)
            .field("keys", &self.key_count())
            .field("request_on_unknown_kid", &self.request_on_unknown_kid)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KeySource for JwksKeySource {
    async fn fetch_public_key(
        &self,
        ctx: &CancellationToken,
        kid: &str,
    ) -> Result<PublicKey, KeySourceError> {
        if ctx.is_cancelled() {
            return Err(KeySourceError::Cancelled);
        }
        if !self.ready.is_ready() {
            return Err(KeySourceError::NotReady);
        }
        if let Some(key) = self.inner.lookup(kid) {
            return Ok(key);
        }
        if !self.request_on_unknown_kid || self.is_stopped() {
            return Err(KeySourceError::not_found(kid));
        }

        if let Some(limiter) = &self.limiter {
            if let RateLimitDecision::Denied { retry_after } = limiter.check() {
                (self.inner.warn)(&format!(
                    "JWKS rate limit exceeded, not fetching for unknown kid {kid:?} (retry after {}s)",
                    retry_after.as_secs()
                ));
                return Err(KeySourceError::not_found(kid));
            }
        }

        // Abandoning the fetch before the swap leaves the cache as it was.
        tokio::select! {
            biased;
            () = self.stop.cancelled() => return Err(KeySourceError::not_found(kid)),
            result = self.inner.fetch(ctx, FetchTrigger::OnDemand) => result?,
        };
        self.inner
            .lookup(kid)
            .ok_or_else(|| KeySourceError::not_found(kid))
    }
}

async fn refresh_loop(
    inner: Arc<Inner>,
    stop: CancellationToken,
    interval: Duration,
    initial: Option<ReadyTrigger>,
) {
    if let Some(trigger) = initial {
        match inner.fetch(&stop, FetchTrigger::Initial).await {
            Ok(count) => info!(url = %inner.url, keys = count, "JWKS loaded"),
            Err(KeySourceError::Cancelled) => {}
            Err(e) => warn!(url = %inner.url, error = %e, "initial JWKS fetch failed"),
        }
        trigger.fire();
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            _ = ticker.tick() => {
                match inner.fetch(&stop, FetchTrigger::Refresh).await {
                    Ok(count) => debug!(url = %inner.url, keys = count, "JWKS refreshed"),
                    Err(KeySourceError::Cancelled) => break,
                    Err(e) => warn!(url = %inner.url, error = %e, "JWKS refresh failed"),
                }
            }
        }
    }

    debug!(url = %inner.url, "JWKS refresh loop exited");
}
