//! Authentication orchestrator
//!
//! Ties a [`TokenParser`] to a [`KeySource`] and exposes a single
//! token-to-claims operation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::AuthError;
use crate::jwt::{Entity, JwtParser, ParsedToken, TokenParser};
use crate::keys::KeySource;
use crate::metrics::AuthMetrics;

/// Hook run on every successfully parsed token, before it is returned.
///
/// May inspect or mutate the token; an error aborts authentication and is
/// returned unchanged.
pub type PostParseHook = Arc<dyn Fn(&mut ParsedToken) -> Result<(), AuthError> + Send + Sync>;

/// Token-to-claims authentication.
#[async_trait]
pub trait Authenticate: Send + Sync {
    /// Authenticates `raw` and returns its verified claims.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] describing why the token was rejected.
    async fn authenticate(&self, ctx: &CancellationToken, raw: &str) -> Result<Entity, AuthError>;
}

#[async_trait]
impl<T: Authenticate + ?Sized> Authenticate for Arc<T> {
    async fn authenticate(&self, ctx: &CancellationToken, raw: &str) -> Result<Entity, AuthError> {
        (**self).authenticate(ctx, raw).await
    }
}

/// Parser plus key source plus optional hook.
pub struct Authenticator {
    parser: Arc<dyn TokenParser>,
    keys: Arc<dyn KeySource>,
    hook: Option<PostParseHook>,
    metrics: Option<Arc<AuthMetrics>>,
}

impl Authenticator {
    /// Creates an authenticator using the default [`JwtParser`].
    #[must_use]
    pub fn new(keys: Arc<dyn KeySource>) -> Self {
        Self::with_parser(Arc::new(JwtParser::default()), keys)
    }

    /// Creates an authenticator with an explicit parser.
    #[must_use]
    pub fn with_parser(parser: Arc<dyn TokenParser>, keys: Arc<dyn KeySource>) -> Self {
        Self {
            parser,
            keys,
            hook: None,
            metrics: None,
        }
    }

    /// Installs a post-parse hook.
    #[must_use]
    pub fn with_hook(mut self, hook: PostParseHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Records outcomes to `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<AuthMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn run(&self, ctx: &CancellationToken, raw: &str) -> Result<Entity, AuthError> {
        let mut token = match self.parser.parse(ctx, raw, self.keys.as_ref()).await {
            Ok(token) => token,
            Err(err @ AuthError::TokenUnverifiable { .. }) => return Err(err),
            Err(err) => return Err(AuthError::ParseFailed(Box::new(err))),
        };

        if let Some(hook) = &self.hook {
            hook(&mut token)?;
        }

        if !token.valid {
            return Err(AuthError::not_authenticated("token is not valid"));
        }
        Ok(token.claims)
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("hook", &self.hook.is_some())
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

fn outcome(result: &Result<Entity, AuthError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(err) if err.is_bad_token() => "bad_token",
        Err(err) if err.is_unverifiable() => "unverifiable",
        Err(err) if err.is_not_authenticated() => "not_authenticated",
        Err(err) if err.is_cancelled() => "cancelled",
        Err(_) => "error",
    }
}

#[async_trait]
impl Authenticate for Authenticator {
    #[instrument(skip_all)]
    async fn authenticate(&self, ctx: &CancellationToken, raw: &str) -> Result<Entity, AuthError> {
        let result = self.run(ctx, raw).await;
        let outcome = outcome(&result);
        debug!(outcome, "authentication finished");
        if let Some(metrics) = &self.metrics {
            metrics.record_authentication(outcome);
        }
        result
    }
}
