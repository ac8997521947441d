//! Bearer token authentication backed by JWKS key sources.
//!
//! - [`keys`]: key sources (fixed, map, JWKS with background refresh, fallback)
//! - [`jwt`]: token parsing, verification, and error classification
//! - [`authenticator`]: the token-to-claims contract
//! - [`adapter`]: service-level error taxonomy and gRPC statuses
//! - [`service`]: everything assembled from [`config::AuthConfig`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod authenticator;
pub mod config;
pub mod error;
pub mod jwt;
pub mod keys;
pub mod metrics;
pub mod rate_limiter;
pub mod service;

pub use adapter::{ErrorAdapter, ErrorCode, ServiceAuthError};
pub use authenticator::{Authenticate, Authenticator, PostParseHook};
pub use config::{AuthConfig, ConfigError, JwksConfig};
pub use error::{AuthError, KeySourceError};
pub use jwt::{Entity, JwtParser, ParsedToken, ParserOptions, SigningAlgorithm, TokenParser};
pub use keys::{
    FallbackKeySource, FixedKeySource, JwksKeySource, JwksOptions, KeySet, KeySource,
    MapKeySource, PublicKey, ReadySignal, WarnFn,
};
pub use metrics::AuthMetrics;
pub use rate_limiter::{FixedWindowRateLimiter, RateLimitDecision};
pub use service::{AuthService, AuthServiceBuilder, BuildError};
