//! Type-Safe Configuration with Validation
//!
//! Authentication settings loaded from `AUTH_*` environment variables.
//! [`AuthConfig::from_lookup`] takes any variable lookup so configurations can
//! be built in tests without touching the process environment.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::jwt::{DEFAULT_ALGORITHMS, ParserOptions, SigningAlgorithm};
use crate::keys::PublicKey;

/// Configuration errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },

    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Variable name
        field: String,
        /// Parser message
        reason: String,
    },

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// A count or duration was negative
    #[error("Invalid {name}: must not be negative")]
    Negative {
        /// Variable name
        name: String,
    },

    /// Retry count was zero
    #[error("Invalid max retries: must be greater than 0")]
    InvalidRetries,

    /// Fixed public key could not be read or parsed
    #[error("Invalid fixed public key: {reason}")]
    InvalidKey {
        /// Description of the failure
        reason: String,
    },
}

/// JWKS key source settings.
#[derive(Debug, Clone)]
pub struct JwksConfig {
    /// Whether to use a JWKS endpoint at all
    pub enabled: bool,
    /// JWKS endpoint URL
    pub endpoint: String,
    /// Maximum on-demand fetches per window (0 = unlimited)
    pub request_rate_limit: u32,
    /// Rate limit window
    pub request_rate_limit_window: Duration,
    /// HTTP retries per fetch (must be > 0)
    pub max_retries: u32,
    /// Fetch the key set when a token names an unknown kid
    pub request_on_unknown_kid: bool,
    /// Background refresh interval
    pub refresh_interval: Duration,
    /// Start without waiting for the first fetch
    pub non_blocking: bool,
}

impl Default for JwksConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: String::new(),
            request_rate_limit: 0,
            request_rate_limit_window: Duration::from_secs(60),
            max_retries: 3,
            request_on_unknown_kid: false,
            refresh_interval: Duration::from_secs(60),
            non_blocking: false,
        }
    }
}

/// Authentication service configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Accepted token signing algorithms
    pub valid_signing_algorithms: Vec<SigningAlgorithm>,
    /// JWKS settings
    pub jwks: JwksConfig,
    /// Key used when JWKS is disabled, or as fallback when it fails
    pub fixed_public_key: Option<PublicKey>,
    /// Accepted audiences; empty skips the check
    pub audience: Vec<String>,
    /// Accepted issuers; empty skips the check
    pub issuer: Vec<String>,
    /// Clock skew tolerance
    pub leeway: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            valid_signing_algorithms: DEFAULT_ALGORITHMS.to_vec(),
            jwks: JwksConfig::default(),
            fixed_public_key: None,
            audience: Vec::new(),
            issuer: Vec::new(),
            leeway: Duration::ZERO,
        }
    }
}

impl AuthConfig {
    /// Loads configuration from environment variables with validation.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable fails to parse or validation fails.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup` with validation.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable fails to parse or validation fails.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = JwksConfig::default();

        let valid_signing_algorithms = match lookup("AUTH_VALID_SIGNING_ALGORITHMS") {
            Some(list) => parse_algorithms("AUTH_VALID_SIGNING_ALGORITHMS", &list)?,
            None => DEFAULT_ALGORITHMS.to_vec(),
        };

        let jwks = JwksConfig {
            enabled: parse_var(&lookup, "AUTH_JWKS_ENABLED", defaults.enabled)?,
            endpoint: lookup("AUTH_JWKS_ENDPOINT").unwrap_or_default(),
            request_rate_limit: parse_non_negative(
                &lookup,
                "AUTH_JWKS_REQUEST_RATE_LIMIT",
                defaults.request_rate_limit,
            )?,
            request_rate_limit_window: Duration::from_secs(parse_non_negative(
                &lookup,
                "AUTH_JWKS_REQUEST_RATE_LIMIT_WINDOW_SECS",
                defaults.request_rate_limit_window.as_secs(),
            )?),
            max_retries: parse_var(&lookup, "AUTH_JWKS_MAX_RETRIES", defaults.max_retries)?,
            request_on_unknown_kid: parse_var(
                &lookup,
                "AUTH_JWKS_REQUEST_ON_UNKNOWN_KID",
                defaults.request_on_unknown_kid,
            )?,
            refresh_interval: Duration::from_secs(parse_var(
                &lookup,
                "AUTH_JWKS_REFRESH_INTERVAL_SECS",
                defaults.refresh_interval.as_secs(),
            )?),
            non_blocking: parse_var(&lookup, "AUTH_JWKS_NON_BLOCKING", defaults.non_blocking)?,
        };

        let fixed_public_key = match (lookup("AUTH_FIXED_PUBLIC_KEY"), lookup("AUTH_FIXED_PUBLIC_KEY_FILE")) {
            (Some(pem), _) => Some(parse_key(pem.as_bytes())?),
            (None, Some(path)) => {
                let pem = std::fs::read(&path).map_err(|e| ConfigError::InvalidKey {
                    reason: format!("cannot read {path}: {e}"),
                })?;
                Some(parse_key(&pem)?)
            }
            (None, None) => None,
        };

        let config = Self {
            valid_signing_algorithms,
            jwks,
            fixed_public_key,
            audience: parse_list(lookup("AUTH_AUDIENCE")),
            issuer: parse_list(lookup("AUTH_ISSUER")),
            leeway: Duration::from_secs(parse_var(&lookup, "AUTH_LEEWAY_SECS", 0)?),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// - JWKS disabled without a fixed public key
    /// - JWKS enabled with an empty or malformed endpoint
    /// - JWKS enabled with zero max retries
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.valid_signing_algorithms.is_empty() {
            return Err(ConfigError::MissingRequired(
                "valid_signing_algorithms".to_string(),
            ));
        }

        if !self.jwks.enabled {
            if self.fixed_public_key.is_none() {
                return Err(ConfigError::MissingRequired(
                    "fixed_public_key (required when JWKS is disabled)".to_string(),
                ));
            }
            return Ok(());
        }

        if self.jwks.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwks.endpoint".to_string()));
        }
        Url::parse(&self.jwks.endpoint).map_err(|e| ConfigError::InvalidUrl {
            field: "jwks.endpoint".to_string(),
            reason: e.to_string(),
        })?;
        if self.jwks.max_retries == 0 {
            return Err(ConfigError::InvalidRetries);
        }
        Ok(())
    }

    /// Parser options derived from this configuration.
    #[must_use]
    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            valid_algorithms: self.valid_signing_algorithms.clone(),
            audience: self.audience.clone(),
            issuer: self.issuer.clone(),
            leeway: self.leeway,
            ..ParserOptions::default()
        }
    }
}

/// Parse a variable with a default value.
fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse an unsigned variable, reporting negative input distinctly.
fn parse_non_negative<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: TryFrom<i64>,
{
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    let value: i64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
        ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }
    })?;
    if value < 0 {
        return Err(ConfigError::Negative {
            name: name.to_string(),
        });
    }
    T::try_from(value).map_err(|_| ConfigError::ParseError {
        name: name.to_string(),
        reason: "value out of range".to_string(),
    })
}

/// Parse a comma-separated list.
fn parse_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_algorithms(name: &str, list: &str) -> Result<Vec<SigningAlgorithm>, ConfigError> {
    parse_list(Some(list.to_string()))
        .iter()
        .map(|alg| {
            SigningAlgorithm::from_str(alg).map_err(|e| ConfigError::ParseError {
                name: name.to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}

fn parse_key(pem: &[u8]) -> Result<PublicKey, ConfigError> {
    PublicKey::from_pem(pem).map_err(|e| ConfigError::InvalidKey {
        reason: e.to_string(),
    })
}
