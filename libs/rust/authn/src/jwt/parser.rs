//! Token verification against a key source.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::Validation;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::algorithm::SigningAlgorithm;
use super::classify::classify;
use super::es512;
use super::token::{Entity, ParsedToken};
use crate::error::AuthError;
use crate::keys::{KeyMaterial, KeySource, PublicKey};

/// Algorithms accepted when none are configured.
pub const DEFAULT_ALGORITHMS: [SigningAlgorithm; 9] = [
    SigningAlgorithm::ES256,
    SigningAlgorithm::ES384,
    SigningAlgorithm::ES512,
    SigningAlgorithm::PS256,
    SigningAlgorithm::PS384,
    SigningAlgorithm::PS512,
    SigningAlgorithm::RS256,
    SigningAlgorithm::RS384,
    SigningAlgorithm::RS512,
];

/// Verifies raw tokens.
#[async_trait]
pub trait TokenParser: Send + Sync {
    /// Parses and verifies `raw`, resolving its signing key through `keys`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::BadToken`] for malformed tokens, disallowed algorithms,
    ///   or bad signatures
    /// - [`AuthError::NotAuthenticated`] for failed time or claim checks
    /// - [`AuthError::TokenUnverifiable`] when no key exists for the kid
    /// - [`AuthError::KeySource`] for any other key source failure
    async fn parse(
        &self,
        ctx: &CancellationToken,
        raw: &str,
        keys: &dyn KeySource,
    ) -> Result<ParsedToken, AuthError>;
}

/// Claim checks applied after signature verification.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Accepted signing algorithms
    pub valid_algorithms: Vec<SigningAlgorithm>,
    /// Accepted audiences; empty skips the check
    pub audience: Vec<String>,
    /// Accepted issuers; empty skips the check
    pub issuer: Vec<String>,
    /// Required subject
    pub subject: Option<String>,
    /// Claims that must be present
    pub required_claims: Vec<String>,
    /// Clock skew tolerance for `exp` and `nbf`
    pub leeway: Duration,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            valid_algorithms: DEFAULT_ALGORITHMS.to_vec(),
            audience: Vec::new(),
            issuer: Vec::new(),
            subject: None,
            required_claims: Vec::new(),
            leeway: Duration::ZERO,
        }
    }
}

impl ParserOptions {
    /// Restricts accepted algorithms.
    #[must_use]
    pub fn with_algorithms(mut self, algorithms: impl IntoIterator<Item = SigningAlgorithm>) -> Self {
        self.valid_algorithms = algorithms.into_iter().collect();
        self
    }

    /// Adds an accepted audience.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience.push(audience.into());
        self
    }

    /// Adds an accepted issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer.push(issuer.into());
        self
    }

    /// Requires the `sub` claim to equal `subject`.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Requires `claim` to be present.
    #[must_use]
    pub fn with_required_claim(mut self, claim: impl Into<String>) -> Self {
        self.required_claims.push(claim.into());
        self
    }

    /// Sets the clock skew tolerance.
    #[must_use]
    pub const fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }
}

/// JWS compact-serialization parser backed by `jsonwebtoken`.
#[derive(Debug, Clone, Default)]
pub struct JwtParser {
    options: ParserOptions,
}

impl JwtParser {
    /// Creates a parser.
    #[must_use]
    pub const fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    /// The parser's options.
    #[must_use]
    pub const fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Claim checks shared by every algorithm. The caller sets the
    /// `jsonwebtoken` algorithm list where one applies.
    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.required_spec_claims.clear();
        validation.validate_nbf = true;
        validation.leeway = self.options.leeway.as_secs();

        if self.options.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(self.options.audience.as_slice());
        }
        if !self.options.issuer.is_empty() {
            validation.set_issuer(self.options.issuer.as_slice());
        }
        validation.sub.clone_from(&self.options.subject);
        validation
    }

    /// Checks the signature and registered claims of `raw` with `key`.
    fn verify(
        &self,
        raw: &str,
        alg: SigningAlgorithm,
        key: &PublicKey,
        signature: &[u8],
    ) -> Result<Entity, jsonwebtoken::errors::Error> {
        let mut validation = self.validation();
        match (alg.to_jwt(), key.material()) {
            (Some(jwt_alg), KeyMaterial::Jwt(decoding_key)) => {
                validation.algorithms = vec![jwt_alg];
                jsonwebtoken::decode::<Entity>(raw, decoding_key, &validation).map(|data| data.claims)
            }
            (None, KeyMaterial::P521(verifying_key)) => {
                let signing_input = raw
                    .rsplit_once('.')
                    .map_or(raw, |(signing_input, _)| signing_input);
                es512::verify_signature(verifying_key, signing_input, signature)?;

                let payload = signing_input.split_once('.').map_or("", |(_, payload)| payload);
                let payload = URL_SAFE_NO_PAD
                    .decode(payload)
                    .map_err(jsonwebtoken::errors::Error::from)?;
                let claims: Entity =
                    serde_json::from_slice(&payload).map_err(jsonwebtoken::errors::Error::from)?;
                es512::validate_claims(&claims, &validation, jsonwebtoken::get_current_timestamp())?;
                Ok(claims)
            }
            _ => Err(jsonwebtoken::errors::ErrorKind::InvalidAlgorithm.into()),
        }
    }
}

fn decode_segment(segment: &str, what: &str) -> Result<Vec<u8>, AuthError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::bad_token(format!("token {what} is not valid base64url: {e}")))
}

#[async_trait]
impl TokenParser for JwtParser {
    async fn parse(
        &self,
        ctx: &CancellationToken,
        raw: &str,
        keys: &dyn KeySource,
    ) -> Result<ParsedToken, AuthError> {
        let mut segments = raw.split('.');
        let (Some(header_b64), Some(_), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(AuthError::bad_token("token contains an invalid number of segments"));
        };

        let header: Map<String, Value> = serde_json::from_slice(&decode_segment(header_b64, "header")?)
            .map_err(|e| AuthError::bad_token(format!("token header is not a JSON object: {e}")))?;

        let alg_name = header
            .get("alg")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::bad_token("token header has no alg"))?;
        let alg = SigningAlgorithm::from_str(alg_name)
            .ok()
            .filter(|alg| self.options.valid_algorithms.contains(alg))
            .ok_or_else(|| AuthError::bad_token(format!("signing method {alg_name} is invalid")))?;

        let kid = match header.get("kid") {
            None => "",
            Some(Value::String(kid)) => kid.as_str(),
            Some(_) => return Err(AuthError::bad_token("token kid header is not a string")),
        };

        let signature = decode_segment(signature_b64, "signature")?;

        let key = keys.fetch_public_key(ctx, kid).await?;
        if !key.permits(alg) {
            return Err(AuthError::bad_token(format!(
                "signing method {alg_name} does not match key {kid:?}"
            )));
        }

        let claims = self.verify(raw, alg, &key, &signature).map_err(|e| {
            debug!(kid = %kid, alg = %alg, error = %e, "token verification failed");
            classify(&e)
        })?;

        if let Some(missing) = self
            .options
            .required_claims
            .iter()
            .find(|claim| !claims.contains_key(claim.as_str()))
        {
            return Err(AuthError::not_authenticated(format!(
                "token is missing required claim {missing:?}"
            )));
        }

        Ok(ParsedToken {
            raw: raw.to_string(),
            header,
            claims,
            signature,
            valid: true,
        })
    }
}
