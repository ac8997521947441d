//! ES512 (ECDSA P-521 with SHA-512) verification.
//!
//! `jsonwebtoken` cannot parse an ES512 header, so these tokens bypass
//! `jsonwebtoken::decode`. The registered claims are checked here against
//! the same [`Validation`] the other algorithms use, and failures are
//! reported as [`ErrorKind`]s so they go through
//! [`classify`](super::classify::classify) like any other library error.

use jsonwebtoken::Validation;
use jsonwebtoken::errors::ErrorKind;
use p521::ecdsa::signature::Verifier;
use p521::ecdsa::{Signature, VerifyingKey};
use serde_json::Value;

use super::token::Entity;

/// Checks a raw `r || s` signature over `signing_input`.
pub(crate) fn verify_signature(
    key: &VerifyingKey,
    signing_input: &str,
    signature: &[u8],
) -> Result<(), ErrorKind> {
    let signature = Signature::from_slice(signature).map_err(|_| ErrorKind::InvalidSignature)?;
    key.verify(signing_input.as_bytes(), &signature)
        .map_err(|_| ErrorKind::InvalidSignature)
}

/// Applies the time, issuer, audience and subject checks of `validation`.
pub(crate) fn validate_claims(
    claims: &Entity,
    validation: &Validation,
    now: u64,
) -> Result<(), ErrorKind> {
    let leeway = validation.leeway;

    if validation.validate_exp {
        if let Some(exp) = numeric_claim(claims, "exp")? {
            if exp < now.saturating_sub(leeway) {
                return Err(ErrorKind::ExpiredSignature);
            }
        }
    }
    if validation.validate_nbf {
        if let Some(nbf) = numeric_claim(claims, "nbf")? {
            if nbf > now.saturating_add(leeway) {
                return Err(ErrorKind::ImmatureSignature);
            }
        }
    }

    if let Some(expected) = &validation.iss {
        match claims.get("iss") {
            None => return Err(ErrorKind::MissingRequiredClaim("iss".to_string())),
            Some(Value::String(iss)) if expected.contains(iss) => {}
            Some(_) => return Err(ErrorKind::InvalidIssuer),
        }
    }

    if validation.validate_aud {
        if let Some(expected) = &validation.aud {
            let matches = match claims.get("aud") {
                None => return Err(ErrorKind::MissingRequiredClaim("aud".to_string())),
                Some(Value::String(aud)) => expected.contains(aud),
                Some(Value::Array(auds)) => auds
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|aud| expected.contains(aud)),
                Some(_) => false,
            };
            if !matches {
                return Err(ErrorKind::InvalidAudience);
            }
        }
    }

    if let Some(expected) = &validation.sub {
        match claims.get("sub") {
            None => return Err(ErrorKind::MissingRequiredClaim("sub".to_string())),
            Some(Value::String(sub)) if sub == expected => {}
            Some(_) => return Err(ErrorKind::InvalidSubject),
        }
    }

    Ok(())
}

fn numeric_claim(claims: &Entity, name: &str) -> Result<Option<u64>, ErrorKind> {
    claims
        .get(name)
        .map(|value| value.as_u64().ok_or(ErrorKind::InvalidToken))
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use serde_json::json;

    const NOW: u64 = 1_700_000_000;

    fn claims(value: serde_json::Value) -> Entity {
        value.as_object().cloned().unwrap()
    }

    fn validation() -> Validation {
        let mut validation = Validation::default();
        validation.required_spec_claims.clear();
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation
    }

    #[test]
    fn test_time_claims() {
        let v = validation();
        assert!(validate_claims(&claims(json!({})), &v, NOW).is_ok());
        assert!(validate_claims(&claims(json!({ "exp": NOW + 10 })), &v, NOW).is_ok());
        assert!(matches!(
            validate_claims(&claims(json!({ "exp": NOW - 10 })), &v, NOW),
            Err(ErrorKind::ExpiredSignature)
        ));
        assert!(matches!(
            validate_claims(&claims(json!({ "nbf": NOW + 10 })), &v, NOW),
            Err(ErrorKind::ImmatureSignature)
        ));
        assert!(matches!(
            validate_claims(&claims(json!({ "exp": "soon" })), &v, NOW),
            Err(ErrorKind::InvalidToken)
        ));
    }

    #[test]
    fn test_leeway() {
        let mut v = validation();
        v.leeway = 60;
        assert!(validate_claims(&claims(json!({ "exp": NOW - 30, "nbf": NOW + 30 })), &v, NOW).is_ok());
    }

    #[test]
    fn test_audience_issuer_subject() {
        let mut v = validation();
        v.set_audience(&["billing"]);
        v.iss = Some(HashSet::from(["https://issuer.test".to_string()]));
        v.sub = Some("user-1".to_string());

        let ok = claims(json!({
            "aud": ["other", "billing"],
            "iss": "https://issuer.test",
            "sub": "user-1",
        }));
        assert!(validate_claims(&ok, &v, NOW).is_ok());

        let mut wrong_aud = ok.clone();
        wrong_aud.insert("aud".into(), json!("payroll"));
        assert!(matches!(
            validate_claims(&wrong_aud, &v, NOW),
            Err(ErrorKind::InvalidAudience)
        ));

        let mut wrong_iss = ok.clone();
        wrong_iss.insert("iss".into(), json!("https://other.test"));
        assert!(matches!(
            validate_claims(&wrong_iss, &v, NOW),
            Err(ErrorKind::InvalidIssuer)
        ));

        let mut wrong_sub = ok.clone();
        wrong_sub.insert("sub".into(), json!("user-2"));
        assert!(matches!(
            validate_claims(&wrong_sub, &v, NOW),
            Err(ErrorKind::InvalidSubject)
        ));

        let mut no_aud = ok;
        no_aud.remove("aud");
        assert!(matches!(
            validate_claims(&no_aud, &v, NOW),
            Err(ErrorKind::MissingRequiredClaim(ref claim)) if claim == "aud"
        ));
    }

    #[test]
    fn test_truncated_signature_rejected() {
        let key = test_utils::fixtures::p521_verifying_key();
        assert!(matches!(
            verify_signature(&key, "a.b", &[0u8; 64]),
            Err(ErrorKind::InvalidSignature)
        ));
    }
}
