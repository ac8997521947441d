//! Parsed token representation.

use serde_json::{Map, Value};

/// Verified claim set; the terminal result of authentication.
pub type Entity = Map<String, Value>;

/// Result of parsing and verifying a token.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToken {
    /// The token as presented
    pub raw: String,
    /// Decoded JOSE header
    pub header: Map<String, Value>,
    /// Claims
    pub claims: Entity,
    /// Raw signature bytes
    pub signature: Vec<u8>,
    /// Whether the signature and time/audience checks passed
    pub valid: bool,
}

impl ParsedToken {
    /// The `kid` header member, or `""` when absent.
    #[must_use]
    pub fn kid(&self) -> &str {
        self.header.get("kid").and_then(Value::as_str).unwrap_or("")
    }

    /// The `alg` header member.
    #[must_use]
    pub fn alg(&self) -> Option<&str> {
        self.header.get("alg").and_then(Value::as_str)
    }

    /// A string claim.
    #[must_use]
    pub fn claim_str(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }

    /// The `sub` claim.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.claim_str("sub")
    }
}
