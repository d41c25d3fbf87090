//! Access-token inspection for route gating
//!
//! Only the `exp` claim is read. Signatures are not verified: the server is
//! the authority on token validity, this merely avoids sending a token that
//! is known to be stale.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

/// Outcome of an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStatus {
    Authorized,
    Unauthorized,
}

impl AccessStatus {
    pub const fn is_authorized(self) -> bool {
        matches!(self, Self::Authorized)
    }
}

/// Claims read from a stored access token
#[derive(Debug, Clone, Deserialize)]
pub struct AccessClaims {
    /// Expiration time (as UTC timestamp)
    pub exp: Option<i64>,
}

impl AccessClaims {
    /// A token without `exp` never counts as expired
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp.is_some_and(|exp| exp < now)
    }
}

/// Decode a JWT's claims without checking its signature or expiry
///
/// Returns `None` if the token is not a well-formed JWT.
pub fn decode_claims(token: &str) -> Option<AccessClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<AccessClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|token_data| token_data.claims)
        .ok()
}

#[cfg(test)]
fn sign_test_claims(claims: &serde_json::Value) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};
    encode(&Header::default(), claims, &EncodingKey::from_secret(b"test-secret")).unwrap()
}

#[cfg(test)]
pub(crate) fn encode_test_token(exp: i64) -> String {
    sign_test_claims(&serde_json::json!({ "user_id": 1, "exp": exp }))
}
