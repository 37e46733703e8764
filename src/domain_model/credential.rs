use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Bearer credential as issued by the auth endpoint.
///
/// The token is opaque to the client except for its `exp` claim, which is
/// read without verifying the signature. The server stays the authority on
/// validity; the client only uses the claim to refresh ahead of time.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: i64,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Expiry instant from the embedded claims, `None` when the token does
    /// not decode. Callers treat `None` as valid with unknown expiry.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let mut v = Validation::new(Algorithm::HS256);
        v.insecure_disable_signature_validation();
        v.validate_exp = false;
        v.validate_aud = false;
        v.required_spec_claims = HashSet::from(["exp".to_string()]);

        let data = decode::<ExpiryClaims>(&self.0, &DecodingKey::from_secret(&[]), &v).ok()?;
        DateTime::<Utc>::from_timestamp(data.claims.exp, 0)
    }
}

// Tokens never end up in logs in full.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head: String = self.0.chars().take(8).collect();
        write!(f, "Credential({head}…)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    fn mint(claims: serde_json::Value) -> Credential {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"server-side-secret"),
        )
        .expect("encode");
        Credential::new(token)
    }

    #[test]
    fn reads_exp_claim_without_the_signing_key() {
        let exp = Utc::now() + Duration::minutes(10);
        let credential = mint(json!({ "sub": "42", "exp": exp.timestamp() }));

        assert_eq!(credential.expires_at().map(|t| t.timestamp()), Some(exp.timestamp()));
    }

    #[test]
    fn already_expired_token_still_reports_its_expiry() {
        let exp = Utc::now() - Duration::hours(1);
        let credential = mint(json!({ "exp": exp.timestamp(), "aud": "crm" }));

        assert_eq!(credential.expires_at().map(|t| t.timestamp()), Some(exp.timestamp()));
    }

    #[test]
    fn opaque_token_has_unknown_expiry() {
        assert_eq!(Credential::new("not-a-jwt").expires_at(), None);
    }

    #[test]
    fn token_without_exp_has_unknown_expiry() {
        let credential = mint(json!({ "sub": "42" }));
        assert_eq!(credential.expires_at(), None);
    }

    #[test]
    fn debug_output_hides_the_token() {
        let credential = Credential::new("abcdefghijklmnopqrstuvwxyz");
        let printed = format!("{credential:?}");
        assert!(!printed.contains("ijklmnop"));
    }
}
