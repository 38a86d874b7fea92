//! Token verification against the realm's signing keys.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Malformed tokens are rejected without touching the network
//! - Symmetric algorithms are never accepted; the header algorithm must
//!   match the located key's family and declared algorithm
//! - Every successful decode has verified the signature
//! - Failures carry short generic messages; details go to debug logs

use crate::claims::{VerifiedToken, BEARER_TOKEN_TYPE};
use crate::clock::Clock;
use crate::errors::{AuthError, ClaimCheckFailure};
use crate::jwks::SigningKey;
use crate::locator::PublicKeyLocator;
use crate::observability::metrics;
use crate::token::{algorithm_name, CompactToken};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::instrument;

/// Verifies bearer tokens issued by one realm.
pub struct TokenVerifier {
    locator: Arc<PublicKeyLocator>,

    /// Expected `iss` claim.
    realm_url: String,

    clock: Arc<dyn Clock>,

    /// Clock skew tolerance in seconds for `exp` and `nbf`.
    clock_skew_seconds: i64,
}

/// Validated timestamps of a token.
struct Activity {
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TokenVerifier {
    /// Create a verifier.
    ///
    /// # Arguments
    ///
    /// * `locator` - Signing key source for the realm
    /// * `realm_url` - Expected issuer, `{server_url}/realms/{realm}`
    /// * `clock` - Time source for the activity check
    /// * `clock_skew_seconds` - Tolerance applied to `exp` and `nbf`
    pub fn new(
        locator: Arc<PublicKeyLocator>,
        realm_url: String,
        clock: Arc<dyn Clock>,
        clock_skew_seconds: i64,
    ) -> Self {
        Self {
            locator,
            realm_url,
            clock,
            clock_skew_seconds,
        }
    }

    pub fn locator(&self) -> &Arc<PublicKeyLocator> {
        &self.locator
    }

    pub fn realm_url(&self) -> &str {
        &self.realm_url
    }

    /// Decode and verify a compact token.
    ///
    /// # Security Checks
    ///
    /// 1. Structural parse (size, segments, base64url, JSON, algorithm, kid)
    /// 2. Locate the signing key by kid
    /// 3. Claim checks in order: subject, token type, activity, issuer
    /// 4. Signature verification with the located key
    ///
    /// # Errors
    ///
    /// - `AuthError::MalformedToken` - step 1 failed
    /// - `AuthError::UnknownSigningKey` - no key for the kid
    /// - `AuthError::ClaimCheckFailed` - a claim check failed
    /// - `AuthError::InvalidSignature` - algorithm not allowed for the key,
    ///   or the signature does not verify
    #[instrument(skip_all)]
    pub async fn decode(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        let result = self.verify(token).await;

        match &result {
            Ok(_) => {
                tracing::debug!(target: "realm_auth.verifier", "Token validated successfully");
                metrics::record_token_validation(None);
            }
            Err(e) => {
                tracing::debug!(target: "realm_auth.verifier", reason = e.reason(), "Token validation failed");
                metrics::record_token_validation(Some(e.reason()));
            }
        }

        result
    }

    async fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        let parsed = CompactToken::parse(token)?;

        let kid = parsed.key_id().ok_or_else(|| {
            tracing::debug!(target: "realm_auth.verifier", "Token header missing kid");
            AuthError::MalformedToken
        })?;

        let key = self.locator.get_key(kid).await.ok_or_else(|| {
            tracing::debug!(target: "realm_auth.verifier", kid = %kid, "No signing key for token kid");
            AuthError::UnknownSigningKey
        })?;

        let (subject, activity) = self.check_claims(parsed.claims())?;

        verify_signature(&parsed, &key)?;

        let headers = parsed.header_map();
        Ok(VerifiedToken::new(
            token,
            parsed.into_claims(),
            subject,
            activity.issued_at,
            activity.expires_at,
            headers,
        ))
    }

    /// Run the standard claim checks in order, returning the subject and
    /// validated timestamps.
    fn check_claims(
        &self,
        claims: &Map<String, Value>,
    ) -> Result<(String, Activity), ClaimCheckFailure> {
        let subject = claims
            .get("sub")
            .and_then(Value::as_str)
            .filter(|sub| !sub.is_empty())
            .ok_or(ClaimCheckFailure::SubjectMissing)?;

        if claims.get("typ").and_then(Value::as_str) != Some(BEARER_TOKEN_TYPE) {
            return Err(ClaimCheckFailure::WrongTokenType);
        }

        let activity = self.check_active(claims)?;

        if claims.get("iss").and_then(Value::as_str) != Some(self.realm_url.as_str()) {
            return Err(ClaimCheckFailure::IssuerMismatch);
        }

        Ok((subject.to_string(), activity))
    }

    fn check_active(&self, claims: &Map<String, Value>) -> Result<Activity, ClaimCheckFailure> {
        let exp = required_numeric_date(claims, "exp")?;
        let iat = required_numeric_date(claims, "iat")?;
        let nbf = match claims.get("nbf") {
            None | Some(Value::Null) => 0,
            Some(value) => numeric_date(value).ok_or(ClaimCheckFailure::InvalidTimestamps)?,
        };

        let now = self.clock.now();

        if now > exp.saturating_add(self.clock_skew_seconds) {
            tracing::debug!(target: "realm_auth.verifier", exp, now, "Token is expired");
            return Err(ClaimCheckFailure::Expired);
        }

        if nbf != 0 && now < nbf.saturating_sub(self.clock_skew_seconds) {
            tracing::debug!(target: "realm_auth.verifier", nbf, now, "Token is not yet valid");
            return Err(ClaimCheckFailure::NotYetValid);
        }

        let issued_at =
            DateTime::from_timestamp(iat, 0).ok_or(ClaimCheckFailure::InvalidTimestamps)?;
        let expires_at =
            DateTime::from_timestamp(exp, 0).ok_or(ClaimCheckFailure::InvalidTimestamps)?;

        Ok(Activity {
            issued_at,
            expires_at,
        })
    }
}

/// Verify the token signature with `key`.
///
/// The header algorithm is checked against the key before any
/// cryptographic work, so a token cannot pick HMAC or a foreign key family.
fn verify_signature(token: &CompactToken, key: &SigningKey) -> Result<(), AuthError> {
    let alg = token.algorithm();

    if !key.accepts(alg) {
        tracing::warn!(
            target: "realm_auth.verifier",
            alg = algorithm_name(alg),
            kid = %key.key_id(),
            kty = key.key_type().as_str(),
            "Token algorithm not allowed for signing key"
        );
        return Err(AuthError::InvalidSignature);
    }

    match jsonwebtoken::crypto::verify(
        token.signature(),
        token.signing_input().as_bytes(),
        key.decoding_key(),
        alg,
    ) {
        Ok(true) => Ok(()),
        Ok(false) => {
            tracing::debug!(target: "realm_auth.verifier", kid = %key.key_id(), "Token signature mismatch");
            Err(AuthError::InvalidSignature)
        }
        Err(e) => {
            tracing::debug!(target: "realm_auth.verifier", error = %e, "Token signature verification failed");
            Err(AuthError::InvalidSignature)
        }
    }
}

fn required_numeric_date(
    claims: &Map<String, Value>,
    name: &str,
) -> Result<i64, ClaimCheckFailure> {
    claims
        .get(name)
        .and_then(numeric_date)
        .ok_or(ClaimCheckFailure::InvalidTimestamps)
}

/// JWT NumericDate: integer or fractional epoch seconds.
fn numeric_date(value: &Value) -> Option<i64> {
    if let Some(seconds) = value.as_i64() {
        return Some(seconds);
    }
    let seconds = value.as_f64().filter(|s| s.is_finite())?;
    if seconds < i64::MIN as f64 || seconds > i64::MAX as f64 {
        return None;
    }
    Some(seconds.trunc() as i64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::fetcher::RemoteKeyFetcher;
    use serde_json::json;
    use std::time::Duration;

    const NOW: i64 = 1_700_000_000;
    const REALM_URL: &str = "https://id.example.com/realms/acme";

    fn verifier(skew: i64) -> TokenVerifier {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(NOW));
        let fetcher = RemoteKeyFetcher::new(
            format!("{REALM_URL}/protocol/openid-connect/certs"),
            Duration::from_secs(1),
        );
        let locator = Arc::new(PublicKeyLocator::new(fetcher, Arc::clone(&clock)));
        TokenVerifier::new(locator, REALM_URL.to_string(), clock, skew)
    }

    fn valid_claims() -> Map<String, Value> {
        json!({
            "sub": "user-1",
            "typ": "Bearer",
            "iat": NOW - 60,
            "exp": NOW + 300,
            "iss": REALM_URL,
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn with(name: &str, value: Value) -> Map<String, Value> {
        let mut claims = valid_claims();
        claims.insert(name.to_string(), value);
        claims
    }

    fn without(name: &str) -> Map<String, Value> {
        let mut claims = valid_claims();
        claims.remove(name);
        claims
    }

    // ============================================================================
    // Claim checks
    // ============================================================================

    #[test]
    fn test_valid_claims_pass() {
        let (subject, activity) = verifier(0).check_claims(&valid_claims()).unwrap();

        assert_eq!(subject, "user-1");
        assert_eq!(activity.issued_at.timestamp(), NOW - 60);
        assert_eq!(activity.expires_at.timestamp(), NOW + 300);
    }

    #[test]
    fn test_subject_required() {
        let v = verifier(0);
        for claims in [without("sub"), with("sub", json!("")), with("sub", json!(42))] {
            assert_eq!(
                v.check_claims(&claims).err(),
                Some(ClaimCheckFailure::SubjectMissing)
            );
        }
    }

    #[test]
    fn test_token_type_must_be_bearer() {
        let v = verifier(0);
        for claims in [
            without("typ"),
            with("typ", json!("Refresh")),
            with("typ", json!("bearer")),
            with("typ", json!("ID")),
        ] {
            assert_eq!(
                v.check_claims(&claims).err(),
                Some(ClaimCheckFailure::WrongTokenType)
            );
        }
    }

    #[test]
    fn test_checks_run_in_order() {
        let mut claims = valid_claims();
        claims.remove("sub");
        claims.insert("typ".to_string(), json!("Refresh"));
        claims.insert("iss".to_string(), json!("https://evil.example.com"));

        assert_eq!(
            verifier(0).check_claims(&claims).err(),
            Some(ClaimCheckFailure::SubjectMissing)
        );

        claims.insert("sub".to_string(), json!("user-1"));
        assert_eq!(
            verifier(0).check_claims(&claims).err(),
            Some(ClaimCheckFailure::WrongTokenType)
        );
    }

    #[test]
    fn test_expiry_boundary() {
        let v = verifier(0);

        let at_boundary = with("exp", json!(NOW));
        assert!(v.check_claims(&at_boundary).is_ok());

        let expired = with("exp", json!(NOW - 1));
        assert_eq!(
            v.check_claims(&expired).err(),
            Some(ClaimCheckFailure::Expired)
        );
    }

    #[test]
    fn test_expiry_with_clock_skew() {
        let expired = with("exp", json!(NOW - 30));

        assert!(verifier(30).check_claims(&expired).is_ok());
        assert_eq!(
            verifier(29).check_claims(&expired).err(),
            Some(ClaimCheckFailure::Expired)
        );
    }

    #[test]
    fn test_not_before() {
        let v = verifier(0);

        assert_eq!(
            v.check_claims(&with("nbf", json!(NOW + 1))).err(),
            Some(ClaimCheckFailure::NotYetValid)
        );
        assert!(v.check_claims(&with("nbf", json!(NOW))).is_ok());
        // Zero means unset
        assert!(v.check_claims(&with("nbf", json!(0))).is_ok());
        assert!(verifier(5)
            .check_claims(&with("nbf", json!(NOW + 5)))
            .is_ok());
    }

    #[test]
    fn test_timestamps_required_and_numeric() {
        let v = verifier(0);
        for claims in [
            without("exp"),
            without("iat"),
            with("exp", json!("tomorrow")),
            with("iat", json!(null)),
            with("nbf", json!("soon")),
        ] {
            assert_eq!(
                v.check_claims(&claims).err(),
                Some(ClaimCheckFailure::InvalidTimestamps)
            );
        }
    }

    #[test]
    fn test_fractional_timestamps_accepted() {
        let claims = with("exp", json!((NOW + 10) as f64 + 0.75));
        let (_, activity) = verifier(0).check_claims(&claims).unwrap();

        assert_eq!(activity.expires_at.timestamp(), NOW + 10);
    }

    #[test]
    fn test_out_of_range_timestamp() {
        let claims = with("exp", json!(i64::MAX));
        assert_eq!(
            verifier(0).check_claims(&claims).err(),
            Some(ClaimCheckFailure::InvalidTimestamps)
        );
    }

    #[test]
    fn test_issuer_must_match_exactly() {
        let v = verifier(0);
        for iss in [
            json!("https://id.example.com/realms/other"),
            json!("https://id.example.com//realms/acme"),
            json!("https://id.example.com/realms/acme/"),
            json!(null),
        ] {
            assert_eq!(
                v.check_claims(&with("iss", iss)).err(),
                Some(ClaimCheckFailure::IssuerMismatch)
            );
        }
        assert_eq!(
            v.check_claims(&without("iss")).err(),
            Some(ClaimCheckFailure::IssuerMismatch)
        );
    }

    // ============================================================================
    // Structural failures never reach the network
    // ============================================================================

    #[tokio::test]
    async fn test_malformed_token_rejected_before_lookup() {
        let v = verifier(0);

        for token in ["", "not-a-jwt", "a.b", "a.b.c.d"] {
            assert_eq!(v.decode(token).await.unwrap_err(), AuthError::MalformedToken);
        }
        assert_eq!(v.locator().last_request_time(), None);
    }

    #[test]
    fn test_numeric_date() {
        assert_eq!(numeric_date(&json!(5)), Some(5));
        assert_eq!(numeric_date(&json!(5.9)), Some(5));
        assert_eq!(numeric_date(&json!(-1)), Some(-1));
        assert_eq!(numeric_date(&json!("5")), None);
        assert_eq!(numeric_date(&json!(true)), None);
        assert_eq!(numeric_date(&json!(1e300)), None);
    }
}
