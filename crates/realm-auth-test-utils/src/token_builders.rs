//! Builder patterns for test data construction
//!
//! Produces Keycloak-shaped access token claims.

use chrono::Utc;
use serde_json::{json, Map, Value};

/// Builder for Keycloak access token claims.
///
/// Defaults to a valid bearer token for `test-subject`, issued now and
/// expiring in five minutes.
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new("https://id.example.com/realms/acme")
///     .for_user("alice")
///     .with_role("app1", "admin")
///     .expires_in(3600)
///     .build();
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
    now: i64,
}

impl TestTokenBuilder {
    pub fn new(issuer: &str) -> Self {
        Self::at(issuer, Utc::now().timestamp())
    }

    /// Builder with timestamps relative to `now` instead of the wall clock.
    pub fn at(issuer: &str, now: i64) -> Self {
        let mut claims = Map::new();
        claims.insert("sub".to_string(), json!("test-subject"));
        claims.insert("typ".to_string(), json!("Bearer"));
        claims.insert("iat".to_string(), json!(now));
        claims.insert("exp".to_string(), json!(now + 300));
        claims.insert("iss".to_string(), json!(issuer));
        Self { claims, now }
    }

    pub fn for_user(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    pub fn with_type(self, typ: &str) -> Self {
        self.with_claim("typ", json!(typ))
    }

    pub fn with_issuer(self, issuer: &str) -> Self {
        self.with_claim("iss", json!(issuer))
    }

    /// Set expiration in seconds from the builder's `now`
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = self.now + seconds;
        self.with_claim("exp", json!(exp))
    }

    pub fn issued_at(self, timestamp: i64) -> Self {
        self.with_claim("iat", json!(timestamp))
    }

    pub fn not_before(self, timestamp: i64) -> Self {
        self.with_claim("nbf", json!(timestamp))
    }

    /// Grant `role` for `client_id` under `resource_access`.
    pub fn with_role(mut self, client_id: &str, role: &str) -> Self {
        let access = self
            .claims
            .entry("resource_access")
            .or_insert_with(|| json!({}));
        let client = access
            .as_object_mut()
            .expect("resource_access must be an object")
            .entry(client_id)
            .or_insert_with(|| json!({"roles": []}));
        client["roles"]
            .as_array_mut()
            .expect("roles must be an array")
            .push(json!(role));
        self
    }

    /// Mark the token as issued to a service account.
    pub fn as_service_account(self, client_id: &str) -> Self {
        self.with_claim("clientId", json!(client_id))
    }

    pub fn with_organization(self, id: &str, name: &str) -> Self {
        self.with_claim("companyId", json!(id))
            .with_claim("companyName", json!(name))
    }

    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let claims = TestTokenBuilder::at("https://id/realms/acme", 1_000).build();

        assert_eq!(claims["sub"], "test-subject");
        assert_eq!(claims["typ"], "Bearer");
        assert_eq!(claims["iat"], 1_000);
        assert_eq!(claims["exp"], 1_300);
        assert_eq!(claims["iss"], "https://id/realms/acme");
        assert!(claims.get("resource_access").is_none());
    }

    #[test]
    fn test_builder_roles_accumulate() {
        let claims = TestTokenBuilder::new("iss")
            .with_role("app1", "admin")
            .with_role("app1", "viewer")
            .with_role("app2", "owner")
            .build();

        assert_eq!(
            claims["resource_access"]["app1"]["roles"],
            json!(["admin", "viewer"])
        );
        assert_eq!(claims["resource_access"]["app2"]["roles"], json!(["owner"]));
    }

    #[test]
    fn test_builder_overrides() {
        let claims = TestTokenBuilder::at("iss", 1_000)
            .for_user("alice")
            .with_type("Refresh")
            .expires_in(-10)
            .without_claim("iat")
            .as_service_account("worker")
            .build();

        assert_eq!(claims["sub"], "alice");
        assert_eq!(claims["typ"], "Refresh");
        assert_eq!(claims["exp"], 990);
        assert!(claims.get("iat").is_none());
        assert_eq!(claims["clientId"], "worker");
    }
}
