//! Verified token representation.
//!
//! A [`VerifiedToken`] only exists after signature and claim checks have
//! passed; its constructor is private to the crate. The subject and raw
//! token value are redacted in Debug output to prevent exposure in logs.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Expected `typ` claim of access tokens.
pub const BEARER_TOKEN_TYPE: &str = "Bearer";

/// Claim that marks a service account token and carries its client id.
pub const SERVICE_ACCOUNT_CLAIM: &str = "clientId";

/// Claim carrying the caller's organization id.
pub const ORGANIZATION_ID_CLAIM: &str = "companyId";

/// Claim carrying the caller's organization name.
pub const ORGANIZATION_NAME_CLAIM: &str = "companyName";

/// Claims consumed into typed fields rather than kept in `other_claims`.
const STANDARD_CLAIMS: [&str; 5] = ["sub", "iat", "exp", "iss", "resource_access"];

/// A token whose signature and standard claims have been verified.
#[derive(Clone)]
pub struct VerifiedToken {
    subject: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    issuer: String,
    /// Roles granted per client, from the `resource_access` claim.
    resource_access: HashMap<String, BTreeSet<String>>,
    other_claims: Map<String, Value>,
    headers: BTreeMap<String, String>,
    token_value: SecretString,
}

impl fmt::Debug for VerifiedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedToken")
            .field("subject", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("issuer", &self.issuer)
            .field("resource_access", &self.resource_access)
            .field("headers", &self.headers)
            .field("token_value", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl VerifiedToken {
    /// Assemble a verified token from an already-checked claim set.
    ///
    /// `claims` must have passed the verifier's claim checks; the standard
    /// claims are moved out and the rest kept as `other_claims`.
    pub(crate) fn new(
        token_value: &str,
        mut claims: Map<String, Value>,
        subject: String,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        headers: BTreeMap<String, String>,
    ) -> Self {
        let issuer = claims
            .get("iss")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let resource_access = claims
            .get("resource_access")
            .map(parse_resource_access)
            .unwrap_or_default();

        for name in STANDARD_CLAIMS {
            claims.remove(name);
        }

        Self {
            subject,
            issued_at,
            expires_at,
            issuer,
            resource_access,
            other_claims: claims,
            headers,
            token_value: SecretString::from(token_value.to_string()),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Roles per client from the `resource_access` claim.
    pub fn resource_access(&self) -> &HashMap<String, BTreeSet<String>> {
        &self.resource_access
    }

    /// Roles granted for `client_id`; `None` if the token has no entry for it.
    pub fn roles_for(&self, client_id: &str) -> Option<&BTreeSet<String>> {
        self.resource_access.get(client_id)
    }

    /// Claims not consumed into typed fields.
    pub fn other_claims(&self) -> &Map<String, Value> {
        &self.other_claims
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.other_claims.get(name)
    }

    /// Descriptive header map (`alg`, `typ`, `kid`, `cty`).
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// The raw token string this was decoded from.
    pub fn token_value(&self) -> &SecretString {
        &self.token_value
    }

    pub fn organization_id(&self) -> Option<&str> {
        self.claim(ORGANIZATION_ID_CLAIM).and_then(Value::as_str)
    }

    pub fn organization_name(&self) -> Option<&str> {
        self.claim(ORGANIZATION_NAME_CLAIM).and_then(Value::as_str)
    }

    /// Whether the token was issued to a service account.
    pub fn is_service_account(&self) -> bool {
        self.other_claims.contains_key(SERVICE_ACCOUNT_CLAIM)
    }

    /// Client id of the service account, in string form.
    ///
    /// Non-string values are rendered as JSON; a `null` claim yields `None`.
    pub fn service_account_id(&self) -> Option<String> {
        match self.claim(SERVICE_ACCOUNT_CLAIM)? {
            Value::Null => None,
            Value::String(id) => Some(id.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Whether `token` is the value this was decoded from.
    pub fn is_token(&self, token: &str) -> bool {
        self.token_value.expose_secret() == token
    }
}

/// Parse `{client: {"roles": [...]}}`, skipping entries of any other shape.
fn parse_resource_access(value: &Value) -> HashMap<String, BTreeSet<String>> {
    let Some(clients) = value.as_object() else {
        return HashMap::new();
    };

    clients
        .iter()
        .map(|(client, access)| {
            let roles = access
                .get("roles")
                .and_then(Value::as_array)
                .map(|roles| {
                    roles
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            (client.clone(), roles)
        })
        .collect()
}
