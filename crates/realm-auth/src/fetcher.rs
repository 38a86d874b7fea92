//! Remote key fetcher for the realm certificate endpoint.
//!
//! Fetches the realm's JSON Web Key Set over HTTP and projects it into
//! signature keys. The fetcher holds no state besides the HTTP client; the
//! [`PublicKeyLocator`](crate::locator::PublicKeyLocator) decides when to
//! fetch and owns the resulting key set.
//!
//! # Security
//!
//! - HTTPS should be used in production (enforced by deployment config)
//! - Request latency is bounded by the HTTP client timeout only

use crate::errors::KeyFetchError;
use crate::jwks::{self, JwksDocument, KeyUse, SigningKey};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// HTTP client for the realm certificate endpoint.
pub struct RemoteKeyFetcher {
    /// URL of the realm certificate endpoint.
    certs_url: String,

    /// HTTP client for fetching the key set.
    http_client: reqwest::Client,
}

impl RemoteKeyFetcher {
    /// Create a fetcher for `certs_url` with the given request timeout.
    pub fn new(certs_url: String, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "realm_auth.fetcher", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            certs_url,
            http_client,
        }
    }

    /// Create a fetcher around an existing HTTP client.
    pub fn with_client(certs_url: String, http_client: reqwest::Client) -> Self {
        Self {
            certs_url,
            http_client,
        }
    }

    pub fn certs_url(&self) -> &str {
        &self.certs_url
    }

    /// Fetch the realm key set and return its signature keys by key id.
    ///
    /// # Errors
    ///
    /// - `KeyFetchError::Http` - the request could not be sent or the body read
    /// - `KeyFetchError::Status` - the endpoint answered with a non-success status
    /// - `KeyFetchError::EmptyBody` - the body was empty or JSON `null`
    /// - `KeyFetchError::Parse` - the body is not a JWKS document
    #[instrument(skip_all)]
    pub async fn fetch(&self) -> Result<HashMap<String, Arc<SigningKey>>, KeyFetchError> {
        tracing::trace!(target: "realm_auth.fetcher", url = %self.certs_url, "Sending request to retrieve realm public keys");

        let response = self
            .http_client
            .get(&self.certs_url)
            .send()
            .await
            .map_err(|e| KeyFetchError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeyFetchError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| KeyFetchError::Http(e.to_string()))?;

        let jwks = parse_jwks(&body)?;
        let keys = jwks::keys_for_use(&jwks, KeyUse::Signature);

        tracing::debug!(
            target: "realm_auth.fetcher",
            key_count = keys.len(),
            kids = ?keys.keys().collect::<Vec<_>>(),
            "Realm public keys retrieved"
        );

        Ok(keys)
    }
}

/// Parse a certificate endpoint body. Empty and `null` bodies carry no key set.
fn parse_jwks(body: &[u8]) -> Result<JwksDocument, KeyFetchError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(KeyFetchError::EmptyBody);
    }

    serde_json::from_slice::<Option<JwksDocument>>(body)
        .map_err(|e| KeyFetchError::Parse(e.to_string()))?
        .ok_or(KeyFetchError::EmptyBody)
}
