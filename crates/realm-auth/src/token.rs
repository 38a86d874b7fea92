//! Compact JWS structural parsing.
//!
//! Splits a token into header, claims and signature without verifying
//! anything. The verifier needs the header `kid` before it can locate a key,
//! and the raw signing input afterwards to check the signature.

use crate::errors::AuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{Algorithm, Header};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Maximum allowed token size in bytes (8KB).
///
/// Tokens larger than this are rejected before any base64 decoding or JSON
/// parsing.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// A structurally valid but unverified compact JWS.
#[derive(Debug, Clone)]
pub struct CompactToken {
    header: Header,
    claims: Map<String, Value>,
    /// `header.payload` as it appeared on the wire.
    signing_input: String,
    /// Base64url signature segment.
    signature: String,
}

impl CompactToken {
    /// Parse the compact serialization `header.payload.signature`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MalformedToken` if the token is oversized, does
    /// not have exactly three segments, a segment is not base64url, the
    /// header or payload is not a JSON object, the algorithm is unknown, or
    /// the signature segment is empty.
    pub fn parse(token: &str) -> Result<Self, AuthError> {
        if token.len() > MAX_JWT_SIZE_BYTES {
            tracing::debug!(
                target: "realm_auth.token",
                token_size = token.len(),
                max_size = MAX_JWT_SIZE_BYTES,
                "Token rejected: size exceeds maximum allowed"
            );
            return Err(AuthError::MalformedToken);
        }

        let segments: Vec<&str> = token.split('.').collect();
        let [header_b64, claims_b64, signature] = segments.as_slice() else {
            tracing::debug!(target: "realm_auth.token", segments = segments.len(), "Token rejected: not three segments");
            return Err(AuthError::MalformedToken);
        };

        if signature.is_empty() {
            tracing::debug!(target: "realm_auth.token", "Token rejected: empty signature");
            return Err(AuthError::MalformedToken);
        }

        let header: Header = decode_segment(header_b64, "header")?;
        let claims: Map<String, Value> = decode_segment(claims_b64, "payload")?;

        Ok(Self {
            header,
            claims,
            signing_input: format!("{header_b64}.{claims_b64}"),
            signature: (*signature).to_string(),
        })
    }

    /// Non-empty key id from the header.
    pub fn key_id(&self) -> Option<&str> {
        self.header.kid.as_deref().filter(|kid| !kid.is_empty())
    }

    pub fn algorithm(&self) -> Algorithm {
        self.header.alg
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn into_claims(self) -> Map<String, Value> {
        self.claims
    }

    pub fn signing_input(&self) -> &str {
        &self.signing_input
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Descriptive header map: `alg`, plus `typ`, `kid` and `cty` when present.
    pub fn header_map(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert(
            "alg".to_string(),
            algorithm_name(self.header.alg).to_string(),
        );
        let optional = [
            ("typ", &self.header.typ),
            ("kid", &self.header.kid),
            ("cty", &self.header.cty),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                headers.insert(name.to_string(), value.clone());
            }
        }
        headers
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(
    segment: &str,
    name: &'static str,
) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| {
            tracing::debug!(target: "realm_auth.token", segment = name, error = %e, "Token rejected: invalid base64url");
            AuthError::MalformedToken
        })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "realm_auth.token", segment = name, error = %e, "Token rejected: invalid JSON");
        AuthError::MalformedToken
    })
}

/// JOSE name of an algorithm.
pub fn algorithm_name(alg: Algorithm) -> &'static str {
    match alg {
        Algorithm::HS256 => "HS256",
        Algorithm::HS384 => "HS384",
        Algorithm::HS512 => "HS512",
        Algorithm::ES256 => "ES256",
        Algorithm::ES384 => "ES384",
        Algorithm::RS256 => "RS256",
        Algorithm::RS384 => "RS384",
        Algorithm::RS512 => "RS512",
        Algorithm::PS256 => "PS256",
        Algorithm::PS384 => "PS384",
        Algorithm::PS512 => "PS512",
        Algorithm::EdDSA => "EdDSA",
    }
}
