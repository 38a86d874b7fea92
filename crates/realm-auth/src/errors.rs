//! Token verification error types.
//!
//! Every verification failure surfaces to callers as a single OAuth 2.0
//! `invalid_token` error (HTTP 401). The variants exist for diagnostics and
//! metrics; the messages are short and never include token contents.

use serde::Serialize;
use thiserror::Error;

/// OAuth 2.0 error code for every verification failure (RFC 6750 section 3.1).
pub const INVALID_TOKEN_ERROR_CODE: &str = "invalid_token";

/// Documentation URI attached to `invalid_token` errors.
pub const INVALID_TOKEN_ERROR_URI: &str = "https://tools.ietf.org/html/rfc6750#section-3.1";

/// A failed standard claim check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClaimCheckFailure {
    #[error("Subject missing in token")]
    SubjectMissing,

    #[error("Token type is incorrect")]
    WrongTokenType,

    #[error("Token exp or iat claim is missing or invalid")]
    InvalidTimestamps,

    #[error("Token is expired")]
    Expired,

    #[error("Token is not yet valid")]
    NotYetValid,

    #[error("Invalid token issuer")]
    IssuerMismatch,
}

impl ClaimCheckFailure {
    /// Machine-readable reason, bounded for metric labels.
    pub fn reason(&self) -> &'static str {
        match self {
            ClaimCheckFailure::SubjectMissing => "subject_missing",
            ClaimCheckFailure::WrongTokenType => "wrong_token_type",
            ClaimCheckFailure::InvalidTimestamps => "invalid_timestamps",
            ClaimCheckFailure::Expired => "expired",
            ClaimCheckFailure::NotYetValid => "not_yet_valid",
            ClaimCheckFailure::IssuerMismatch => "issuer_mismatch",
        }
    }
}

/// Token verification failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The token is not a parseable compact JWS.
    #[error("Malformed token")]
    MalformedToken,

    /// No signing key matches the token's `kid`.
    #[error("Unknown signing key")]
    UnknownSigningKey,

    #[error("{0}")]
    ClaimCheckFailed(#[from] ClaimCheckFailure),

    /// The signature does not verify against the located key.
    #[error("Invalid token signature")]
    InvalidSignature,
}

impl AuthError {
    /// Machine-readable reason, bounded for metric labels.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MalformedToken => "malformed_token",
            AuthError::UnknownSigningKey => "unknown_signing_key",
            AuthError::ClaimCheckFailed(failure) => failure.reason(),
            AuthError::InvalidSignature => "invalid_signature",
        }
    }

    /// HTTP status code a request pipeline should answer with.
    pub fn status_code(&self) -> u16 {
        401
    }

    /// The OAuth 2.0 error object for this failure.
    pub fn to_oauth2_error(&self) -> OAuth2Error {
        OAuth2Error {
            error: INVALID_TOKEN_ERROR_CODE.to_string(),
            error_description: self.to_string(),
            error_uri: INVALID_TOKEN_ERROR_URI.to_string(),
        }
    }

    /// Value for the `WWW-Authenticate` response header.
    pub fn www_authenticate(&self, realm: &str) -> String {
        format!(
            "Bearer realm=\"{realm}\", error=\"{INVALID_TOKEN_ERROR_CODE}\", error_description=\"{self}\", error_uri=\"{INVALID_TOKEN_ERROR_URI}\""
        )
    }
}

/// OAuth 2.0 bearer token error (RFC 6750).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OAuth2Error {
    pub error: String,
    pub error_description: String,
    pub error_uri: String,
}

/// Failure to retrieve the realm's key set.
///
/// Never returned from key lookups: the locator logs it and keeps serving
/// the previous key set.
#[derive(Debug, Error)]
pub enum KeyFetchError {
    #[error("JWKS request failed: {0}")]
    Http(String),

    #[error("JWKS endpoint returned status {0}")]
    Status(u16),

    #[error("JWKS response could not be parsed: {0}")]
    Parse(String),

    #[error("JWKS response body was empty")]
    EmptyBody,
}

impl KeyFetchError {
    /// Error category for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            KeyFetchError::Http(_) => "http",
            KeyFetchError::Status(_) => "status",
            KeyFetchError::Parse(_) => "parse",
            KeyFetchError::EmptyBody => "empty_body",
        }
    }
}
