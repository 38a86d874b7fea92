//! Metrics definitions for realm authentication.
//!
//! All metrics follow Prometheus naming conventions:
//! - `realm_auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `status`: success, empty, error (refresh) or success, error (validation)
//! - `error_type`: bounded by `KeyFetchError` variants
//! - `outcome`: hit, refreshed, rate_limited, miss
//! - `reason`: bounded by `AuthError` variants
//!
//! Key ids and subjects are never used as labels.

use metrics::{counter, histogram};
use std::time::Duration;

/// Outcome of a signing key lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLookupOutcome {
    /// Served from a fresh cache without taking the refresh lock.
    Hit,
    /// Found after this lookup refreshed the key set.
    Refreshed,
    /// Refresh skipped because the previous request was too recent.
    RateLimited,
    /// Not found after an eligible refresh.
    Miss,
}

impl KeyLookupOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyLookupOutcome::Hit => "hit",
            KeyLookupOutcome::Refreshed => "refreshed",
            KeyLookupOutcome::RateLimited => "rate_limited",
            KeyLookupOutcome::Miss => "miss",
        }
    }
}

/// Record a key set refresh attempt.
///
/// Metric: `realm_auth_jwks_refresh_total`, `realm_auth_jwks_refresh_duration_seconds`,
/// `realm_auth_jwks_refresh_failures_total`
///
/// # Arguments
///
/// * `status` - "success", "empty" or "error"
/// * `error_type` - Error category for failures (e.g., "http", "parse")
/// * `duration` - Duration of the certificate endpoint call
pub fn record_jwks_refresh(status: &str, error_type: Option<&str>, duration: Duration) {
    histogram!("realm_auth_jwks_refresh_duration_seconds").record(duration.as_secs_f64());

    counter!("realm_auth_jwks_refresh_total",
        "status" => status.to_string()
    )
    .increment(1);

    if let Some(err_type) = error_type {
        counter!("realm_auth_jwks_refresh_failures_total",
            "error_type" => err_type.to_string()
        )
        .increment(1);
    }
}

/// Record a signing key lookup.
///
/// Metric: `realm_auth_key_lookups_total`
/// Labels: `outcome`
pub fn record_key_lookup(outcome: KeyLookupOutcome) {
    counter!("realm_auth_key_lookups_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a token validation result.
///
/// Metric: `realm_auth_token_validations_total`
/// Labels: `status`, `reason`
pub fn record_token_validation(failure_reason: Option<&'static str>) {
    let (status, reason) = match failure_reason {
        Some(reason) => ("error", reason),
        None => ("success", "none"),
    };

    counter!("realm_auth_token_validations_total",
        "status" => status,
        "reason" => reason
    )
    .increment(1);
}
