//! Realm authentication configuration.
//!
//! Configuration is loaded from environment variables. Only the server URL,
//! realm and client id are required; the HTTP timeout and clock skew have
//! defaults.

use crate::url;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default timeout for certificate endpoint requests.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default clock skew tolerance for `exp`/`nbf` checks.
pub const DEFAULT_CLOCK_SKEW_SECONDS: i64 = 0;

/// Upper bound on the configurable clock skew tolerance.
pub const MAX_CLOCK_SKEW_SECONDS: i64 = 600;

/// Realm authentication configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Base URL of the identity server (e.g. "https://id.example.com").
    pub server_url: String,

    /// Realm that issues the tokens.
    pub realm: String,

    /// Client id whose resource roles become authorities.
    pub client_id: String,

    /// Timeout for certificate endpoint requests.
    pub http_timeout: Duration,

    /// Tolerance in seconds applied to `exp` and `nbf` checks.
    pub clock_skew_seconds: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Configuration value must not be empty: {0}")]
    Empty(String),

    #[error("Invalid HTTP timeout configuration: {0}")]
    InvalidHttpTimeout(String),

    #[error("Invalid clock skew configuration: {0}")]
    InvalidClockSkew(String),
}

impl AuthConfig {
    /// Create a configuration with default timeout and clock skew.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Empty` if any value is blank.
    pub fn new(
        server_url: impl Into<String>,
        realm: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            server_url: non_empty("server_url", server_url.into())?,
            realm: non_empty("realm", realm.into())?,
            client_id: non_empty("client_id", client_id.into())?,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            clock_skew_seconds: DEFAULT_CLOCK_SKEW_SECONDS,
        })
    }

    /// Override the certificate endpoint request timeout.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Override the clock skew tolerance, capped at `MAX_CLOCK_SKEW_SECONDS`.
    pub fn with_clock_skew_seconds(mut self, seconds: i64) -> Self {
        self.clock_skew_seconds = seconds.clamp(0, MAX_CLOCK_SKEW_SECONDS);
        self
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let server_url = required(vars, "KEYCLOAK_SERVER_URL")?;
        let realm = required(vars, "KEYCLOAK_REALM")?;
        let client_id = required(vars, "KEYCLOAK_CLIENT_ID")?;

        let http_timeout = if let Some(value_str) = vars.get("KEYCLOAK_HTTP_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidHttpTimeout(format!(
                    "KEYCLOAK_HTTP_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidHttpTimeout(
                    "KEYCLOAK_HTTP_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_HTTP_TIMEOUT
        };

        let clock_skew_seconds = if let Some(value_str) = vars.get("KEYCLOAK_CLOCK_SKEW_SECONDS")
        {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidClockSkew(format!(
                    "KEYCLOAK_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if !(0..=MAX_CLOCK_SKEW_SECONDS).contains(&value) {
                return Err(ConfigError::InvalidClockSkew(format!(
                    "KEYCLOAK_CLOCK_SKEW_SECONDS must be between 0 and {}, got {}",
                    MAX_CLOCK_SKEW_SECONDS, value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW_SECONDS
        };

        Ok(AuthConfig {
            server_url,
            realm,
            client_id,
            http_timeout,
            clock_skew_seconds,
        })
    }

    /// Expected `iss` claim for tokens from this realm.
    pub fn realm_url(&self) -> String {
        url::realm_url(&self.server_url, &self.realm)
    }

    /// Realm certificate (JWKS) endpoint.
    pub fn certificate_url(&self) -> String {
        url::certificate_url(&self.server_url, &self.realm)
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    let value = vars
        .get(name)
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))?;
    non_empty(name, value.clone())
}

fn non_empty(name: &str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Empty(name.to_string()));
    }
    Ok(value.trim().to_string())
}
