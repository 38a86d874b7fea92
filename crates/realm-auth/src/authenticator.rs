//! Single entry point for request pipelines.
//!
//! Wires config, key fetcher, locator, verifier and identity projection
//! together. Extracting the token from request headers and mapping
//! [`AuthError`] to a response is the caller's job; see
//! [`AuthError::www_authenticate`] and [`AuthError::to_oauth2_error`].

use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::errors::AuthError;
use crate::fetcher::RemoteKeyFetcher;
use crate::identity::{self, AuthenticatedIdentity};
use crate::locator::PublicKeyLocator;
use crate::verifier::TokenVerifier;
use std::sync::Arc;
use tracing::instrument;

/// Authenticates bearer tokens for one realm and client.
///
/// Cheap to share behind an `Arc`; all state lives in the key locator.
pub struct Authenticator {
    verifier: TokenVerifier,
    client_id: String,
    realm: String,
}

impl Authenticator {
    /// Build an authenticator using the system clock.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build an authenticator with an explicit time source.
    pub fn with_clock(config: &AuthConfig, clock: Arc<dyn Clock>) -> Self {
        let fetcher = RemoteKeyFetcher::new(config.certificate_url(), config.http_timeout);
        let locator = Arc::new(PublicKeyLocator::new(fetcher, Arc::clone(&clock)));
        let verifier = TokenVerifier::new(
            locator,
            config.realm_url(),
            clock,
            config.clock_skew_seconds,
        );

        tracing::info!(
            target: "realm_auth.authenticator",
            realm_url = %verifier.realm_url(),
            client_id = %config.client_id,
            "Realm authenticator initialized"
        );

        Self {
            verifier,
            client_id: config.client_id.clone(),
            realm: config.realm.clone(),
        }
    }

    /// Verify `token` and project it into an identity.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] from verification; see [`TokenVerifier::decode`].
    #[instrument(skip_all)]
    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedIdentity, AuthError> {
        let verified = self.verifier.decode(token).await?;
        Ok(identity::project(verified, &self.client_id))
    }

    /// `WWW-Authenticate` header value for a failed authentication.
    pub fn challenge(&self, error: &AuthError) -> String {
        error.www_authenticate(&self.realm)
    }

    /// Refresh the realm key set now, ignoring the rate limit.
    pub async fn reset_keys(&self) {
        self.verifier.locator().reset().await;
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    pub fn locator(&self) -> &Arc<PublicKeyLocator> {
        self.verifier.locator()
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}
