//! Mocked realm certificate endpoint.
//!
//! Wraps a wiremock server laid out like a Keycloak server, so the realm URL
//! and certificate URL derived from `server_url()` and the realm name match
//! what the library computes.

use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockGuard, MockServer, ResponseTemplate};

/// Mock identity server hosting one realm.
pub struct MockRealm {
    server: MockServer,
    realm: String,
}

impl MockRealm {
    pub async fn start(realm: &str) -> Self {
        Self {
            server: MockServer::start().await,
            realm: realm.to_string(),
        }
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Base URL of the mock server, without trailing slash.
    pub fn server_url(&self) -> String {
        self.server.uri()
    }

    /// Expected token issuer for this realm.
    pub fn realm_url(&self) -> String {
        format!("{}/realms/{}", self.server.uri(), self.realm)
    }

    pub fn certificate_path(&self) -> String {
        format!("/realms/{}/protocol/openid-connect/certs", self.realm)
    }

    pub fn certificate_url(&self) -> String {
        format!("{}{}", self.server.uri(), self.certificate_path())
    }

    /// Serve `jwks` from the certificate endpoint, expecting exactly
    /// `expected_calls` requests by the time the server is dropped.
    pub async fn mount_jwks(&self, jwks: serde_json::Value, expected_calls: u64) {
        self.jwks_mock(ResponseTemplate::new(200).set_body_json(jwks), expected_calls)
            .mount(&self.server)
            .await;
    }

    /// Like [`mount_jwks`](Self::mount_jwks), but the mock is removed (and its
    /// call count verified) when the guard is dropped.
    pub async fn mount_jwks_scoped(
        &self,
        jwks: serde_json::Value,
        expected_calls: u64,
    ) -> MockGuard {
        self.jwks_mock(ResponseTemplate::new(200).set_body_json(jwks), expected_calls)
            .mount_as_scoped(&self.server)
            .await
    }

    /// Serve `jwks` after `delay`, to hold concurrent lookups in flight.
    pub async fn mount_jwks_with_delay(
        &self,
        jwks: serde_json::Value,
        expected_calls: u64,
        delay: Duration,
    ) {
        self.jwks_mock(
            ResponseTemplate::new(200)
                .set_body_json(jwks)
                .set_delay(delay),
            expected_calls,
        )
        .mount(&self.server)
        .await;
    }

    /// Number of requests the certificate endpoint has received.
    pub async fn certificate_requests(&self) -> usize {
        let certificate_path = self.certificate_path();
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == certificate_path)
            .count()
    }

    fn jwks_mock(&self, response: ResponseTemplate, expected_calls: u64) -> Mock {
        Mock::given(method("GET"))
            .and(path(self.certificate_path()))
            .respond_with(response)
            .expect(expected_calls)
    }
}
