//! Realm endpoint URLs.

/// Path of the certificate (JWKS) endpoint below a realm URL.
pub const CERTIFICATE_PATH: &str = "/protocol/openid-connect/certs";

/// URL of a realm on the identity server.
///
/// This is also the exact `iss` value the server writes into tokens. The
/// server URL is joined with exactly one slash regardless of how many
/// trailing slashes it was configured with.
pub fn realm_url(server_url: &str, realm: &str) -> String {
    let base = server_url.trim().trim_end_matches('/');
    format!("{base}/realms/{realm}")
}

/// URL of a realm's certificate endpoint.
pub fn certificate_url(server_url: &str, realm: &str) -> String {
    format!("{}{CERTIFICATE_PATH}", realm_url(server_url, realm))
}
