//! Projection of verified tokens into authenticated identities.
//!
//! Roles granted to the audience client in `resource_access` become
//! `ROLE_`-prefixed authorities. Roles for other clients and realm roles are
//! not projected.

use crate::claims::VerifiedToken;
use secrecy::SecretString;
use std::collections::BTreeSet;
use std::fmt;

/// Prefix applied to every projected role.
pub const ROLE_PREFIX: &str = "ROLE_";

/// The authenticated caller of a request.
#[derive(Clone)]
pub struct AuthenticatedIdentity {
    principal_name: String,
    authorities: BTreeSet<String>,
    raw_token: SecretString,
    user_details: VerifiedToken,
}

impl fmt::Debug for AuthenticatedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedIdentity")
            .field("principal_name", &"[REDACTED]")
            .field("authorities", &self.authorities)
            .field("user_details", &self.user_details)
            .finish_non_exhaustive()
    }
}

/// Project a verified token into an identity for `audience_client_id`.
///
/// A token without a `resource_access` entry for the client yields an
/// identity with no authorities.
pub fn project(verified: VerifiedToken, audience_client_id: &str) -> AuthenticatedIdentity {
    let authorities: BTreeSet<String> = verified
        .roles_for(audience_client_id)
        .map(|roles| {
            roles
                .iter()
                .map(|role| format!("{ROLE_PREFIX}{role}"))
                .collect()
        })
        .unwrap_or_default();

    tracing::trace!(
        target: "realm_auth.identity",
        client_id = %audience_client_id,
        authority_count = authorities.len(),
        "Projected token roles into authorities"
    );

    AuthenticatedIdentity {
        principal_name: verified.subject().to_string(),
        authorities,
        raw_token: verified.token_value().clone(),
        user_details: verified,
    }
}

impl AuthenticatedIdentity {
    /// Token subject.
    pub fn principal_name(&self) -> &str {
        &self.principal_name
    }

    pub fn authorities(&self) -> &BTreeSet<String> {
        &self.authorities
    }

    pub fn raw_token(&self) -> &SecretString {
        &self.raw_token
    }

    pub fn user_details(&self) -> &VerifiedToken {
        &self.user_details
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }

    /// Whether `role` (without prefix) was granted to the audience client.
    pub fn has_role(&self, role: &str) -> bool {
        self.authorities.contains(&format!("{ROLE_PREFIX}{role}"))
    }

    pub fn is_service_account(&self) -> bool {
        self.user_details.is_service_account()
    }

    pub fn service_account_id(&self) -> Option<String> {
        self.user_details.service_account_id()
    }

    pub fn organization_id(&self) -> Option<&str> {
        self.user_details.organization_id()
    }
}
