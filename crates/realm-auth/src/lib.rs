//! Bearer token authentication against an OpenID Connect realm.
//!
//! This library verifies access tokens issued by a Keycloak-compatible
//! authorization server and turns them into an [`AuthenticatedIdentity`]
//! carrying role authorities for downstream authorization:
//!
//! - Public signing keys are fetched from the realm's certificate endpoint,
//!   cached, and refreshed at most once per rate-limit window
//! - Tokens are structurally parsed, checked against standard claims, and
//!   their signatures verified with the located key
//! - Resource-level role grants for the configured client become `ROLE_*`
//!   authorities
//!
//! # Architecture
//!
//! ```text
//! Authenticator -> TokenVerifier -> PublicKeyLocator -> RemoteKeyFetcher
//!               -> identity::project
//! ```
//!
//! # Modules
//!
//! - `config` - Realm configuration from environment
//! - `url` - Realm and certificate endpoint URLs
//! - `clock` - Injectable time source
//! - `errors` - Verification failures and their OAuth 2.0 representation
//! - `jwks` - JSON Web Key Set parsing into signing keys
//! - `fetcher` - HTTP retrieval of the realm certificate set
//! - `locator` - Cached, rate-limited signing key lookup
//! - `token` - Compact JWS structural parsing
//! - `claims` - Verified token representation
//! - `verifier` - Signature and claim verification
//! - `identity` - Projection of verified tokens into identities
//! - `authenticator` - Single entry point for request pipelines
//! - `observability` - Metrics emitted through the `metrics` facade

pub mod authenticator;
pub mod claims;
pub mod clock;
pub mod config;
pub mod errors;
pub mod fetcher;
pub mod identity;
pub mod jwks;
pub mod locator;
pub mod observability;
pub mod token;
pub mod url;
pub mod verifier;

pub use authenticator::Authenticator;
pub use claims::VerifiedToken;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthConfig;
pub use errors::{AuthError, ClaimCheckFailure, OAuth2Error};
pub use identity::AuthenticatedIdentity;
pub use jwks::SigningKey;
pub use locator::PublicKeyLocator;
pub use verifier::TokenVerifier;
