//! # Realm Auth Test Utilities
//!
//! Shared test utilities for the realm-auth library.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (seeded Ed25519 keys, P-256 keys, a fixed
//!   RSA key) that sign tokens and publish themselves as JWKs
//! - Keycloak-shaped claim builders (TestTokenBuilder)
//! - A mocked realm certificate endpoint (MockRealm)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use realm_auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let realm = MockRealm::start("acme").await;
//!     let keypair = TestKeypair::new(1, "key-1");
//!     realm.mount_jwks(jwks_for(&[keypair.jwk_json()]), 1).await;
//!
//!     let claims = TestTokenBuilder::new(&realm.realm_url())
//!         .with_role("app1", "admin")
//!         .build();
//!     let token = keypair.sign_token(&claims);
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_realm;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_realm::*;
pub use token_builders::*;
