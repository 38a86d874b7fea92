//! JSON Web Key Set parsing.
//!
//! Turns the realm's published key set into [`SigningKey`]s. Only keys with
//! the requested `use` and a supported key type survive; everything else is
//! skipped with a debug log rather than failing the whole set, so a realm
//! that adds an encryption key or an exotic curve keeps verifying tokens.

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// JSON Web Key as published by the certificate endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA", "EC", "OKP").
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Algorithm the key is intended for.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use ("sig" or "enc").
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Curve name for EC and OKP keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// EC x coordinate or OKP public key (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,
}

/// JWKS document from the certificate endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JwksDocument {
    #[serde(default)]
    pub keys: Vec<Jwk>,
}

/// Intended use of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyUse {
    Signature,
    Encryption,
}

impl KeyUse {
    /// JWK `use` parameter value.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyUse::Signature => "sig",
            KeyUse::Encryption => "enc",
        }
    }

    /// Parse a JWK `use` parameter; unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sig" => Some(KeyUse::Signature),
            "enc" => Some(KeyUse::Encryption),
            _ => None,
        }
    }
}

/// Supported key families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Rsa,
    Ec,
    Okp,
}

impl KeyType {
    /// Parse a JWK `kty`; unsupported types yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "RSA" => Some(KeyType::Rsa),
            "EC" => Some(KeyType::Ec),
            "OKP" => Some(KeyType::Okp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Rsa => "RSA",
            KeyType::Ec => "EC",
            KeyType::Okp => "OKP",
        }
    }
}

/// Public key used to verify token signatures.
///
/// Immutable once built. A later fetch may carry a key with the same id
/// (rotation), in which case the whole key set is replaced.
#[derive(Clone)]
pub struct SigningKey {
    key_id: String,
    algorithm: Option<String>,
    key_type: KeyType,
    curve: Option<String>,
    key_use: KeyUse,
    decoding_key: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .field("key_type", &self.key_type)
            .field("curve", &self.curve)
            .field("key_use", &self.key_use)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Build a signing key from a JWK.
    ///
    /// Returns `None` if the key has no id, an unsupported type or curve, or
    /// key material that cannot be decoded.
    pub fn from_jwk(jwk: &Jwk, key_use: KeyUse) -> Option<Self> {
        let key_id = jwk.kid.as_deref().filter(|kid| !kid.is_empty())?;
        let key_type = KeyType::parse(&jwk.kty)?;

        let decoding_key = match key_type {
            KeyType::Rsa => {
                let (n, e) = (jwk.n.as_deref()?, jwk.e.as_deref()?);
                DecodingKey::from_rsa_components(n, e).ok()?
            }
            KeyType::Ec => {
                if !matches!(jwk.crv.as_deref(), Some("P-256" | "P-384")) {
                    return None;
                }
                let (x, y) = (jwk.x.as_deref()?, jwk.y.as_deref()?);
                DecodingKey::from_ec_components(x, y).ok()?
            }
            KeyType::Okp => {
                if jwk.crv.as_deref() != Some("Ed25519") {
                    return None;
                }
                DecodingKey::from_ed_components(jwk.x.as_deref()?).ok()?
            }
        };

        Some(Self {
            key_id: key_id.to_string(),
            algorithm: jwk.alg.clone(),
            key_type,
            curve: jwk.crv.clone(),
            key_use,
            decoding_key,
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn algorithm(&self) -> Option<&str> {
        self.algorithm.as_deref()
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn key_use(&self) -> KeyUse {
        self.key_use
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Whether a token signed with `alg` may be verified with this key.
    ///
    /// Symmetric algorithms are never accepted: an HMAC check keyed with
    /// public key bytes would let anyone forge tokens. The algorithm must
    /// also belong to the key's family and match the key's declared `alg`.
    pub fn accepts(&self, alg: Algorithm) -> bool {
        let family_matches = match self.key_type {
            KeyType::Rsa => matches!(
                alg,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
            KeyType::Ec => match self.curve.as_deref() {
                Some("P-256") => alg == Algorithm::ES256,
                Some("P-384") => alg == Algorithm::ES384,
                _ => false,
            },
            KeyType::Okp => alg == Algorithm::EdDSA,
        };

        if !family_matches {
            return false;
        }

        match &self.algorithm {
            Some(declared) => declared.parse::<Algorithm>().is_ok_and(|d| d == alg),
            None => true,
        }
    }
}

/// Collect the keys of a key set intended for `requested_use`, by key id.
///
/// Entries without a `use`, with a different or unknown `use`, or that
/// cannot be turned into a [`SigningKey`] are skipped.
pub fn keys_for_use(
    jwks: &JwksDocument,
    requested_use: KeyUse,
) -> HashMap<String, Arc<SigningKey>> {
    let mut keys = HashMap::new();

    for jwk in &jwks.keys {
        let Some(declared_use) = jwk.key_use.as_deref() else {
            tracing::debug!(
                target: "realm_auth.jwks",
                kid = ?jwk.kid,
                "Ignoring JWK key, missing required field 'use'"
            );
            continue;
        };

        if KeyUse::parse(declared_use) != Some(requested_use) {
            tracing::debug!(
                target: "realm_auth.jwks",
                kid = ?jwk.kid,
                key_use = %declared_use,
                "Ignoring JWK key with different use"
            );
            continue;
        }

        let Some(key) = SigningKey::from_jwk(jwk, requested_use) else {
            tracing::debug!(
                target: "realm_auth.jwks",
                kid = ?jwk.kid,
                kty = %jwk.kty,
                "Ignoring unsupported or unparseable JWK key"
            );
            continue;
        };

        if let Some(previous) = keys.insert(key.key_id().to_string(), Arc::new(key)) {
            tracing::warn!(
                target: "realm_auth.jwks",
                kid = %previous.key_id(),
                "Duplicate key id in JWKS, keeping the last entry"
            );
        }
    }

    keys
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // "test-public-key-data-32-bytes!!!" is 32 bytes, a valid Ed25519 length
    const OKP_X: &str = "dGVzdC1wdWJsaWMta2V5LWRhdGEtMzItYnl0ZXMhISE";
    const RSA_N: &str = "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw";
    const EC_X: &str = "f83OJ3D2xF1Bg8vub9tLe1gHMzV76e8Tus9uPHvRVEU";
    const EC_Y: &str = "x_FEzRu9m36HLN_tue659LNpXW6pCyStikYjKIWI5a0";

    fn okp_jwk(kid: &str, key_use: Option<&str>) -> Jwk {
        Jwk {
            kty: "OKP".to_string(),
            kid: Some(kid.to_string()),
            alg: Some("EdDSA".to_string()),
            key_use: key_use.map(str::to_string),
            crv: Some("Ed25519".to_string()),
            x: Some(OKP_X.to_string()),
            ..Jwk::default()
        }
    }

    fn rsa_jwk(kid: &str) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            kid: Some(kid.to_string()),
            alg: Some("RS256".to_string()),
            key_use: Some("sig".to_string()),
            n: Some(RSA_N.to_string()),
            e: Some("AQAB".to_string()),
            ..Jwk::default()
        }
    }

    fn ec_jwk(kid: &str, crv: &str) -> Jwk {
        Jwk {
            kty: "EC".to_string(),
            kid: Some(kid.to_string()),
            key_use: Some("sig".to_string()),
            crv: Some(crv.to_string()),
            x: Some(EC_X.to_string()),
            y: Some(EC_Y.to_string()),
            ..Jwk::default()
        }
    }

    #[test]
    fn test_jwk_deserialization() {
        let json = r#"{
            "kid": "FJ86GcF3jTbNLOco4NvZkUCIUmfYCqoqtOQeMfbhNlE",
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "n": "sXch",
            "e": "AQAB",
            "x5c": ["MIICmzCCAYMCBgF"],
            "x5t": "ignored"
        }"#;

        let jwk: Jwk = serde_json::from_str(json).unwrap();

        assert_eq!(jwk.kty, "RSA");
        assert_eq!(
            jwk.kid.as_deref(),
            Some("FJ86GcF3jTbNLOco4NvZkUCIUmfYCqoqtOQeMfbhNlE")
        );
        assert_eq!(jwk.alg.as_deref(), Some("RS256"));
        assert_eq!(jwk.key_use.as_deref(), Some("sig"));
        assert_eq!(jwk.n.as_deref(), Some("sXch"));
        assert_eq!(jwk.e.as_deref(), Some("AQAB"));
        assert!(jwk.crv.is_none());
    }

    #[test]
    fn test_jwks_document_without_keys_is_empty() {
        let jwks: JwksDocument = serde_json::from_str("{}").unwrap();
        assert!(jwks.keys.is_empty());
    }

    #[test]
    fn test_key_use_parse() {
        assert_eq!(KeyUse::parse("sig"), Some(KeyUse::Signature));
        assert_eq!(KeyUse::parse("enc"), Some(KeyUse::Encryption));
        assert_eq!(KeyUse::parse("SIG"), None);
        assert_eq!(KeyUse::Signature.as_str(), "sig");
    }

    #[test]
    fn test_from_jwk_supported_types() {
        let okp = SigningKey::from_jwk(&okp_jwk("okp", Some("sig")), KeyUse::Signature).unwrap();
        assert_eq!(okp.key_type(), KeyType::Okp);
        assert_eq!(okp.key_id(), "okp");
        assert_eq!(okp.algorithm(), Some("EdDSA"));

        let rsa = SigningKey::from_jwk(&rsa_jwk("rsa"), KeyUse::Signature).unwrap();
        assert_eq!(rsa.key_type(), KeyType::Rsa);

        let ec = SigningKey::from_jwk(&ec_jwk("ec", "P-256"), KeyUse::Signature).unwrap();
        assert_eq!(ec.key_type(), KeyType::Ec);
        assert!(ec.algorithm().is_none());
    }

    #[test]
    fn test_from_jwk_rejects_unsupported() {
        let mut oct = okp_jwk("oct", Some("sig"));
        oct.kty = "oct".to_string();
        assert!(SigningKey::from_jwk(&oct, KeyUse::Signature).is_none());

        let mut x448 = okp_jwk("x448", Some("sig"));
        x448.crv = Some("X448".to_string());
        assert!(SigningKey::from_jwk(&x448, KeyUse::Signature).is_none());

        assert!(SigningKey::from_jwk(&ec_jwk("p521", "P-521"), KeyUse::Signature).is_none());

        let mut no_kid = rsa_jwk("rsa");
        no_kid.kid = None;
        assert!(SigningKey::from_jwk(&no_kid, KeyUse::Signature).is_none());

        let mut no_modulus = rsa_jwk("rsa");
        no_modulus.n = None;
        assert!(SigningKey::from_jwk(&no_modulus, KeyUse::Signature).is_none());

        let mut bad_x = okp_jwk("bad", Some("sig"));
        bad_x.x = Some("!!!not-base64!!!".to_string());
        assert!(SigningKey::from_jwk(&bad_x, KeyUse::Signature).is_none());
    }

    #[test]
    fn test_accepts_matches_key_family() {
        let rsa = SigningKey::from_jwk(&rsa_jwk("rsa"), KeyUse::Signature).unwrap();
        assert!(rsa.accepts(Algorithm::RS256));
        // Declared alg pins the key to RS256
        assert!(!rsa.accepts(Algorithm::PS256));
        assert!(!rsa.accepts(Algorithm::ES256));
        assert!(!rsa.accepts(Algorithm::EdDSA));

        let ec = SigningKey::from_jwk(&ec_jwk("ec", "P-256"), KeyUse::Signature).unwrap();
        assert!(ec.accepts(Algorithm::ES256));
        assert!(!ec.accepts(Algorithm::ES384));

        let okp = SigningKey::from_jwk(&okp_jwk("okp", Some("sig")), KeyUse::Signature).unwrap();
        assert!(okp.accepts(Algorithm::EdDSA));
        assert!(!okp.accepts(Algorithm::RS256));
    }

    #[test]
    fn test_accepts_without_declared_alg() {
        let mut jwk = rsa_jwk("rsa");
        jwk.alg = None;
        let rsa = SigningKey::from_jwk(&jwk, KeyUse::Signature).unwrap();

        assert!(rsa.accepts(Algorithm::RS256));
        assert!(rsa.accepts(Algorithm::PS512));
    }

    #[test]
    fn test_accepts_never_allows_hmac() {
        let mut jwk = rsa_jwk("rsa");
        jwk.alg = Some("HS256".to_string());
        let rsa = SigningKey::from_jwk(&jwk, KeyUse::Signature).unwrap();

        assert!(!rsa.accepts(Algorithm::HS256));
        assert!(!rsa.accepts(Algorithm::HS384));
        assert!(!rsa.accepts(Algorithm::HS512));
    }

    #[test]
    fn test_keys_for_use_filters_entries() {
        let jwks = JwksDocument {
            keys: vec![
                okp_jwk("sig-key", Some("sig")),
                okp_jwk("enc-key", Some("enc")),
                okp_jwk("no-use", None),
                okp_jwk("odd-use", Some("wrap")),
                rsa_jwk("rsa-key"),
            ],
        };

        let keys = keys_for_use(&jwks, KeyUse::Signature);

        assert_eq!(keys.len(), 2);
        assert!(keys.contains_key("sig-key"));
        assert!(keys.contains_key("rsa-key"));
        assert!(!keys.contains_key("enc-key"));
        assert!(!keys.contains_key("no-use"));
        assert!(!keys.contains_key("odd-use"));
    }

    #[test]
    fn test_keys_for_use_encryption() {
        let jwks = JwksDocument {
            keys: vec![okp_jwk("sig-key", Some("sig")), okp_jwk("enc-key", Some("enc"))],
        };

        let keys = keys_for_use(&jwks, KeyUse::Encryption);

        assert_eq!(keys.len(), 1);
        assert_eq!(
            keys.get("enc-key").unwrap().key_use(),
            KeyUse::Encryption
        );
    }

    #[test]
    fn test_keys_for_use_duplicate_kid_keeps_last() {
        let mut second = rsa_jwk("shared");
        second.alg = Some("RS512".to_string());
        let jwks = JwksDocument {
            keys: vec![rsa_jwk("shared"), second],
        };

        let keys = keys_for_use(&jwks, KeyUse::Signature);

        assert_eq!(keys.len(), 1);
        assert_eq!(keys.get("shared").unwrap().algorithm(), Some("RS512"));
    }

    #[test]
    fn test_signing_key_debug_omits_material() {
        let key = SigningKey::from_jwk(&okp_jwk("okp", Some("sig")), KeyUse::Signature).unwrap();
        let debug_str = format!("{:?}", key);

        assert!(debug_str.contains("okp"));
        assert!(!debug_str.contains("decoding_key"));
    }
}
