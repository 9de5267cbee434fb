//! Fixtures shared by the auth unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};

use crate::services::auth::jwks::{KeyMaterial, KeyResolveError, KeyResolver, pem_certificate};
use crate::services::auth::token::TokenValidator;

pub const PRIMARY_KEY: &str = include_str!("../../../tests/fixtures/primary.key.pem");
pub const PRIMARY_CERT: &str = include_str!("../../../tests/fixtures/primary.cert.pem");
pub const PRIMARY_N: &str = include_str!("../../../tests/fixtures/primary.n.txt");
pub const ROGUE_KEY: &str = include_str!("../../../tests/fixtures/rogue.key.pem");

pub const AUD: &str = "https://api.example.com";
pub const ISS: &str = "https://tenant.example.com/";
pub const NOW: i64 = 1_900_000_000;

pub struct StaticKeys(pub HashMap<String, KeyMaterial>);

#[async_trait]
impl KeyResolver for StaticKeys {
    async fn resolve(&self, kid: &str) -> Result<KeyMaterial, KeyResolveError> {
        self.0
            .get(kid)
            .cloned()
            .ok_or_else(|| KeyResolveError::KeyNotFound {
                kid: kid.to_string(),
            })
    }
}

/// Certificate PEM → the base64 DER string a JWKS `x5c` entry carries.
pub fn x5c(cert_pem: &str) -> String {
    cert_pem
        .lines()
        .filter(|l| !l.starts_with("-----"))
        .collect()
}

pub fn primary_material() -> KeyMaterial {
    KeyMaterial::PemCertificate(pem_certificate(&x5c(PRIMARY_CERT)))
}

pub fn static_keys(keys: Vec<(&str, KeyMaterial)>) -> Arc<dyn KeyResolver> {
    Arc::new(StaticKeys(
        keys.into_iter()
            .map(|(kid, m)| (kid.to_string(), m))
            .collect(),
    ))
}

pub fn validator_with(keys: Vec<(&str, KeyMaterial)>) -> TokenValidator {
    TokenValidator::new(AUD, ISS, 0, static_keys(keys))
}

pub fn validator() -> TokenValidator {
    validator_with(vec![("primary", primary_material())])
}

pub fn sign(claims: &Value, kid: Option<&str>, private_pem: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}

/// Claims valid at `NOW`.
pub fn claims() -> Value {
    json!({
        "iss": ISS,
        "sub": "auth0|abc123",
        "aud": AUD,
        "iat": NOW - 60,
        "exp": NOW + 3600,
        "scope": "read:items write:items"
    })
}

pub fn with(mut base: Value, key: &str, value: Value) -> Value {
    base[key] = value;
    base
}
