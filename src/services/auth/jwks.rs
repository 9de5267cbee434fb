//! JWKS key resolution.
//!
//! Fetches the provider's published key set and picks the entry whose `kid`
//! matches the token header. By default every call goes to the network so a
//! rotated key is picked up immediately; an optional TTL cache can be turned on
//! and is bypassed once whenever the requested `kid` is missing from it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum KeyResolveError {
    #[error("jwks fetch failed: {0}")]
    Fetch(#[source] reqwest::Error),
    #[error("jwks body is not a valid key set: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("no key in jwks matches kid {kid:?}")]
    KeyNotFound { kid: String },
    #[error("key {kid:?} has neither an x5c chain nor RSA components")]
    UnusableKey { kid: String },
}

/// `{"keys": [...]}` as published by the provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JwkSet {
    #[serde(default)]
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| !k.kid.is_empty() && k.kid == kid)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    #[serde(default)]
    pub kty: String,
    #[serde(default)]
    pub kid: String,
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    #[serde(default)]
    pub x5c: Vec<String>,
}

impl Jwk {
    /// Prefer the leaf certificate of the `x5c` chain; fall back to the raw
    /// RSA modulus/exponent for providers that do not publish certificates.
    pub fn key_material(&self) -> Result<KeyMaterial, KeyResolveError> {
        if let Some(leaf) = self.x5c.first().filter(|c| !c.trim().is_empty()) {
            return Ok(KeyMaterial::PemCertificate(pem_certificate(leaf)));
        }

        match (self.n.as_deref(), self.e.as_deref()) {
            (Some(n), Some(e)) if !n.is_empty() && !e.is_empty() => {
                Ok(KeyMaterial::RsaComponents {
                    n: n.to_string(),
                    e: e.to_string(),
                })
            }
            _ => Err(KeyResolveError::UnusableKey {
                kid: self.kid.clone(),
            }),
        }
    }
}

/// Public key material handed to the token validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    PemCertificate(String),
    // base64url, as in the JWK
    RsaComponents { n: String, e: String },
}

/// Wrap a base64 DER certificate (an `x5c` entry) in PEM framing.
pub fn pem_certificate(der_base64: &str) -> String {
    let body: String = der_base64.split_whitespace().collect();

    let mut pem = String::with_capacity(body.len() + body.len() / 64 + 64);
    pem.push_str("-----BEGIN CERTIFICATE-----\n");
    // PEM bodies are wrapped at 64 columns
    for line in body.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----");
    pem
}

/// Capability used by the token validator to turn a `kid` into key material.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    async fn resolve(&self, kid: &str) -> Result<KeyMaterial, KeyResolveError>;
}

struct CachedKeySet {
    fetched_at: Instant,
    keys: Arc<JwkSet>,
}

/// `KeyResolver` backed by the provider's JWKS endpoint.
pub struct JwksKeyResolver {
    url: Url,
    client: reqwest::Client,
    cache_ttl: Duration,
    cache: RwLock<Option<CachedKeySet>>,
}

impl std::fmt::Debug for JwksKeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksKeyResolver")
            .field("url", &self.url.as_str())
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

impl JwksKeyResolver {
    /// `cache_ttl == 0` disables caching.
    pub fn new(url: Url, client: reqwest::Client, cache_ttl: Duration) -> Self {
        Self {
            url,
            client,
            cache_ttl,
            cache: RwLock::new(None),
        }
    }

    /// GET the key set. Timeouts come from the client.
    pub async fn fetch(&self) -> Result<JwkSet, KeyResolveError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(KeyResolveError::Fetch)?;

        let body = response.bytes().await.map_err(KeyResolveError::Fetch)?;

        let keys: JwkSet = serde_json::from_slice(&body).map_err(KeyResolveError::Decode)?;
        debug!(url = %self.url, keys = keys.keys.len(), "fetched jwks");

        Ok(keys)
    }

    fn caching(&self) -> bool {
        !self.cache_ttl.is_zero()
    }

    async fn cached(&self) -> Option<Arc<JwkSet>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|c| c.fetched_at.elapsed() < self.cache_ttl)
            .map(|c| c.keys.clone())
    }

    async fn refresh(&self) -> Result<Arc<JwkSet>, KeyResolveError> {
        let keys = Arc::new(self.fetch().await?);

        if self.caching() {
            let mut cache = self.cache.write().await;
            *cache = Some(CachedKeySet {
                fetched_at: Instant::now(),
                keys: keys.clone(),
            });
        }

        Ok(keys)
    }
}

#[async_trait]
impl KeyResolver for JwksKeyResolver {
    async fn resolve(&self, kid: &str) -> Result<KeyMaterial, KeyResolveError> {
        if self.caching()
            && let Some(keys) = self.cached().await
        {
            if let Some(jwk) = keys.find(kid) {
                return jwk.key_material();
            }
            // Unknown kid on a cached set: the provider may have rotated keys.
            // Any caller can trigger this with a made-up kid, so the cache does not
            // bound upstream traffic for such tokens.
            debug!(kid, "kid not in cached jwks, refreshing");
        }

        let keys = self.refresh().await?;
        match keys.find(kid) {
            Some(jwk) => jwk.key_material(),
            None => {
                warn!(kid, url = %self.url, "no matching key in jwks");
                Err(KeyResolveError::KeyNotFound {
                    kid: kid.to_string(),
                })
            }
        }
    }
}
