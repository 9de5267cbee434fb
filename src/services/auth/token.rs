//! RS256 access-token validation.
//!
//! Segment splitting and JSON decoding happen here; `jsonwebtoken` is only used
//! for the key parsing (PEM / ASN.1, RSA components) and the signature primitive.
//!
//! Order:
//! 1. decode header + claims (untrusted)
//! 2. `alg` must be RS256
//! 3. `aud` / `iss` must match (reject-only, so safe on unverified values)
//! 4. resolve the key by `kid`, verify the signature
//! 5. `exp` / `nbf`
//! 6. build the `ClaimSet` (nothing downstream sees claims before this)

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::services::auth::jwks::{KeyMaterial, KeyResolveError, KeyResolver};
use crate::services::auth::scope::Scopes;

const EXPECTED_ALG: &str = "RS256";

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(&'static str),
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("invalid audience")]
    InvalidAudience,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error(transparent)]
    Key(#[from] KeyResolveError),
    #[error("malformed signing key: {0}")]
    KeyError(#[source] jsonwebtoken::errors::Error),
    #[error("signature verification failed")]
    SignatureInvalid,
    #[error("token expired")]
    TokenExpired,
    #[error("token not yet valid")]
    NotYetValid,
}

impl TokenError {
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Self::Key(KeyResolveError::KeyNotFound { .. }))
    }
}

/// Claims the rest of the request is allowed to rely on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSet {
    pub audience: String,
    pub issuer: String,
    pub subject: Option<String>,
    pub scopes: Scopes,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct JwtHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

// Decoded but not yet verified.
struct UnverifiedToken<'a> {
    signing_input: &'a str,
    signature: &'a str,
    header: JwtHeader,
    claims: Map<String, Value>,
}

impl<'a> UnverifiedToken<'a> {
    fn decode(raw: &'a str) -> Result<Self, TokenError> {
        let (signing_input, signature) = raw
            .rsplit_once('.')
            .ok_or(TokenError::Malformed("expected three segments"))?;
        let (header_b64, claims_b64) = signing_input
            .split_once('.')
            .ok_or(TokenError::Malformed("expected three segments"))?;

        if claims_b64.contains('.') || header_b64.is_empty() || signature.is_empty() {
            return Err(TokenError::Malformed("expected three segments"));
        }

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| TokenError::Malformed("header is not base64url"))?;
        let header: JwtHeader = serde_json::from_slice(&header_bytes)
            .map_err(|_| TokenError::Malformed("header is not a JSON object"))?;

        let claims_bytes = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| TokenError::Malformed("payload is not base64url"))?;
        let claims: Map<String, Value> = serde_json::from_slice(&claims_bytes)
            .map_err(|_| TokenError::Malformed("payload is not a JSON object"))?;

        Ok(Self {
            signing_input,
            signature,
            header,
            claims,
        })
    }

    fn string_claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }

    fn numeric_claim(&self, name: &'static str) -> Result<Option<i64>, TokenError> {
        match self.claims.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_i64()
                .or_else(|| v.as_f64().map(|f| f as i64))
                .map(Some)
                .ok_or(TokenError::Malformed("time claim is not numeric")),
        }
    }
}

/// Validates bearer tokens against one audience / issuer pair.
pub struct TokenValidator {
    audience: String,
    issuer: String,
    leeway_seconds: i64,
    resolver: Arc<dyn KeyResolver>,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

impl TokenValidator {
    pub fn new(
        audience: impl Into<String>,
        issuer: impl Into<String>,
        leeway_seconds: u64,
        resolver: Arc<dyn KeyResolver>,
    ) -> Self {
        Self {
            audience: audience.into(),
            issuer: issuer.into(),
            leeway_seconds: i64::try_from(leeway_seconds).unwrap_or(i64::MAX),
            resolver,
        }
    }

    pub async fn validate(&self, raw: &str) -> Result<ClaimSet, TokenError> {
        self.validate_at(raw, chrono::Utc::now().timestamp()).await
    }

    /// Same as [`validate`](Self::validate) with an explicit clock (seconds since epoch).
    pub async fn validate_at(&self, raw: &str, now: i64) -> Result<ClaimSet, TokenError> {
        let token = UnverifiedToken::decode(raw)?;

        if token.header.alg != EXPECTED_ALG {
            return Err(TokenError::UnsupportedAlgorithm(token.header.alg));
        }

        // Exact string match; array-form `aud` is not accepted.
        if token.string_claim("aud") != Some(self.audience.as_str()) {
            return Err(TokenError::InvalidAudience);
        }
        if token.string_claim("iss") != Some(self.issuer.as_str()) {
            return Err(TokenError::InvalidIssuer);
        }

        let kid = token
            .header
            .kid
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| KeyResolveError::KeyNotFound { kid: String::new() })?;

        let material = self.resolver.resolve(kid).await?;
        let key = decoding_key(&material)?;

        let verified = jsonwebtoken::crypto::verify(
            token.signature,
            token.signing_input.as_bytes(),
            &key,
            Algorithm::RS256,
        )
        .unwrap_or(false);
        if !verified {
            return Err(TokenError::SignatureInvalid);
        }

        // Signature is good from here on.
        let expires_at = token.numeric_claim("exp")?;
        if let Some(exp) = expires_at
            && now > exp.saturating_add(self.leeway_seconds)
        {
            return Err(TokenError::TokenExpired);
        }
        if let Some(nbf) = token.numeric_claim("nbf")?
            && now.saturating_add(self.leeway_seconds) < nbf
        {
            return Err(TokenError::NotYetValid);
        }

        let claims = ClaimSet {
            audience: self.audience.clone(),
            issuer: self.issuer.clone(),
            subject: token.string_claim("sub").map(str::to_string),
            scopes: Scopes::from_claim(token.claims.get("scope")),
            expires_at,
        };
        debug!(kid, sub = ?claims.subject, scopes = %claims.scopes, "token verified");

        Ok(claims)
    }
}

fn decoding_key(material: &KeyMaterial) -> Result<DecodingKey, TokenError> {
    match material {
        KeyMaterial::PemCertificate(pem) => DecodingKey::from_rsa_pem(pem.as_bytes()),
        KeyMaterial::RsaComponents { n, e } => DecodingKey::from_rsa_components(n, e),
    }
    .map_err(TokenError::KeyError)
}

/// Short, non-reversible token id for log correlation (tokens are never logged).
pub fn fingerprint(raw: &str) -> String {
    Sha256::digest(raw.as_bytes())
        .iter()
        .take(6)
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::services::auth::jwks::pem_certificate;
    use crate::services::auth::testing::*;

    fn segment(value: &Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
    }

    #[tokio::test]
    async fn valid_token_yields_claim_set() {
        let token = sign(&claims(), Some("primary"), PRIMARY_KEY);

        let claims = validator().validate_at(&token, NOW).await.unwrap();

        assert_eq!(claims.audience, AUD);
        assert_eq!(claims.issuer, ISS);
        assert_eq!(claims.subject.as_deref(), Some("auth0|abc123"));
        assert_eq!(claims.scopes.as_slice(), ["read:items", "write:items"]);
        assert_eq!(claims.expires_at, Some(NOW + 3600));
    }

    #[tokio::test]
    async fn rsa_components_verify_like_the_certificate() {
        let v = validator_with(vec![(
            "primary",
            KeyMaterial::RsaComponents {
                n: PRIMARY_N.trim().to_string(),
                e: "AQAB".to_string(),
            },
        )]);
        let token = sign(&claims(), Some("primary"), PRIMARY_KEY);

        assert!(v.validate_at(&token, NOW).await.is_ok());
    }

    #[tokio::test]
    async fn missing_scope_is_empty() {
        let mut c = claims();
        c.as_object_mut().unwrap().remove("scope");
        let token = sign(&c, Some("primary"), PRIMARY_KEY);

        let claims = validator().validate_at(&token, NOW).await.unwrap();
        assert!(claims.scopes.is_empty());
    }

    #[tokio::test]
    async fn unknown_kid_is_key_not_found() {
        let token = sign(&claims(), Some("rotated-away"), ROGUE_KEY);

        let err = validator().validate_at(&token, NOW).await.unwrap_err();
        assert!(err.is_key_not_found(), "{err:?}");
    }

    #[tokio::test]
    async fn missing_kid_is_key_not_found() {
        let token = sign(&claims(), None, PRIMARY_KEY);

        let err = validator().validate_at(&token, NOW).await.unwrap_err();
        assert!(err.is_key_not_found(), "{err:?}");
    }

    #[tokio::test]
    async fn wrong_key_under_known_kid_is_signature_invalid() {
        let token = sign(&claims(), Some("primary"), ROGUE_KEY);

        let err = validator().validate_at(&token, NOW).await.unwrap_err();
        assert!(matches!(err, TokenError::SignatureInvalid), "{err:?}");
    }

    #[tokio::test]
    async fn tampered_payload_is_signature_invalid() {
        let token = sign(&claims(), Some("primary"), PRIMARY_KEY);
        let parts: Vec<&str> = token.split('.').collect();
        let forged = segment(&with(claims(), "scope", json!("admin")));
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);

        let err = validator().validate_at(&tampered, NOW).await.unwrap_err();
        assert!(matches!(err, TokenError::SignatureInvalid), "{err:?}");
    }

    #[tokio::test]
    async fn audience_mismatch_wins_regardless_of_signature() {
        let c = with(claims(), "aud", json!("https://other.example.com"));

        for key in [PRIMARY_KEY, ROGUE_KEY] {
            let token = sign(&c, Some("primary"), key);
            let err = validator().validate_at(&token, NOW).await.unwrap_err();
            assert!(matches!(err, TokenError::InvalidAudience), "{err:?}");
        }
    }

    #[tokio::test]
    async fn array_audience_is_rejected() {
        let c = with(claims(), "aud", json!([AUD, format!("{ISS}userinfo")]));
        let token = sign(&c, Some("primary"), PRIMARY_KEY);

        let err = validator().validate_at(&token, NOW).await.unwrap_err();
        assert!(matches!(err, TokenError::InvalidAudience), "{err:?}");
    }

    #[tokio::test]
    async fn issuer_mismatch_is_invalid_issuer() {
        let c = with(claims(), "iss", json!("https://evil.example.com/"));

        for key in [PRIMARY_KEY, ROGUE_KEY] {
            let token = sign(&c, Some("primary"), key);
            let err = validator().validate_at(&token, NOW).await.unwrap_err();
            assert!(matches!(err, TokenError::InvalidIssuer), "{err:?}");
        }

        let mut c = claims();
        c.as_object_mut().unwrap().remove("iss");
        let token = sign(&c, Some("primary"), PRIMARY_KEY);
        let err = validator().validate_at(&token, NOW).await.unwrap_err();
        assert!(matches!(err, TokenError::InvalidIssuer), "{err:?}");
    }

    #[tokio::test]
    async fn expired_token_is_rejected_after_signature_check() {
        let token = sign(
            &with(claims(), "exp", json!(NOW - 1)),
            Some("primary"),
            PRIMARY_KEY,
        );

        let err = validator().validate_at(&token, NOW).await.unwrap_err();
        assert!(matches!(err, TokenError::TokenExpired), "{err:?}");

        // a forged expired token is a signature failure, not an expiry
        let forged = sign(
            &with(claims(), "exp", json!(NOW - 1)),
            Some("primary"),
            ROGUE_KEY,
        );
        let err = validator().validate_at(&forged, NOW).await.unwrap_err();
        assert!(matches!(err, TokenError::SignatureInvalid), "{err:?}");
    }

    #[tokio::test]
    async fn leeway_applies_to_exp_and_nbf() {
        let lenient = TokenValidator::new(
            AUD,
            ISS,
            30,
            static_keys(vec![("primary", primary_material())]),
        );

        let expired = sign(
            &with(claims(), "exp", json!(NOW - 10)),
            Some("primary"),
            PRIMARY_KEY,
        );
        assert!(lenient.validate_at(&expired, NOW).await.is_ok());

        let early = sign(
            &with(claims(), "nbf", json!(NOW + 10)),
            Some("primary"),
            PRIMARY_KEY,
        );
        assert!(lenient.validate_at(&early, NOW).await.is_ok());

        let too_early = sign(
            &with(claims(), "nbf", json!(NOW + 120)),
            Some("primary"),
            PRIMARY_KEY,
        );
        let err = lenient.validate_at(&too_early, NOW).await.unwrap_err();
        assert!(matches!(err, TokenError::NotYetValid), "{err:?}");
    }

    #[tokio::test]
    async fn non_rs256_tokens_are_refused() {
        let header = segment(&json!({"alg": "HS256", "kid": "primary", "typ": "JWT"}));
        let token = format!("{}.{}.c2ln", header, segment(&claims()));

        let err = validator().validate_at(&token, NOW).await.unwrap_err();
        assert!(
            matches!(err, TokenError::UnsupportedAlgorithm(ref alg) if alg == "HS256"),
            "{err:?}"
        );

        let header = segment(&json!({"alg": "none"}));
        let token = format!("{}.{}.x", header, segment(&claims()));
        let err = validator().validate_at(&token, NOW).await.unwrap_err();
        assert!(matches!(err, TokenError::UnsupportedAlgorithm(_)), "{err:?}");
    }

    #[tokio::test]
    async fn garbage_is_malformed() {
        for raw in [
            "",
            "not-a-token",
            "a.b",
            "a.b.c.d",
            "%%%.%%%.%%%",
            "e30.bm90IGpzb24.c2ln",
        ] {
            let err = validator().validate_at(raw, NOW).await.unwrap_err();
            assert!(matches!(err, TokenError::Malformed(_)), "{raw}: {err:?}");
        }
    }

    #[tokio::test]
    async fn malformed_key_material_is_key_error() {
        let v = validator_with(vec![(
            "primary",
            KeyMaterial::PemCertificate(pem_certificate("AAAA")),
        )]);
        let token = sign(&claims(), Some("primary"), PRIMARY_KEY);

        let err = v.validate_at(&token, NOW).await.unwrap_err();
        assert!(matches!(err, TokenError::KeyError(_)), "{err:?}");
    }

    #[test]
    fn fingerprint_is_short_and_stable() {
        let a = fingerprint("token-a");
        assert_eq!(a.len(), 12);
        assert_eq!(a, fingerprint("token-a"));
        assert_ne!(a, fingerprint("token-b"));
    }
}
