//! Shared helpers for the integration tests: RSA fixtures, token signing,
//! and a router wired against a wiremock identity provider.
#![allow(dead_code)]

use std::collections::HashMap;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use tower::ServiceExt;

use jwks_guard::app::{build_router, build_state};
use jwks_guard::config::Config;

pub const PRIMARY_KEY: &str = include_str!("../fixtures/primary.key.pem");
pub const PRIMARY_CERT: &str = include_str!("../fixtures/primary.cert.pem");
pub const ROGUE_KEY: &str = include_str!("../fixtures/rogue.key.pem");
pub const ROGUE_CERT: &str = include_str!("../fixtures/rogue.cert.pem");

pub const AUDIENCE: &str = "https://api.example.com";
pub const ALLOWED_EMAIL: &str = "owner@example.com";
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// base64 DER body of a PEM certificate, i.e. what `x5c[0]` carries.
pub fn x5c(cert_pem: &str) -> String {
    cert_pem
        .lines()
        .filter(|l| !l.starts_with("-----"))
        .collect()
}

pub fn jwks(keys: &[(&str, &str)]) -> Value {
    let keys: Vec<Value> = keys
        .iter()
        .map(|(kid, cert)| {
            json!({
                "alg": "RS256",
                "kty": "RSA",
                "use": "sig",
                "kid": kid,
                "n": "unused-when-x5c-present",
                "e": "AQAB",
                "x5c": [x5c(cert)]
            })
        })
        .collect();
    json!({ "keys": keys })
}

pub fn issuer(server_uri: &str) -> String {
    format!("{}/", server_uri)
}

pub fn claims(issuer: &str, scope: &str) -> Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "iss": issuer,
        "sub": "auth0|abc123",
        "aud": AUDIENCE,
        "iat": now,
        "exp": now + 600,
        "scope": scope
    })
}

pub fn sign(claims: &Value, kid: &str, private_pem: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("fixture key");
    jsonwebtoken::encode(&header, claims, &key).expect("sign token")
}

pub fn config(server_uri: &str, extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("AUTH_AUDIENCE".to_string(), AUDIENCE.to_string()),
        ("AUTH_ISSUER".to_string(), issuer(server_uri)),
        (
            "AUTH_JWKS_URL".to_string(),
            format!("{}{}", server_uri, JWKS_PATH),
        ),
        ("AUTH_ALLOWED_PRINCIPAL".to_string(), ALLOWED_EMAIL.to_string()),
        ("UPSTREAM_TIMEOUT_SECONDS".to_string(), "2".to_string()),
    ]);
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }

    Config::from_source(|key| vars.get(key).cloned()).expect("test config")
}

pub fn app(server_uri: &str) -> Router {
    let config = config(server_uri, &[]);
    let state = build_state(&config).expect("state");
    build_router(state, &config)
}

pub fn get(path: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).expect("request")
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("infallible");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}
