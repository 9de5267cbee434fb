/// Factory: build the `AuthorizationChain` from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::services::auth::{
    AuthorizationChain, JwksKeyResolver, PrincipalPolicy, TokenValidator,
};
use crate::services::identity::UserinfoClient;

/// One HTTP client for both upstream calls; the timeout bounds key fetch and userinfo alike.
pub fn build_http_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(config.upstream_timeout)
        .connect_timeout(config.upstream_timeout)
        .build()
}

pub fn build_authorization_chain(
    config: &Config,
    client: reqwest::Client,
) -> Arc<AuthorizationChain> {
    let resolver = JwksKeyResolver::new(
        config.jwks_url.clone(),
        client.clone(),
        config.jwks_cache_ttl,
    );

    let validator = TokenValidator::new(
        config.auth_audience.clone(),
        config.auth_issuer.clone(),
        config.access_token_leeway_seconds,
        Arc::new(resolver),
    );

    let identity = UserinfoClient::new(config.userinfo_url.clone(), client);

    let policy = PrincipalPolicy::new(
        config.principal_attribute.clone(),
        config.allowed_principal.clone(),
    );

    Arc::new(AuthorizationChain::new(
        validator,
        Arc::new(identity),
        policy,
    ))
}
