/*
 * Responsibility
 * - load settings from the environment (audience / issuer / JWKS URL, CORS, port, ...)
 * - validate them (missing or malformed values fail at startup, not per request)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: Option<String>) -> Self {
        match value
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    pub auth_audience: String,
    pub auth_issuer: String,
    pub jwks_url: Url,
    pub userinfo_url: Url,
    pub access_token_leeway_seconds: u64,

    // Principal check: `principal[principal_attribute] == allowed_principal`
    pub principal_attribute: String,
    pub allowed_principal: String,

    // 0 = fetch the key set on every request
    pub jwks_cache_ttl: Duration,
    pub upstream_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup (the process env in production, a map in tests).
    pub fn from_source<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            var(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let port: u16 = match var("PORT") {
            Some(s) => s.trim().parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 4040,
        };

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(var("APP_ENV"));

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:4200".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let auth_audience = required("AUTH_AUDIENCE")?;
        let auth_issuer = required("AUTH_ISSUER")?;

        let jwks_url = Url::parse(&required("AUTH_JWKS_URL")?)
            .map_err(|_| ConfigError::Invalid("AUTH_JWKS_URL"))?;

        let userinfo_url =
            userinfo_url(&auth_issuer).map_err(|_| ConfigError::Invalid("AUTH_ISSUER"))?;

        let allowed_principal = required("AUTH_ALLOWED_PRINCIPAL")?;

        let principal_attribute = var("AUTH_PRINCIPAL_ATTRIBUTE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "email".to_string());

        let access_token_leeway_seconds =
            parse_u64(&var, "ACCESS_TOKEN_LEEWAY_SECONDS")?.unwrap_or(0);

        let jwks_cache_ttl =
            Duration::from_secs(parse_u64(&var, "JWKS_CACHE_TTL_SECONDS")?.unwrap_or(0));

        let upstream_timeout_seconds = parse_u64(&var, "UPSTREAM_TIMEOUT_SECONDS")?.unwrap_or(5);
        if upstream_timeout_seconds == 0 {
            return Err(ConfigError::Invalid("UPSTREAM_TIMEOUT_SECONDS"));
        }

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            auth_audience,
            auth_issuer,
            jwks_url,
            userinfo_url,
            access_token_leeway_seconds,
            principal_attribute,
            allowed_principal,
            jwks_cache_ttl,
            upstream_timeout: Duration::from_secs(upstream_timeout_seconds),
        })
    }
}

fn parse_u64<F>(var: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|v| v.trim().parse::<u64>().map_err(|_| ConfigError::Invalid(key)))
        .transpose()
}

/// `<issuer>/userinfo`. Providers usually publish the issuer with a trailing
/// slash (`https://tenant.example.com/`), but both forms are accepted.
pub fn userinfo_url(issuer: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!("{}/userinfo", issuer.trim_end_matches('/')))
}
