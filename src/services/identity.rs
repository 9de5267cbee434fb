//! `/userinfo` lookup.
//!
//! The provider's profile endpoint is called with the caller's own
//! `Authorization` header. Failures are soft: the caller gets an empty
//! [`Principal`], which the principal check then rejects as forbidden.

use async_trait::async_trait;
use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

/// Profile attributes returned by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(Map<String, Value>);

impl Principal {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self(attributes)
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.0.get(attribute)
    }

    /// String attribute, `None` when absent or not a string.
    pub fn attribute_str(&self, attribute: &str) -> Option<&str> {
        self.get(attribute).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("userinfo request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("userinfo body is not a JSON object: {0}")]
    Decode(#[source] serde_json::Error),
}

#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// `authorization` is the raw header value, `Bearer` prefix included.
    async fn fetch_principal(&self, authorization: &str) -> Principal;
}

#[derive(Debug, Clone)]
pub struct UserinfoClient {
    url: Url,
    client: reqwest::Client,
}

impl UserinfoClient {
    pub fn new(url: Url, client: reqwest::Client) -> Self {
        Self { url, client }
    }

    pub async fn try_fetch(&self, authorization: &str) -> Result<Principal, LookupError> {
        let response = self
            .client
            .get(self.url.clone())
            .header(header::AUTHORIZATION, authorization)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(LookupError::Request)?;

        let body = response.bytes().await.map_err(LookupError::Request)?;
        let attributes: Map<String, Value> =
            serde_json::from_slice(&body).map_err(LookupError::Decode)?;

        Ok(Principal::new(attributes))
    }
}

#[async_trait]
impl IdentityLookup for UserinfoClient {
    async fn fetch_principal(&self, authorization: &str) -> Principal {
        match self.try_fetch(authorization).await {
            Ok(principal) => {
                debug!(
                    attributes = principal.0.len(),
                    email_verified = ?principal.get("email_verified"),
                    "userinfo fetched"
                );
                principal
            }
            Err(err) => {
                warn!(error = %err, url = %self.url, "userinfo lookup failed, using empty principal");
                Principal::default()
            }
        }
    }
}
