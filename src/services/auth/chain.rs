//! Authorization chain: bearer header → token validation → principal check.
//!
//! ```text
//! Unauthenticated ──token ok──▶ ClaimsOk ──principal ok──▶ PrincipalOk ──▶ Authorized
//!        │                          │
//!        └──▶ Unauthorized (401)    └──▶ Forbidden (403)
//! ```
//!
//! Everything produced here is owned by the request that asked for it.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::services::auth::token::{ClaimSet, TokenValidator, fingerprint};
use crate::services::identity::{IdentityLookup, Principal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Unauthenticated,
    ClaimsOk,
    PrincipalOk,
    Authorized,
}

/// Externally visible failure. Deliberately carries no detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
}

#[derive(Debug, thiserror::Error)]
#[error("principal attribute {attribute:?} does not match the allowed value")]
pub struct PrincipalMismatch {
    pub attribute: String,
}

/// `principal[attribute] == allowed`, string comparison.
#[derive(Debug, Clone)]
pub struct PrincipalPolicy {
    attribute: String,
    allowed: String,
}

impl PrincipalPolicy {
    pub fn new(attribute: impl Into<String>, allowed: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            allowed: allowed.into(),
        }
    }

    pub fn check(&self, principal: &Principal) -> Result<(), PrincipalMismatch> {
        match principal.attribute_str(&self.attribute) {
            Some(value) if value == self.allowed => Ok(()),
            _ => Err(PrincipalMismatch {
                attribute: self.attribute.clone(),
            }),
        }
    }
}

/// What a request that made it through the chain carries forward.
#[derive(Debug, Clone)]
pub struct Authorized {
    pub claims: ClaimSet,
    pub principal: Principal,
}

/// Extract the token from `Authorization: Bearer <token>` (scheme is case-insensitive).
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token)
}

pub struct AuthorizationChain {
    validator: TokenValidator,
    identity: Arc<dyn IdentityLookup>,
    policy: PrincipalPolicy,
}

impl std::fmt::Debug for AuthorizationChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationChain")
            .field("validator", &self.validator)
            .field("policy", &self.policy)
            .finish()
    }
}

impl AuthorizationChain {
    pub fn new(
        validator: TokenValidator,
        identity: Arc<dyn IdentityLookup>,
        policy: PrincipalPolicy,
    ) -> Self {
        Self {
            validator,
            identity,
            policy,
        }
    }

    /// Run the chain for one request. `authorization` is the raw header value.
    pub async fn authorize(&self, authorization: Option<&str>) -> Result<Authorized, Denial> {
        let Some(header) = authorization else {
            warn!(stage = ?AuthStage::Unauthenticated, "missing authorization header");
            return Err(Denial::Unauthorized);
        };

        let Some(token) = bearer_token(header) else {
            warn!(stage = ?AuthStage::Unauthenticated, "authorization header is not a bearer token");
            return Err(Denial::Unauthorized);
        };

        let token_fp = fingerprint(token);

        let claims = match self.validator.validate(token).await {
            Ok(claims) => claims,
            Err(err) => {
                warn!(
                    stage = ?AuthStage::Unauthenticated,
                    token = %token_fp,
                    unknown_key = err.is_key_not_found(),
                    error = %err,
                    "access token verification failed"
                );
                return Err(Denial::Unauthorized);
            }
        };
        debug!(stage = ?AuthStage::ClaimsOk, token = %token_fp, sub = ?claims.subject);

        // The original header value already carries the `Bearer` prefix.
        let principal = self.identity.fetch_principal(header).await;

        if let Err(err) = self.policy.check(&principal) {
            warn!(
                stage = ?AuthStage::ClaimsOk,
                token = %token_fp,
                sub = ?claims.subject,
                error = %err,
                "principal check failed"
            );
            return Err(Denial::Forbidden);
        }
        debug!(stage = ?AuthStage::PrincipalOk, token = %token_fp);

        debug!(stage = ?AuthStage::Authorized, token = %token_fp, scopes = %claims.scopes);
        Ok(Authorized { claims, principal })
    }
}
