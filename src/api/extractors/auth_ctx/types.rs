/*
 * Responsibility
 * - the "authenticated context" handlers see
 * - built by the access middleware per request and stored in request extensions;
 *   never shared between requests
 */
use crate::services::auth::{Authorized, Scopes};
use crate::services::identity::Principal;

/// Context attached to an authorized request.
///
/// - `subject` is the token's `sub`
/// - `scopes` come from the token's `scope` claim, in order
/// - `principal` is the `/userinfo` profile the principal check ran against
#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub subject: Option<String>,
    pub scopes: Scopes,
    pub principal: Principal,
}

impl From<Authorized> for AuthCtx {
    fn from(authorized: Authorized) -> Self {
        Self {
            subject: authorized.claims.subject,
            scopes: authorized.claims.scopes,
            principal: authorized.principal,
        }
    }
}
