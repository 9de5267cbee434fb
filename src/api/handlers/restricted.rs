/*
 * Responsibility
 * - GET /simple/ : only reachable once the authorization chain passed
 * - reads the per-request AuthCtx (scopes are informational here; a handler
 *   that needs a scope checks `ctx.scopes.contains(..)` itself)
 */
use axum::Json;
use tracing::debug;

use crate::api::dto::RestrictedResponse;
use crate::api::extractors::AuthCtxExtractor;

pub const RESTRICTED_MESSAGE: &str = "A restricted route was successfully accessed.";

pub async fn restricted(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<RestrictedResponse> {
    for scope in ctx.scopes.iter() {
        debug!(scope, sub = ?ctx.subject, "scope in access token");
    }

    Json(RestrictedResponse {
        message: RESTRICTED_MESSAGE.to_string(),
        scopes: ctx.scopes,
    })
}
