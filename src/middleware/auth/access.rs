//! Access-token check for protected routes → AuthCtx into request extensions.
//!
//! - Reads the raw `Authorization` header and hands it to the authorization chain
//!   (JWKS → RS256 validation → `/userinfo` principal check).
//! - 401 when the token does not verify, 403 when the principal is not allowed.
//! - The resulting AuthCtx belongs to this request only.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::api::extractors::AuthCtx;
use crate::error::AppError;
use crate::state::AppState;

/// Put the authorization chain in front of every route of `router`.
///
/// Example:
/// ```ignore
/// let protected = Router::new().route("/simple/", get(restricted));
/// let protected = middleware::auth::access::apply(protected, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // route_layer: unmatched paths stay 404 instead of turning into 401
    router.route_layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    // A header that is not valid visible ASCII is treated like a missing one.
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let authorized = state.auth.authorize(authorization.as_deref()).await?;

    // middleware → extractor
    req.extensions_mut().insert(AuthCtx::from(authorized));

    Ok(next.run(req).await)
}
