/*
 * Responsibility
 * - URL layout of the API
 * - decide which routes go through the authorization chain (route_layer)
 *   - /health, /open/  : public
 *   - /simple/         : bearer token + principal check
 */
use axum::{Router, routing::get};

use crate::api::handlers::{health::health, open::open, restricted::restricted};
use crate::middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new().route("/simple/", get(restricted));
    let protected = middleware::auth::access::apply(protected, state);

    Router::new()
        .route("/health", get(health))
        .route("/open/", get(open))
        .merge(protected)
}
