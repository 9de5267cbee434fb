/*
 * Responsibility
 * - shared context attached to the Router (AppState)
 *   - the authorization chain (immutable, shared by every request)
 * - cheap to Clone (Arc inside)
 * - no per-request data lives here: claims/scopes travel in request extensions
 */
use std::sync::Arc;

use crate::services::auth::AuthorizationChain;

#[derive(Clone, Debug)]
pub struct AppState {
    pub auth: Arc<AuthorizationChain>,
}

impl AppState {
    pub fn new(auth: Arc<AuthorizationChain>) -> Self {
        Self { auth }
    }
}
