/*
 * Responsibility
 * - response DTOs of the open / restricted routes
 */
use serde::Serialize;

use crate::services::auth::Scopes;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RestrictedResponse {
    pub message: String,
    // scopes granted to *this* request's token
    pub scopes: Scopes,
}
