/*
 * Responsibility
 * - GET /open/ : unrestricted, bypasses the authorization chain entirely
 */
use axum::Json;

use crate::api::dto::MessageResponse;

pub const OPEN_MESSAGE: &str = "Open route.";

pub async fn open() -> Json<MessageResponse> {
    Json(MessageResponse::new(OPEN_MESSAGE))
}
