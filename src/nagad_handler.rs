// neon_pay/src/nagad_handler.rs
// Nagad placeholder: every action answers "coming soon"

use axum::{extract::Path, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct PlaceholderResponse {
    pub ok: bool,
    pub error: &'static str,
    pub message: &'static str,
}

pub async fn nagad_placeholder_handler(Path(action): Path<String>) -> Json<PlaceholderResponse> {
    tracing::info!(%action, "[NAGAD] ℹ️ Placeholder endpoint hit");

    Json(PlaceholderResponse {
        ok: false,
        error: "Nagad API integration coming soon!",
        message: "This endpoint is reserved for future Nagad API implementation",
    })
}
