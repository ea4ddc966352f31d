use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::db::queries;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    database: &'static str,
    timestamp: String,
}

// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let connected = state
        .conn()
        .map(|conn| queries::ping(&conn))
        .unwrap_or(false);

    Json(HealthResponse {
        status: "OK",
        database: if connected { "connected" } else { "disconnected" },
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
