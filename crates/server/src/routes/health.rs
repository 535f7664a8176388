use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::ServerState;

/// Liveness probe; reports the configured backend name without building it.
pub async fn healthz(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "backend": state.settings.embedding_backend,
    }))
}
