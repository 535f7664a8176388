use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use embedding_worker::is_audio_path;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::routes::stored_file;
use crate::state::ServerState;

#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    #[serde(default)]
    pub storage_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub transcript: String,
}

/// Demux the stored video's audio track and transcribe it.
pub async fn transcribe_video(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<TranscribeRequest>,
) -> ApiResult<Json<TranscribeResponse>> {
    let path = stored_file(&state.settings, &req.storage_key).await?;
    run(&state, &path).await
}

/// Transcribe a stored audio file as-is; other extensions are refused.
pub async fn transcribe_audio(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<TranscribeRequest>,
) -> ApiResult<Json<TranscribeResponse>> {
    let path = stored_file(&state.settings, &req.storage_key).await?;
    if !is_audio_path(&path) {
        return Err(ApiError::InvalidInput(format!(
            "not a recognised audio file: {}",
            path.display()
        )));
    }
    run(&state, &path).await
}

async fn run(state: &ServerState, path: &Path) -> ApiResult<Json<TranscribeResponse>> {
    let transcriber = state.selector.transcriber(&state.settings)?;
    let transcript = transcriber.transcribe(path).await?;
    Ok(Json(TranscribeResponse { transcript }))
}
