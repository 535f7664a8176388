use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use embedding_worker::{EmbeddingRequest, EmbeddingResult, Frame, VideoContent};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::routes::stored_file;
use crate::state::ServerState;

/// Body of `POST /v1/embed/video`. Exactly one of `storage_key` or `frames`.
#[derive(Debug, Deserialize)]
pub struct VideoEmbedRequest {
    #[serde(default)]
    pub storage_key: Option<String>,
    /// Base64-encoded still images (PNG, JPEG or WebP).
    #[serde(default)]
    pub frames: Option<Vec<String>>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Overrides `TRANSCRIBE_ENABLED` for this request.
    #[serde(default)]
    pub transcribe: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct TextEmbedRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub dims: Option<usize>,
}

pub async fn embed_video(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<VideoEmbedRequest>,
) -> ApiResult<Json<EmbeddingResult>> {
    let settings = &state.settings;
    let backend = state.selector.backend(settings)?;

    let content = match (req.storage_key, req.frames) {
        (Some(key), None) => VideoContent::Stored(stored_file(settings, &key).await?),
        (None, Some(frames)) => VideoContent::Frames(decode_frames_blocking(frames).await?),
        (Some(_), Some(_)) => {
            return Err(ApiError::InvalidInput(
                "provide either storage_key or frames, not both".into(),
            ))
        }
        (None, None) => {
            return Err(ApiError::InvalidInput(
                "one of storage_key or frames is required".into(),
            ))
        }
    };

    let dims = req.dims.unwrap_or(settings.embedding_dims);
    tracing::debug!(backend = %backend.kind(), dims, transcribe = ?req.transcribe, "embed video request");

    let result = backend
        .embed_video(EmbeddingRequest {
            content,
            caption: req.caption.unwrap_or_default(),
            dims,
            transcribe: req.transcribe,
        })
        .await?;
    Ok(Json(result))
}

pub async fn embed_text(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<TextEmbedRequest>,
) -> ApiResult<Json<EmbeddingResult>> {
    if req.text.trim().is_empty() {
        return Err(ApiError::TextEmpty);
    }

    let settings = &state.settings;
    let backend = state.selector.backend(settings)?;
    let dims = req.dims.unwrap_or(settings.embedding_dims);

    let result = backend.embed_text(&req.text, dims).await?;
    Ok(Json(result))
}

async fn decode_frames_blocking(encoded: Vec<String>) -> ApiResult<Vec<Frame>> {
    tokio::task::spawn_blocking(move || decode_frames(&encoded))
        .await
        .map_err(|err| ApiError::Embedding(format!("frame decode task failed: {err}")))?
}

fn decode_frames(encoded: &[String]) -> ApiResult<Vec<Frame>> {
    if encoded.is_empty() {
        return Err(ApiError::InvalidInput("frames must not be empty".into()));
    }
    encoded
        .iter()
        .enumerate()
        .map(|(index, data)| {
            let bytes = STANDARD
                .decode(strip_data_uri(data))
                .map_err(|err| ApiError::InvalidInput(format!("frame {index}: {err}")))?;
            image::load_from_memory(&bytes)
                .map_err(|err| ApiError::InvalidInput(format!("frame {index}: {err}")))
        })
        .collect()
}

/// Accept both bare base64 and `data:image/...;base64,` URIs.
fn strip_data_uri(data: &str) -> &str {
    match data.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => data.trim(),
    }
}
