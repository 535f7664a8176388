use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use embedding_worker::{EmbedError, StorageKeyError, Tool, TranscribeError};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub type ApiResult<T> = Result<T, ApiError>;

/// Request-level failures, each with a stable machine-readable code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    StorageKey(StorageKeyError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("text must not be empty")]
    TextEmpty,

    #[error("video not found: {}", .0.display())]
    VideoNotFound(PathBuf),

    #[error("backend not implemented: {0}")]
    NotImplemented(String),

    #[error("backend dependencies missing: {0}")]
    DependenciesMissing(String),

    #[error("{0} not found")]
    ToolMissing(Tool),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("Not found")]
    NotFound,
}

/// API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::StorageKey(_) | ApiError::InvalidInput(_) | ApiError::TextEmpty => {
                StatusCode::BAD_REQUEST
            }
            ApiError::VideoNotFound(_) | ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::NotImplemented(_)
            | ApiError::DependenciesMissing(_)
            | ApiError::ToolMissing(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Embedding(_) | ApiError::Transcription(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Missing external tools carry the binary name as a prefix: `ffmpeg_not_found`.
    pub fn error_code(&self) -> String {
        match self {
            ApiError::StorageKey(err) => err.code().to_string(),
            ApiError::InvalidInput(_) => "invalid_input".into(),
            ApiError::TextEmpty => "text_empty".into(),
            ApiError::VideoNotFound(_) => "video_not_found".into(),
            ApiError::NotImplemented(_) => "backend_not_implemented".into(),
            ApiError::DependenciesMissing(_) => "backend_dependencies_missing".into(),
            ApiError::ToolMissing(tool) => format!("{tool}_not_found"),
            ApiError::Embedding(_) => "embedding_failed".into(),
            ApiError::Transcription(_) => "transcription_failed".into(),
            ApiError::NotFound => "not_found".into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(code = %error_code, %message, "request failed");
        } else {
            tracing::debug!(code = %error_code, %message, "request rejected");
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<StorageKeyError> for ApiError {
    fn from(err: StorageKeyError) -> Self {
        ApiError::StorageKey(err)
    }
}

impl From<EmbedError> for ApiError {
    fn from(err: EmbedError) -> Self {
        match err {
            EmbedError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            EmbedError::NotFound(path) => ApiError::VideoNotFound(path),
            EmbedError::NotImplemented(name) => ApiError::NotImplemented(name),
            EmbedError::DependenciesMissing(msg) => ApiError::DependenciesMissing(msg),
            EmbedError::ExternalToolMissing(tool) => ApiError::ToolMissing(tool),
            EmbedError::Transcription(msg) => ApiError::Transcription(msg),
            other => ApiError::Embedding(other.to_string()),
        }
    }
}

impl From<TranscribeError> for ApiError {
    fn from(err: TranscribeError) -> Self {
        match err {
            TranscribeError::NotImplemented(name) => ApiError::NotImplemented(name),
            TranscribeError::DependenciesMissing(msg) => ApiError::DependenciesMissing(msg),
            TranscribeError::ToolMissing(tool) => ApiError::ToolMissing(tool),
            other => ApiError::Transcription(other.to_string()),
        }
    }
}
