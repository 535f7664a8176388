//! API route handlers
//!
//! - `health`: liveness
//! - `embed`: video and text embeddings
//! - `transcribe`: standalone speech-to-text for stored uploads

pub mod embed;
pub mod health;
pub mod transcribe;

use std::path::PathBuf;

use embedding_worker::{resolve_storage_key, Settings};

use crate::error::{ApiError, ApiResult};

/// 404 Not Found handler
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Resolve `key` under the upload directory and require the file to exist.
pub(crate) async fn stored_file(settings: &Settings, key: &str) -> ApiResult<PathBuf> {
    let path = resolve_storage_key(&settings.uploads_dir, key)?;
    match tokio::fs::try_exists(&path).await {
        Ok(true) => Ok(path),
        _ => Err(ApiError::VideoNotFound(path)),
    }
}
