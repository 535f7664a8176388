use std::fmt;
use std::str::FromStr;

use crate::deterministic::DeterministicBackend;
use crate::qwen3_vl::Qwen3VlBackend;
use crate::{EmbedError, EmbeddingRequest, EmbeddingResult, VideoContent};

/// Closed set of embedding backends, selected by name in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Deterministic,
    Qwen3Vl,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Deterministic => "deterministic",
            BackendKind::Qwen3Vl => "qwen3_vl",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = EmbedError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "deterministic" => Ok(BackendKind::Deterministic),
            "qwen3_vl" => Ok(BackendKind::Qwen3Vl),
            other => Err(EmbedError::NotImplemented(format!("unknown backend: {other}"))),
        }
    }
}

/// A constructed embedding backend.
#[derive(Debug)]
pub enum Backend {
    Deterministic(DeterministicBackend),
    Qwen3Vl(Qwen3VlBackend),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Deterministic(_) => BackendKind::Deterministic,
            Backend::Qwen3Vl(_) => BackendKind::Qwen3Vl,
        }
    }

    /// Embed a stored video or an uploaded frame set.
    pub async fn embed_video(&self, request: EmbeddingRequest) -> Result<EmbeddingResult, EmbedError> {
        if request.dims == 0 {
            return Err(EmbedError::InvalidInput("dims must be positive".into()));
        }
        match &request.content {
            VideoContent::Stored(path) => {
                if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                    return Err(EmbedError::NotFound(path.clone()));
                }
            }
            VideoContent::Frames(frames) if frames.is_empty() => {
                return Err(EmbedError::InvalidInput("frame set is empty".into()));
            }
            VideoContent::Frames(_) => {}
        }

        match self {
            Backend::Deterministic(backend) => {
                backend
                    .embed_video(&request.content, &request.caption, request.dims)
                    .await
            }
            Backend::Qwen3Vl(backend) => backend.embed_video(request).await,
        }
    }

    pub async fn embed_text(&self, text: &str, dims: usize) -> Result<EmbeddingResult, EmbedError> {
        if dims == 0 {
            return Err(EmbedError::InvalidInput("dims must be positive".into()));
        }
        match self {
            Backend::Deterministic(backend) => backend.embed_text(text, dims).await,
            Backend::Qwen3Vl(backend) => backend.embed_text(text, dims).await,
        }
    }
}
