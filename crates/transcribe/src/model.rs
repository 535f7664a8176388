use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::budget::GenerationLimits;
use crate::SpeechError;

/// Decoding options for one transcription call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechRequest {
    pub task: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub fp16: bool,
    pub return_timestamps: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,
}

impl SpeechRequest {
    pub fn transcribe(language: Option<String>) -> Self {
        Self {
            task: "transcribe",
            language,
            fp16: false,
            return_timestamps: false,
            max_new_tokens: None,
        }
    }
}

/// A loaded speech-to-text model.
#[async_trait]
pub trait SpeechModel: Send + Sync {
    /// Transcribe an audio file. The returned text is raw model output.
    async fn transcribe(&self, audio: &Path, request: &SpeechRequest) -> Result<String, SpeechError>;

    /// Positional limits used to size the generation budget. Models that do
    /// not expose them return `Ok(None)`.
    async fn generation_limits(&self) -> Result<Option<GenerationLimits>, SpeechError> {
        Ok(None)
    }

    /// Device the model runs on (`cuda`, `mps`, `cpu`, or `auto`).
    fn device(&self) -> &str;
}
