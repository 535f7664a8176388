use std::path::PathBuf;

use image::DynamicImage;
use serde::Serialize;

/// Where the video content for one request comes from.
#[derive(Debug, Clone)]
pub enum VideoContent {
    /// A file under the upload directory.
    Stored(PathBuf),
    /// Frames decoded from an uploaded frame set.
    Frames(Vec<DynamicImage>),
}

/// One video embedding request, after validation at the API edge.
#[derive(Debug, Clone)]
pub struct EmbeddingRequest {
    pub content: VideoContent,
    pub caption: String,
    /// Requested output length. Must be positive.
    pub dims: usize,
    /// Overrides the backend's transcription default when set.
    pub transcribe: Option<bool>,
}

/// Final embedding handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingResult {
    /// Tag identifying the code path that produced the vector.
    pub version: String,
    pub embedding: Vec<f32>,
    pub dims: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

impl EmbeddingResult {
    pub fn new(version: impl Into<String>, embedding: Vec<f32>, transcript: Option<String>) -> Self {
        let dims = embedding.len();
        Self {
            version: version.into(),
            embedding,
            dims,
            transcript,
        }
    }
}

/// Video as the model sees it: a path for its native reader, or decoded frames.
#[derive(Debug, Clone)]
pub enum VideoInput {
    Path(PathBuf),
    Frames(Vec<DynamicImage>),
}

impl VideoInput {
    pub fn is_frames(&self) -> bool {
        matches!(self, VideoInput::Frames(_))
    }
}

/// A single structured model input. The adaptive loop rewrites `video`,
/// `fps`, `sample_fps` and `max_frames` between attempts.
#[derive(Debug, Clone, Default)]
pub struct ModelInputs {
    pub video: Option<VideoInput>,
    pub image: Option<String>,
    pub text: Option<String>,
    pub instruction: Option<String>,
    pub fps: Option<f64>,
    pub max_frames: Option<usize>,
    pub sample_fps: Option<f64>,
    pub duration_seconds: Option<f64>,
}

impl ModelInputs {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Raw model output for a batch: `[batch][seq][hidden]` and `[batch][seq]`.
#[derive(Debug, Clone, PartialEq, Default, serde::Deserialize)]
pub struct ModelOutput {
    pub last_hidden_state: Vec<Vec<Vec<f32>>>,
    pub attention_mask: Vec<Vec<i64>>,
}
