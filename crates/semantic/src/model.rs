use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::cleanup::CleanupPolicy;
use crate::normalize::l2_normalize_in_place;
use crate::pooling::pool_last;
use crate::{ModelError, ModelInputs, ModelOutput};

/// Video decoding library used by the model runtime when handed a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VideoReader {
    TorchCodec,
    Decord,
    /// Decodes the whole file into memory before sampling.
    #[default]
    TorchVision,
}

impl VideoReader {
    pub fn as_str(self) -> &'static str {
        match self {
            VideoReader::TorchCodec => "torchcodec",
            VideoReader::Decord => "decord",
            VideoReader::TorchVision => "torchvision",
        }
    }

    /// Memory and time for this reader grow with clip length, not with the
    /// number of sampled frames.
    pub fn loads_whole_video(self) -> bool {
        self == VideoReader::TorchVision
    }
}

impl fmt::Display for VideoReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoReader {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "torchcodec" => Ok(VideoReader::TorchCodec),
            "decord" => Ok(VideoReader::Decord),
            "torchvision" => Ok(VideoReader::TorchVision),
            other => Err(format!("unknown video reader: {other}")),
        }
    }
}

/// A loaded vision-language model.
///
/// `process` is the raw batch call. Failures carry the library's exception
/// class and message text unchanged so they can be classified.
#[async_trait]
pub trait VisionLanguageModel: Send + Sync {
    async fn process(&self, inputs: &[ModelInputs]) -> Result<ModelOutput, ModelError>;

    /// Resolved device (`cuda`, `mps`, `cpu`).
    fn device(&self) -> &str;

    fn video_reader(&self) -> VideoReader {
        VideoReader::default()
    }

    /// Best effort; failures are swallowed by implementations.
    async fn release_cached_memory(&self) {}
}

/// Model plus the policy around it: pooling, normalization and memory hygiene.
#[derive(Clone)]
pub struct Embedder {
    model: Arc<dyn VisionLanguageModel>,
    cleanup: CleanupPolicy,
}

impl fmt::Debug for Embedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Embedder")
            .field("device", &self.model.device())
            .field("reader", &self.model.video_reader())
            .field("cleanup", &self.cleanup)
            .finish()
    }
}

impl Embedder {
    pub fn new(model: Arc<dyn VisionLanguageModel>, cleanup: CleanupPolicy) -> Self {
        Self { model, cleanup }
    }

    pub fn device(&self) -> &str {
        self.model.device()
    }

    pub fn video_reader(&self) -> VideoReader {
        self.model.video_reader()
    }

    /// Run the model and return one unit-length pooled vector per input.
    pub async fn process(&self, inputs: &[ModelInputs]) -> Result<Vec<Vec<f32>>, ModelError> {
        let output = self.model.process(inputs).await?;
        let mut pooled = pool_last(&output)?;
        for vector in &mut pooled {
            l2_normalize_in_place(vector);
        }
        Ok(pooled)
    }

    pub async fn maybe_cleanup(&self) {
        if self.cleanup.should_cleanup(self.model.device()) {
            tracing::debug!(device = self.model.device(), "releasing cached model memory");
            self.model.release_cached_memory().await;
        }
    }
}
