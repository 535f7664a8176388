use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use media::{
    compute_sampling_params, downsample_frames, normalize_frame_sizes_blocking, FrameExtractor,
    VideoProbe,
};
use transcribe::Transcriber;

use crate::adaptive::process_with_adaptive_frames;
use crate::cleanup::parse_flag;
use crate::model::{Embedder, VideoReader};
use crate::normalize::fit_dims;
use crate::{EmbedError, EmbeddingRequest, EmbeddingResult, ModelInputs, VideoContent, VideoInput};

pub const VIDEO_VERSION: &str = "qwen3_vl_v1";
pub const VIDEO_TRANSCRIPT_VERSION: &str = "qwen3_vl_whisper_v1";

/// Weight quantization requested from the model runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Quantization {
    #[default]
    None,
    Int8,
    Int4,
}

impl Quantization {
    pub fn as_str(self) -> &'static str {
        match self {
            Quantization::None => "none",
            Quantization::Int8 => "int8",
            Quantization::Int4 => "int4",
        }
    }
}

impl fmt::Display for Quantization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quantization {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Quantization::None),
            "int8" => Ok(Quantization::Int8),
            "int4" => Ok(Quantization::Int4),
            other => Err(format!("unsupported quantization: {other} (expected none, int8 or int4)")),
        }
    }
}

/// Whether to grab frames with ffmpeg instead of handing the model a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExtractorPolicy {
    /// Extract when the model's reader would decode the whole file.
    #[default]
    Auto,
    Always,
    Never,
}

impl ExtractorPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractorPolicy::Auto => "auto",
            ExtractorPolicy::Always => "ffmpeg",
            ExtractorPolicy::Never => "native",
        }
    }
}

impl FromStr for ExtractorPolicy {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim().to_ascii_lowercase();
        Ok(match raw.as_str() {
            "ffmpeg" => ExtractorPolicy::Always,
            "native" => ExtractorPolicy::Never,
            other => match parse_flag(other) {
                Some(true) => ExtractorPolicy::Always,
                Some(false) => ExtractorPolicy::Never,
                None => ExtractorPolicy::Auto,
            },
        })
    }
}

/// Pre-extraction only makes sense when frame sampling is on.
pub fn should_extract_frames(policy: ExtractorPolicy, target_frames: i64, reader: VideoReader) -> bool {
    if target_frames <= 0 {
        return false;
    }
    match policy {
        ExtractorPolicy::Always => true,
        ExtractorPolicy::Never => false,
        ExtractorPolicy::Auto => reader.loads_whole_video(),
    }
}

/// Video sampling and transcription settings for [`Qwen3VlBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct Qwen3VlOptions {
    pub video_fps: f64,
    pub video_max_frames: usize,
    pub video_target_frames: i64,
    pub extractor: ExtractorPolicy,
    /// Overrides the reader reported by the model.
    pub reader: Option<VideoReader>,
    pub transcribe_enabled: bool,
}

impl Default for Qwen3VlOptions {
    fn default() -> Self {
        Self {
            video_fps: 1.0,
            video_max_frames: 64,
            video_target_frames: 10,
            extractor: ExtractorPolicy::Auto,
            reader: None,
            transcribe_enabled: true,
        }
    }
}

/// Vision-language embedding backend with adaptive frame budgeting.
#[derive(Debug)]
pub struct Qwen3VlBackend {
    options: Qwen3VlOptions,
    embedder: Embedder,
    probe: VideoProbe,
    extractor: FrameExtractor,
    transcriber: Option<Arc<Transcriber>>,
}

impl Qwen3VlBackend {
    pub fn new(
        options: Qwen3VlOptions,
        embedder: Embedder,
        probe: VideoProbe,
        extractor: FrameExtractor,
        transcriber: Option<Arc<Transcriber>>,
    ) -> Self {
        Self {
            options,
            embedder,
            probe,
            extractor,
            transcriber,
        }
    }

    pub fn options(&self) -> &Qwen3VlOptions {
        &self.options
    }

    fn reader(&self) -> VideoReader {
        self.options.reader.unwrap_or_else(|| self.embedder.video_reader())
    }

    pub async fn embed_video(&self, request: EmbeddingRequest) -> Result<EmbeddingResult, EmbedError> {
        let started = Instant::now();
        let EmbeddingRequest {
            content,
            caption,
            dims,
            transcribe,
        } = request;

        let mut parts = Vec::with_capacity(2);
        if !caption.trim().is_empty() {
            parts.push(caption.trim().to_string());
        }

        let transcript = if transcribe.unwrap_or(self.options.transcribe_enabled) {
            self.transcript_for(&content).await?
        } else {
            None
        };
        if let Some(text) = &transcript {
            parts.push(text.clone());
        }
        let text = parts.join("\n\n");

        let target_frames = self.options.video_target_frames;
        let probe_started = Instant::now();
        let duration = match &content {
            VideoContent::Stored(path) if target_frames > 0 => self.probe.duration_seconds(path).await,
            _ => None,
        };
        let probe_ms = probe_started.elapsed().as_millis() as u64;

        let sampling = compute_sampling_params(
            duration,
            self.options.video_fps,
            self.options.video_max_frames,
            target_frames,
        );
        let reader = self.reader();

        let extract_started = Instant::now();
        let (video, extractor_label, size_mb) = match content {
            VideoContent::Stored(path) => {
                let size_mb = file_size_mb(&path).await;
                let (video, label) = self.video_input_for_path(path, sampling.fps, sampling.max_frames, reader).await;
                (video, label, size_mb)
            }
            VideoContent::Frames(frames) => {
                let frames = downsample_frames(frames, sampling.max_frames);
                let frames = normalize_frame_sizes_blocking(frames)
                    .await
                    .ok_or_else(|| EmbedError::InvalidInput("frame set is empty".into()))?;
                (VideoInput::Frames(frames), "upload", 0.0)
            }
        };
        let extract_ms = extract_started.elapsed().as_millis() as u64;
        let extracted = match &video {
            VideoInput::Frames(frames) => frames.len(),
            VideoInput::Path(_) => 0,
        };

        tracing::info!(
            size_mb,
            duration_s = ?duration,
            fps = sampling.fps,
            max_frames = sampling.max_frames,
            target_frames,
            reader = %reader,
            extractor = extractor_label,
            extracted,
            probe_ms,
            extract_ms,
            "embed_video start"
        );

        let base = ModelInputs {
            video: Some(video),
            text: Some(text).filter(|t| !t.is_empty()),
            fps: Some(sampling.fps),
            max_frames: Some(sampling.max_frames),
            sample_fps: Some(sampling.fps),
            duration_seconds: duration,
            ..ModelInputs::default()
        };

        let embed_started = Instant::now();
        let outcome = process_with_adaptive_frames(&self.embedder, &self.extractor, base).await;
        self.embedder.maybe_cleanup().await;
        let embed_ms = embed_started.elapsed().as_millis() as u64;

        let vector = first_vector(outcome?)?;
        let embedding = fit_dims(vector, dims);
        let version = if transcript.is_some() {
            VIDEO_TRANSCRIPT_VERSION
        } else {
            VIDEO_VERSION
        };

        tracing::info!(
            version,
            dims = embedding.len(),
            embed_ms,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "embed_video done"
        );
        Ok(EmbeddingResult::new(version, embedding, transcript))
    }

    pub async fn embed_text(&self, text: &str, dims: usize) -> Result<EmbeddingResult, EmbedError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EmbedError::InvalidInput("text_empty".into()));
        }

        let started = Instant::now();
        tracing::info!(text_len = text.len(), dims, "embed_text start");

        let outcome = self.embedder.process(&[ModelInputs::text(text)]).await;
        self.embedder.maybe_cleanup().await;

        let embedding = fit_dims(first_vector(outcome?)?, dims);
        tracing::info!(
            version = VIDEO_VERSION,
            dims = embedding.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "embed_text done"
        );
        Ok(EmbeddingResult::new(VIDEO_VERSION, embedding, None))
    }

    /// Transcribe stored files; uploaded frame sets carry no audio.
    async fn transcript_for(&self, content: &VideoContent) -> Result<Option<String>, EmbedError> {
        let VideoContent::Stored(path) = content else {
            tracing::debug!("frame upload has no audio, skipping transcription");
            return Ok(None);
        };
        let transcriber = self.transcriber.as_ref().ok_or_else(|| {
            EmbedError::DependenciesMissing("transcription enabled but no speech model is configured".into())
        })?;
        let text = transcriber.transcribe(path).await?;
        Ok(Some(text).filter(|t| !t.is_empty()))
    }

    async fn video_input_for_path(
        &self,
        path: PathBuf,
        fps: f64,
        max_frames: usize,
        reader: VideoReader,
    ) -> (VideoInput, &'static str) {
        if !should_extract_frames(self.options.extractor, self.options.video_target_frames, reader) {
            return (VideoInput::Path(path), "native");
        }
        match self.extractor.extract(&path, fps, max_frames).await {
            Some(frames) => (VideoInput::Frames(frames), "ffmpeg"),
            None => (VideoInput::Path(path), "native_fallback"),
        }
    }
}

fn first_vector(mut embeddings: Vec<Vec<f32>>) -> Result<Vec<f32>, EmbedError> {
    if embeddings.is_empty() {
        return Err(crate::ModelError::new(crate::ModelErrorKind::Other, "model returned no embeddings").into());
    }
    Ok(embeddings.swap_remove(0))
}

async fn file_size_mb(path: &Path) -> f64 {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.len() as f64 / (1024.0 * 1024.0))
        .unwrap_or(0.0)
}
