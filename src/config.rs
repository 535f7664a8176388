//! Worker settings.
//!
//! Every knob is an environment-style key/value pair. Keys are read without a
//! prefix and matched case-insensitively, so `QWEN_VIDEO_FPS=0.5` lands in
//! [`Settings::qwen_video_fps`].
//!
//! ```text
//! UPLOADS_DIR=/srv/uploads
//! EMBEDDING_BACKEND=qwen3_vl
//! QWEN_ENDPOINT=http://127.0.0.1:8500
//! QWEN_VIDEO_TARGET_FRAMES=10
//! QWEN_VIDEO_FRAME_EXTRACTOR=auto
//! WHISPER_BACKEND=transformers
//! WHISPER_ENDPOINT=http://127.0.0.1:8501
//! ```
//!
//! Settings are loaded once by the binary and shared by handle; nothing here
//! caches process-wide state.

use std::collections::HashMap;
use std::path::PathBuf;

use media::ToolOverrides;
use semantic::{
    BackendKind, CleanupPolicy, EmbedError, ExtractorPolicy, Quantization, VideoReader,
};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use transcribe::{SpeechBackend, TranscribeError};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory storage keys resolve under. Made absolute on load.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,

    #[serde(default = "default_backend")]
    pub embedding_backend: String,

    /// Output length used when a request does not ask for one.
    #[serde(default = "default_dims")]
    pub embedding_dims: usize,

    #[serde(default = "default_qwen_model")]
    pub qwen_model: String,
    /// Model runtime base URL.
    #[serde(default)]
    pub qwen_endpoint: Option<String>,
    #[serde(default = "default_device")]
    pub qwen_device: String,
    #[serde(default = "default_max_length")]
    pub qwen_max_length: usize,
    #[serde(default = "default_quantization")]
    pub qwen_quantization: String,
    #[serde(default = "default_batch_size")]
    pub qwen_batch_size: usize,
    #[serde(default)]
    pub qwen_batch_wait_ms: u64,

    #[serde(default = "default_video_fps")]
    pub qwen_video_fps: f64,
    #[serde(default = "default_video_max_frames")]
    pub qwen_video_max_frames: usize,
    /// Non-positive disables duration-based sampling.
    #[serde(default = "default_video_target_frames")]
    pub qwen_video_target_frames: i64,
    #[serde(default = "default_auto")]
    pub qwen_video_frame_extractor: String,
    #[serde(default)]
    pub qwen_video_reader: Option<String>,

    #[serde(default = "default_auto")]
    pub model_cleanup: String,

    #[serde(default = "default_true")]
    pub transcribe_enabled: bool,
    #[serde(default = "default_whisper_backend")]
    pub whisper_backend: String,
    #[serde(default = "default_whisper_model")]
    pub whisper_model: String,
    #[serde(default = "default_device")]
    pub whisper_device: String,
    #[serde(default)]
    pub whisper_language: Option<String>,
    #[serde(default)]
    pub whisper_endpoint: Option<String>,
    /// Blank counts as unset.
    #[serde(default, deserialize_with = "blank_as_none")]
    pub whisper_max_new_tokens: Option<u32>,

    #[serde(default)]
    pub ffmpeg_bin: Option<PathBuf>,
    #[serde(default)]
    pub ffprobe_bin: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            uploads_dir: default_uploads_dir(),
            embedding_backend: default_backend(),
            embedding_dims: default_dims(),
            qwen_model: default_qwen_model(),
            qwen_endpoint: None,
            qwen_device: default_device(),
            qwen_max_length: default_max_length(),
            qwen_quantization: default_quantization(),
            qwen_batch_size: default_batch_size(),
            qwen_batch_wait_ms: 0,
            qwen_video_fps: default_video_fps(),
            qwen_video_max_frames: default_video_max_frames(),
            qwen_video_target_frames: default_video_target_frames(),
            qwen_video_frame_extractor: default_auto(),
            qwen_video_reader: None,
            model_cleanup: default_auto(),
            transcribe_enabled: true,
            whisper_backend: default_whisper_backend(),
            whisper_model: default_whisper_model(),
            whisper_device: default_device(),
            whisper_language: None,
            whisper_endpoint: None,
            whisper_max_new_tokens: None,
            ffmpeg_bin: None,
            ffprobe_bin: None,
        }
    }
}

impl Settings {
    /// Load from the process environment.
    pub fn load() -> Result<Self, SettingsError> {
        Self::from_environment(config::Environment::default())
    }

    /// Load from explicit key/value pairs through the same source the process
    /// environment uses. Keys are environment-style (`EMBEDDING_DIMS`).
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, SettingsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_environment(config::Environment::default().source(Some(map)))
    }

    fn from_environment(source: config::Environment) -> Result<Self, SettingsError> {
        let mut settings: Settings = config::Config::builder()
            .add_source(source.try_parsing(true))
            .build()?
            .try_deserialize()?;

        if settings.uploads_dir.is_relative() {
            if let Ok(absolute) = std::path::absolute(&settings.uploads_dir) {
                settings.uploads_dir = absolute;
            }
        }
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        self.quantization()?;
        self.video_reader()?;
        if !(self.qwen_video_fps.is_finite() && self.qwen_video_fps > 0.0) {
            return Err(SettingsError::Invalid {
                key: "QWEN_VIDEO_FPS",
                message: format!("must be a positive number, got {}", self.qwen_video_fps),
            });
        }
        if self.embedding_dims == 0 {
            return Err(SettingsError::Invalid {
                key: "EMBEDDING_DIMS",
                message: "must be positive".into(),
            });
        }
        Ok(())
    }

    /// Unknown names surface per request as `not_implemented`, not at load.
    pub fn backend_kind(&self) -> Result<BackendKind, EmbedError> {
        self.embedding_backend.parse()
    }

    pub fn speech_backend(&self) -> Result<SpeechBackend, TranscribeError> {
        self.whisper_backend.parse()
    }

    pub fn quantization(&self) -> Result<Quantization, SettingsError> {
        self.qwen_quantization
            .parse()
            .map_err(|message| SettingsError::Invalid {
                key: "QWEN_QUANTIZATION",
                message,
            })
    }

    pub fn video_reader(&self) -> Result<Option<VideoReader>, SettingsError> {
        match non_empty(&self.qwen_video_reader) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|message| SettingsError::Invalid {
                key: "QWEN_VIDEO_READER",
                message,
            }),
        }
    }

    pub fn extractor_policy(&self) -> ExtractorPolicy {
        let Ok(policy) = self.qwen_video_frame_extractor.parse();
        policy
    }

    pub fn cleanup_policy(&self) -> CleanupPolicy {
        let Ok(policy) = self.model_cleanup.parse();
        policy
    }

    pub fn tool_overrides(&self) -> ToolOverrides {
        ToolOverrides {
            ffmpeg: self.ffmpeg_bin.clone().filter(|p| !p.as_os_str().is_empty()),
            ffprobe: self.ffprobe_bin.clone().filter(|p| !p.as_os_str().is_empty()),
        }
    }

    pub fn whisper_language(&self) -> Option<&str> {
        non_empty(&self.whisper_language)
    }

    pub fn qwen_endpoint(&self) -> Option<&str> {
        non_empty(&self.qwen_endpoint)
    }

    pub fn whisper_endpoint(&self) -> Option<&str> {
        non_empty(&self.whisper_endpoint)
    }

    /// Every field that decides which speech model is loaded and how audio reaches it.
    pub fn transcriber_fingerprint(&self) -> String {
        format!(
            "whisper:{}:{}:{}:{}:{}:{:?}:{:?}",
            self.whisper_backend,
            self.whisper_model,
            self.whisper_device,
            self.whisper_language().unwrap_or(""),
            self.whisper_endpoint().unwrap_or(""),
            self.whisper_max_new_tokens,
            self.ffmpeg_bin,
        )
    }

    /// Every field that decides which vision-language model is loaded and how
    /// video is fed to it, including the transcriber it embeds with.
    pub fn qwen_fingerprint(&self) -> String {
        format!(
            "qwen3_vl:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}:{:?}:{}",
            self.qwen_model,
            self.qwen_endpoint().unwrap_or(""),
            self.qwen_device,
            self.qwen_quantization.trim().to_ascii_lowercase(),
            self.qwen_max_length,
            self.qwen_video_fps,
            self.qwen_video_max_frames,
            self.qwen_video_target_frames,
            self.extractor_policy().as_str(),
            non_empty(&self.qwen_video_reader).unwrap_or(""),
            self.cleanup_policy().as_str(),
            self.transcribe_enabled,
            self.ffprobe_bin,
            self.transcriber_fingerprint(),
        )
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Numeric environment values arrive typed when they parse and as strings
/// when they don't, so an empty `KEY=` reaches here as `""`.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Raw::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|err| serde::de::Error::custom(format!("{text:?}: {err}"))),
    }
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("priv/static/uploads")
}

fn default_backend() -> String {
    "deterministic".to_string()
}

fn default_dims() -> usize {
    64
}

fn default_qwen_model() -> String {
    "Qwen/Qwen3-VL-Embedding-2B".to_string()
}

fn default_device() -> String {
    "auto".to_string()
}

fn default_max_length() -> usize {
    8192
}

fn default_quantization() -> String {
    "none".to_string()
}

fn default_batch_size() -> usize {
    1
}

fn default_video_fps() -> f64 {
    1.0
}

fn default_video_max_frames() -> usize {
    64
}

fn default_video_target_frames() -> i64 {
    10
}

fn default_auto() -> String {
    "auto".to_string()
}

fn default_true() -> bool {
    true
}

fn default_whisper_backend() -> String {
    "openai".to_string()
}

fn default_whisper_model() -> String {
    "small".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        Settings::from_pairs(pairs.iter().copied()).unwrap()
    }

    #[test]
    fn defaults_without_any_keys() {
        let cfg = settings(&[]);
        assert_eq!(cfg.embedding_backend, "deterministic");
        assert_eq!(cfg.embedding_dims, 64);
        assert_eq!(cfg.qwen_max_length, 8192);
        assert_eq!(cfg.qwen_video_target_frames, 10);
        assert_eq!(cfg.quantization().unwrap(), Quantization::None);
        assert!(cfg.transcribe_enabled);
        assert!(cfg.uploads_dir.is_absolute());
        assert!(cfg.uploads_dir.ends_with("priv/static/uploads"));
    }

    #[test]
    fn typed_values_are_parsed() {
        let cfg = settings(&[
            ("EMBEDDING_DIMS", "8"),
            ("QWEN_VIDEO_FPS", "0.5"),
            ("QWEN_VIDEO_TARGET_FRAMES", "-1"),
            ("QWEN_QUANTIZATION", "int4"),
            ("TRANSCRIBE_ENABLED", "false"),
            ("WHISPER_MAX_NEW_TOKENS", "128"),
        ]);
        assert_eq!(cfg.embedding_dims, 8);
        assert_eq!(cfg.qwen_video_fps, 0.5);
        assert_eq!(cfg.qwen_video_target_frames, -1);
        assert_eq!(cfg.quantization().unwrap(), Quantization::Int4);
        assert!(!cfg.transcribe_enabled);
        assert_eq!(cfg.whisper_max_new_tokens, Some(128));
    }

    #[test]
    fn invalid_quantization_is_rejected_at_load() {
        let err = Settings::from_pairs([("QWEN_QUANTIZATION", "fp3")]).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { key: "QWEN_QUANTIZATION", .. }));
    }

    #[test]
    fn invalid_reader_is_rejected_at_load() {
        assert!(Settings::from_pairs([("QWEN_VIDEO_READER", "opencv")]).is_err());
        let cfg = settings(&[("QWEN_VIDEO_READER", "decord")]);
        assert_eq!(cfg.video_reader().unwrap(), Some(VideoReader::Decord));
    }

    #[test]
    fn unknown_backend_loads_but_does_not_resolve() {
        let cfg = settings(&[("EMBEDDING_BACKEND", "nope")]);
        assert!(matches!(cfg.backend_kind(), Err(EmbedError::NotImplemented(_))));
    }

    #[test]
    fn policies_parse_permissively() {
        let cfg = settings(&[("MODEL_CLEANUP", "yes"), ("QWEN_VIDEO_FRAME_EXTRACTOR", "native")]);
        assert_eq!(cfg.cleanup_policy(), CleanupPolicy::Always);
        assert_eq!(cfg.extractor_policy(), ExtractorPolicy::Never);
    }

    #[test]
    fn fingerprint_tracks_model_identity() {
        let base = settings(&[("EMBEDDING_BACKEND", "qwen3_vl")]);
        let same = settings(&[("EMBEDDING_BACKEND", "qwen3_vl")]);
        let other = settings(&[("EMBEDDING_BACKEND", "qwen3_vl"), ("QWEN_DEVICE", "cuda")]);
        let whisper = settings(&[("EMBEDDING_BACKEND", "qwen3_vl"), ("WHISPER_MODEL", "large-v3")]);
        assert_eq!(base.qwen_fingerprint(), same.qwen_fingerprint());
        assert_ne!(base.qwen_fingerprint(), other.qwen_fingerprint());
        assert_ne!(base.qwen_fingerprint(), whisper.qwen_fingerprint());
    }

    #[test]
    fn blank_optional_strings_count_as_unset() {
        let cfg = settings(&[("WHISPER_LANGUAGE", "  "), ("QWEN_ENDPOINT", "")]);
        assert_eq!(cfg.whisper_language(), None);
        assert_eq!(cfg.qwen_endpoint(), None);
    }

    #[test]
    fn blank_max_new_tokens_counts_as_unset() {
        assert_eq!(settings(&[("WHISPER_MAX_NEW_TOKENS", "")]).whisper_max_new_tokens, None);
        assert_eq!(settings(&[("WHISPER_MAX_NEW_TOKENS", "  ")]).whisper_max_new_tokens, None);
        assert_eq!(
            settings(&[("WHISPER_MAX_NEW_TOKENS", "256")]).whisper_max_new_tokens,
            Some(256)
        );
        assert!(Settings::from_pairs([("WHISPER_MAX_NEW_TOKENS", "lots")]).is_err());
    }

    #[test]
    fn zero_dims_rejected() {
        assert!(Settings::from_pairs([("EMBEDDING_DIMS", "0")]).is_err());
    }
}
