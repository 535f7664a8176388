use std::io;
use std::path::PathBuf;

use media::Tool;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use transcribe::TranscribeError;

/// Substring the model runtime emits when video frames of different sizes are stacked.
const FRAME_STACK_SIGNATURE: &str = "stack expects each tensor to be equal size";
/// Substring the processor emits when the sampled video needs more tokens than the text carries.
const VIDEO_TOKEN_SIGNATURE: &str = "Mismatch in `video` token count between text and `input_ids`";

static TOKEN_COUNTS: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"Got ids=\[(\d+)\] and text=\[(\d+)\]").ok());

/// Errors surfaced by the embedding backends.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Caller-side problem: empty text, zero dims, bad frame payload.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// Unknown backend or model family name.
    #[error("not implemented: {0}")]
    NotImplemented(String),
    /// The model runtime (or its endpoint) is not available.
    #[error("backend dependencies missing: {0}")]
    DependenciesMissing(String),
    #[error("{0} not found")]
    ExternalToolMissing(Tool),
    #[error("transcription failed: {0}")]
    Transcription(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<TranscribeError> for EmbedError {
    fn from(err: TranscribeError) -> Self {
        match err {
            TranscribeError::NotImplemented(name) => EmbedError::NotImplemented(name),
            TranscribeError::DependenciesMissing(msg) => EmbedError::DependenciesMissing(msg),
            TranscribeError::ToolMissing(tool) => EmbedError::ExternalToolMissing(tool),
            other => EmbedError::Transcription(other.to_string()),
        }
    }
}

/// Exception class reported by the model library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorKind {
    Runtime,
    Value,
    MissingDependency,
    Other,
}

impl ModelErrorKind {
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "RuntimeError" => Self::Runtime,
            "ValueError" => Self::Value,
            "ModuleNotFoundError" | "ImportError" => Self::MissingDependency,
            _ => Self::Other,
        }
    }
}

/// A failed model call, as reported at the integration boundary.
///
/// The model library only communicates recoverable input problems through
/// message text, so the message is preserved verbatim and interpreted once by
/// [`ModelError::classify`].
#[derive(Debug, Clone, Error)]
#[error("model {kind:?} error: {message}")]
pub struct ModelError {
    pub kind: ModelErrorKind,
    pub message: String,
}

/// Token counts quoted in a video-token mismatch message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCounts {
    pub ids: u64,
    pub text: u64,
}

/// An input-shape failure the adaptive loop knows how to repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMismatch {
    /// Frames of different pixel sizes could not be stacked.
    FrameSizeMismatch,
    /// The sampled video needs a different token count than the prompt holds.
    VideoTokenMismatch { counts: Option<TokenCounts> },
}

impl ModelError {
    pub fn new(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Runtime, message)
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Value, message)
    }

    /// Recognise the two repairable failure signatures. Anything else is fatal.
    pub fn classify(&self) -> Option<InputMismatch> {
        match self.kind {
            ModelErrorKind::Runtime if self.message.contains(FRAME_STACK_SIGNATURE) => {
                Some(InputMismatch::FrameSizeMismatch)
            }
            ModelErrorKind::Value if self.message.contains(VIDEO_TOKEN_SIGNATURE) => {
                Some(InputMismatch::VideoTokenMismatch {
                    counts: parse_token_counts(&self.message),
                })
            }
            _ => None,
        }
    }
}

/// Pull `(ids, text)` out of `Got ids=[N] and text=[M]`.
pub fn parse_token_counts(message: &str) -> Option<TokenCounts> {
    let captures = TOKEN_COUNTS.as_ref()?.captures(message)?;
    let ids = captures.get(1)?.as_str().parse().ok()?;
    let text = captures.get(2)?.as_str().parse().ok()?;
    Some(TokenCounts { ids, text })
}
