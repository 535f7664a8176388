use media::{MediaError, Tool};
use thiserror::Error;

/// Coarse class of a failure reported by the speech runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechErrorKind {
    /// Argument validation failed inside the model library.
    Value,
    Runtime,
    /// The runtime lacks a library needed to load the model.
    MissingDependency,
    Other,
}

impl SpeechErrorKind {
    /// Map the runtime's exception class name onto a kind.
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "ValueError" => Self::Value,
            "RuntimeError" => Self::Runtime,
            "ModuleNotFoundError" | "ImportError" => Self::MissingDependency,
            _ => Self::Other,
        }
    }
}

/// Error returned by a [`SpeechModel`](crate::SpeechModel) call.
///
/// The message text is kept verbatim: it is the only channel through which
/// the model library reports conditions such as the long-form timestamp
/// requirement.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SpeechError {
    pub kind: SpeechErrorKind,
    pub message: String,
}

impl SpeechError {
    pub fn new(kind: SpeechErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Audio longer than one window switches the pipeline to long-form
    /// generation, which refuses to run without timestamp tokens.
    pub fn requires_timestamps(&self) -> bool {
        self.kind == SpeechErrorKind::Value
            && self.message.contains("return_timestamps")
            && self.message.contains("long-form generation")
    }
}

#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("unknown speech backend: {0}")]
    NotImplemented(String),
    #[error("speech backend dependencies missing: {0}")]
    DependenciesMissing(String),
    #[error("{0} not found")]
    ToolMissing(Tool),
    #[error("audio extraction failed: {0}")]
    Media(MediaError),
    #[error("speech model failed: {0}")]
    Model(SpeechError),
}

impl From<MediaError> for TranscribeError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::ToolMissing(tool) => TranscribeError::ToolMissing(tool),
            other => TranscribeError::Media(other),
        }
    }
}

impl From<SpeechError> for TranscribeError {
    fn from(err: SpeechError) -> Self {
        match err.kind {
            SpeechErrorKind::MissingDependency => TranscribeError::DependenciesMissing(err.message),
            _ => TranscribeError::Model(err),
        }
    }
}
