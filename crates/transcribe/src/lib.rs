//! Speech-to-text for the embedding worker.
//!
//! [`Transcriber`] owns the media side (demuxing to WAV, cleanup of the
//! temporary file) and the decoding policy (precision, long-form retry,
//! generation budget). The model itself sits behind [`SpeechModel`].

pub mod backend;
pub mod budget;
pub mod error;
pub mod model;
pub mod remote;
pub mod transcriber;

pub use crate::backend::SpeechBackend;
pub use crate::budget::{generation_budget, GenerationLimits};
pub use crate::error::{SpeechError, SpeechErrorKind, TranscribeError};
pub use crate::model::{SpeechModel, SpeechRequest};
pub use crate::remote::RemoteSpeechModel;
pub use crate::transcriber::{collapse_whitespace, Transcriber, TranscriberOptions};
