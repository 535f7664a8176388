//! Embedding backends for the worker.
//!
//! Two backends sit behind the [`Backend`] tagged variant:
//!
//! - [`DeterministicBackend`] hashes captions or file content. It needs no
//!   model and is what tests and local development run against.
//! - [`Qwen3VlBackend`] drives a vision-language model through the
//!   [`VisionLanguageModel`] capability. Video inputs are probed, sampled,
//!   optionally pre-extracted with ffmpeg, and pushed through
//!   [`process_with_adaptive_frames`], which repairs the two input mismatches
//!   the model reports (unequal frame sizes, video token overflow) and retries
//!   within a fixed budget.
//!
//! Final vectors are pooled at the last non-padding token and L2-normalized;
//! truncation to a smaller `dims` always re-normalizes.

pub mod adaptive;
pub mod backend;
pub mod cleanup;
pub mod conversation;
pub mod deterministic;
pub mod error;
pub mod model;
pub mod normalize;
pub mod pooling;
pub mod qwen3_vl;
pub mod remote;
pub mod types;

pub use crate::adaptive::{process_with_adaptive_frames, reduce_max_frames, MAX_GUARDED_ATTEMPTS};
pub use crate::backend::{Backend, BackendKind};
pub use crate::cleanup::{parse_flag, CleanupPolicy};
pub use crate::deterministic::DeterministicBackend;
pub use crate::error::{EmbedError, InputMismatch, ModelError, ModelErrorKind, TokenCounts};
pub use crate::model::{Embedder, VideoReader, VisionLanguageModel};
pub use crate::normalize::{fit_dims, l2_normalize_in_place};
pub use crate::qwen3_vl::{
    should_extract_frames, ExtractorPolicy, Qwen3VlBackend, Qwen3VlOptions, Quantization,
};
pub use crate::remote::{RemoteModelOptions, RemoteVisionModel};
pub use crate::types::{
    EmbeddingRequest, EmbeddingResult, ModelInputs, ModelOutput, VideoContent, VideoInput,
};
