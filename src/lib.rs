//! Workspace umbrella crate for the embedding worker.
//!
//! Stitches the stage crates together: [`Settings`] describes the deployment,
//! [`BackendSelector`] turns settings into cached model instances, and
//! [`resolve_storage_key`] confines request paths to the upload directory.
//! The HTTP surface lives in the `embed-server` crate.

pub mod config;
pub mod selector;
pub mod storage;

pub use crate::config::{Settings, SettingsError};
pub use crate::selector::{BackendSelector, FingerprintSlot};
pub use crate::storage::{resolve_storage_key, StorageKeyError};

pub use media::{
    compute_sampling_params, downsample_frames, is_audio_path, normalize_frame_sizes,
    normalize_frame_sizes_blocking, AudioDemuxer, Frame, FrameExtractor, MediaError,
    SamplingParams, Tool, ToolOverrides, Toolchain, VideoProbe,
};
pub use semantic::{
    process_with_adaptive_frames, reduce_max_frames, Backend, BackendKind, CleanupPolicy,
    DeterministicBackend, EmbedError, Embedder, EmbeddingRequest, EmbeddingResult,
    ExtractorPolicy, InputMismatch, ModelError, ModelErrorKind, ModelInputs, ModelOutput,
    Qwen3VlBackend, Qwen3VlOptions, Quantization, TokenCounts, VideoContent, VideoInput,
    VideoReader, VisionLanguageModel, MAX_GUARDED_ATTEMPTS,
};
pub use transcribe::{
    GenerationLimits, SpeechBackend, SpeechError, SpeechErrorKind, SpeechModel, SpeechRequest,
    TranscribeError, Transcriber, TranscriberOptions,
};
