//! Media plumbing for the embedding worker.
//!
//! Everything here shells out to `ffprobe`/`ffmpeg` with a hard per-process time
//! bound, and almost everything fails soft: a probe that cannot read a duration
//! reports "unknown", a frame grab that fails is skipped. Only the audio demuxer
//! surfaces errors, because "ffmpeg is missing" must reach the API as its own
//! status.
//!
//! - [`VideoProbe`] reads container duration.
//! - [`compute_sampling_params`] turns duration + configuration into `fps`/`max_frames`.
//! - [`FrameExtractor`] grabs frames one seek at a time and decodes them.
//! - [`normalize_frame_sizes`] letterboxes mixed-size frames to the majority size.
//! - [`downsample_frames`] thins an already-decoded frame list.
//! - [`AudioDemuxer`] pulls a mono 16 kHz WAV track for speech models.

pub mod audio;
pub mod error;
pub mod extract;
pub mod frames;
pub mod probe;
pub mod sampling;
pub mod tools;

pub use crate::audio::{is_audio_path, reports_missing_audio, AudioDemuxer};
pub use crate::error::MediaError;
pub use crate::extract::FrameExtractor;
pub use crate::frames::{
    canonical_size, downsample_frames, normalize_frame_sizes, normalize_frame_sizes_blocking,
};
pub use crate::probe::VideoProbe;
pub use crate::sampling::{compute_sampling_params, SamplingParams};
pub use crate::tools::{Tool, ToolOverrides, Toolchain};

/// Decoded frames are plain `image` buffers.
pub use image::DynamicImage as Frame;
