use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::DynamicImage;

use crate::frames::normalize_frame_sizes;
use crate::tools::{run_tool, Tool, Toolchain};

/// Hard bound for grabbing a single frame.
pub const FRAME_GRAB_TIMEOUT: Duration = Duration::from_secs(30);

/// Grabs individual frames with one `ffmpeg` seek per frame.
///
/// Seeking per frame keeps memory flat regardless of clip length, which is the
/// point of extracting outside the model's own video reader.
#[derive(Debug, Clone)]
pub struct FrameExtractor {
    ffmpeg: Option<PathBuf>,
    timeout: Duration,
}

impl FrameExtractor {
    pub fn new(toolchain: &Toolchain) -> Self {
        Self {
            ffmpeg: toolchain.ffmpeg().map(Path::to_path_buf),
            timeout: FRAME_GRAB_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_available(&self) -> bool {
        self.ffmpeg.is_some()
    }

    /// Grab frame `i` at `i / fps` seconds for `i in 0..max_frames`.
    ///
    /// Failed grabs are skipped, so a partial set is a success. Returns `None`
    /// when `ffmpeg` is unavailable or nothing was captured; the caller then
    /// falls back to the model's native video reader.
    pub async fn extract(
        &self,
        video_path: &Path,
        fps: f64,
        max_frames: usize,
    ) -> Option<Vec<DynamicImage>> {
        let bin = self.ffmpeg.as_deref()?;
        if max_frames == 0 {
            return None;
        }

        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 1.0 };
        let mut encoded = Vec::with_capacity(max_frames);

        for index in 0..max_frames {
            let timestamp = index as f64 / fps;
            let output = match run_tool(Tool::Ffmpeg, bin, grab_args(video_path, timestamp), self.timeout).await {
                Ok(output) => output,
                Err(err) if err.is_tool_missing() => {
                    tracing::debug!(error = %err, "frame grabber unavailable");
                    return None;
                }
                Err(err) => {
                    tracing::debug!(index, timestamp, error = %err, "frame grab failed");
                    continue;
                }
            };

            if !output.status.success() || output.stdout.is_empty() {
                tracing::debug!(index, timestamp, status = %output.status, "frame grab produced no image");
                continue;
            }

            encoded.push((index, output.stdout));
        }

        if encoded.is_empty() {
            return None;
        }

        let grabbed = encoded.len();
        let decoded = tokio::task::spawn_blocking(move || decode_and_normalize(encoded)).await;
        match decoded {
            Ok(frames) => {
                tracing::debug!(
                    path = %video_path.display(),
                    requested = max_frames,
                    grabbed,
                    captured = frames.as_ref().map_or(0, Vec::len),
                    "extracted frames"
                );
                frames
            }
            Err(err) => {
                tracing::warn!(error = %err, "frame decode task failed");
                None
            }
        }
    }
}

/// Decode grabbed PNGs, dropping undecodable ones, then bring them to one size.
fn decode_and_normalize(encoded: Vec<(usize, Vec<u8>)>) -> Option<Vec<DynamicImage>> {
    let frames = encoded
        .into_iter()
        .filter_map(|(index, bytes)| match image::load_from_memory(&bytes) {
            Ok(frame) => Some(frame),
            Err(err) => {
                tracing::debug!(index, error = %err, "frame decode failed");
                None
            }
        })
        .collect();
    normalize_frame_sizes(frames)
}

/// Seek to `timestamp`, emit exactly one PNG on stdout, ignore non-video streams.
pub fn grab_args(video_path: &Path, timestamp: f64) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-ss"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(format!("{timestamp:.3}").into());
    args.push("-i".into());
    args.push(video_path.as_os_str().to_owned());
    args.extend(
        [
            "-an", "-sn", "-dn", "-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "pipe:1",
        ]
        .into_iter()
        .map(OsString::from),
    );
    args
}
