use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;

use crate::tools::{run_tool, Tool, Toolchain};
use crate::MediaError;

/// Hard bound for demuxing one audio track.
pub const DEMUX_TIMEOUT: Duration = Duration::from_secs(120);

/// Extensions handed to speech models as-is.
pub const AUDIO_EXTENSIONS: [&str; 9] = ["wav", "mp3", "flac", "m4a", "aac", "ogg", "oga", "opus", "wma"];

pub fn is_audio_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Does ffmpeg's stderr say the input simply has no audio to extract?
pub fn reports_missing_audio(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("does not contain any stream")
        || lower.contains("matches no streams")
        || lower.contains("no audio stream")
}

/// Pulls a mono 16 kHz PCM WAV track out of an arbitrary container.
#[derive(Debug, Clone)]
pub struct AudioDemuxer {
    ffmpeg: Option<PathBuf>,
    timeout: Duration,
}

impl AudioDemuxer {
    pub fn new(toolchain: &Toolchain) -> Self {
        Self {
            ffmpeg: toolchain.ffmpeg().map(Path::to_path_buf),
            timeout: DEMUX_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extract the audio track into a temporary WAV file.
    ///
    /// `Ok(None)` means the source has no audio stream. The returned file is
    /// deleted when dropped, and on every error path before that.
    pub async fn extract_wav(&self, source: &Path) -> Result<Option<NamedTempFile>, MediaError> {
        let bin = self
            .ffmpeg
            .as_deref()
            .ok_or(MediaError::ToolMissing(Tool::Ffmpeg))?;

        let wav = tempfile::Builder::new()
            .prefix("embed-audio-")
            .suffix(".wav")
            .tempfile()?;

        let output = run_tool(Tool::Ffmpeg, bin, demux_args(source, wav.path()), self.timeout).await?;
        if output.status.success() {
            return Ok(Some(wav));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if reports_missing_audio(&stderr) {
            tracing::info!(path = %source.display(), "source has no audio stream");
            return Ok(None);
        }

        Err(MediaError::ToolFailed {
            tool: Tool::Ffmpeg,
            stderr: stderr.trim().to_string(),
        })
    }
}

pub fn demux_args(source: &Path, target: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-nostdin", "-hide_banner", "-loglevel", "error", "-y", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(source.as_os_str().to_owned());
    args.extend(
        ["-vn", "-ac", "1", "-ar", "16000", "-acodec", "pcm_s16le", "-f", "wav"]
            .into_iter()
            .map(OsString::from),
    );
    args.push(target.as_os_str().to_owned());
    args
}
