use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::tools::{run_tool, Tool, Toolchain};

/// Hard bound for a single `ffprobe` invocation.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Reads container duration through `ffprobe`.
///
/// Every failure mode (binary absent, file absent, non-zero exit, garbage output,
/// non-positive duration) collapses to `None`; callers treat that as "unknown".
#[derive(Debug, Clone)]
pub struct VideoProbe {
    ffprobe: Option<PathBuf>,
    timeout: Duration,
}

impl VideoProbe {
    pub fn new(toolchain: &Toolchain) -> Self {
        Self {
            ffprobe: toolchain.ffprobe().map(Path::to_path_buf),
            timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn duration_seconds(&self, path: &Path) -> Option<f64> {
        let bin = self.ffprobe.as_deref()?;
        if !matches!(tokio::fs::try_exists(path).await, Ok(true)) {
            return None;
        }

        let args: [&OsStr; 7] = [
            OsStr::new("-v"),
            OsStr::new("error"),
            OsStr::new("-show_entries"),
            OsStr::new("format=duration"),
            OsStr::new("-of"),
            OsStr::new("default=nk=1:nw=1"),
            path.as_os_str(),
        ];

        let output = match run_tool(Tool::Ffprobe, bin, args, self.timeout).await {
            Ok(output) => output,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "duration probe failed");
                return None;
            }
        };

        if !output.status.success() {
            tracing::debug!(path = %path.display(), status = %output.status, "ffprobe exited non-zero");
            return None;
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse the bare `format=duration` value ffprobe prints.
pub fn parse_duration(raw: &str) -> Option<f64> {
    let duration: f64 = raw.trim().parse().ok()?;
    (duration.is_finite() && duration > 0.0).then_some(duration)
}
