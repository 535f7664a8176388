use std::ffi::OsStr;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;

use crate::MediaError;

/// Locations checked after `PATH` when no override is configured.
const FALLBACK_DIRS: [&str; 2] = ["/opt/homebrew/bin", "/usr/local/bin"];

/// External binaries the worker shells out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
}

impl Tool {
    pub fn binary_name(self) -> &'static str {
        match self {
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// Explicit binary locations from configuration (`FFMPEG_BIN` / `FFPROBE_BIN`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOverrides {
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
}

/// Resolved binary locations. Resolution happens once; a `None` entry means the
/// tool is unavailable and every caller degrades accordingly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Toolchain {
    ffmpeg: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
}

impl Toolchain {
    /// Resolve both binaries: override first, then `PATH`, then well-known prefixes.
    /// `ffprobe` additionally looks next to an overridden `ffmpeg`.
    pub fn discover(overrides: &ToolOverrides) -> Self {
        let ffmpeg = overrides
            .ffmpeg
            .clone()
            .or_else(|| find_on_path(Tool::Ffmpeg.binary_name()))
            .or_else(|| find_in_fallback_dirs(Tool::Ffmpeg.binary_name()));

        let ffprobe = overrides
            .ffprobe
            .clone()
            .or_else(|| find_on_path(Tool::Ffprobe.binary_name()))
            .or_else(|| {
                overrides
                    .ffmpeg
                    .as_deref()
                    .map(|bin| bin.with_file_name(Tool::Ffprobe.binary_name()))
                    .filter(|candidate| candidate.exists())
            })
            .or_else(|| find_in_fallback_dirs(Tool::Ffprobe.binary_name()));

        tracing::debug!(?ffmpeg, ?ffprobe, "resolved media toolchain");
        Self { ffmpeg, ffprobe }
    }

    /// Use exactly these locations, no discovery.
    pub fn with_paths(ffmpeg: Option<PathBuf>, ffprobe: Option<PathBuf>) -> Self {
        Self { ffmpeg, ffprobe }
    }

    pub fn ffmpeg(&self) -> Option<&Path> {
        self.ffmpeg.as_deref()
    }

    pub fn ffprobe(&self) -> Option<&Path> {
        self.ffprobe.as_deref()
    }
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn find_in_fallback_dirs(name: &str) -> Option<PathBuf> {
    FALLBACK_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(name))
        .find(|candidate| candidate.exists())
}

/// Spawn `bin` with `args`, capture stdout/stderr and kill the child if it outlives `timeout`.
pub(crate) async fn run_tool<I, S>(
    tool: Tool,
    bin: &Path,
    args: I,
    timeout: Duration,
) -> Result<Output, MediaError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let child = Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                MediaError::ToolMissing(tool)
            }
            _ => MediaError::Io(err),
        })?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => Ok(output?),
        Err(_) => Err(MediaError::Timeout {
            tool,
            secs: timeout.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win_over_discovery() {
        let overrides = ToolOverrides {
            ffmpeg: Some(PathBuf::from("/custom/ffmpeg")),
            ffprobe: Some(PathBuf::from("/custom/ffprobe")),
        };
        let chain = Toolchain::discover(&overrides);
        assert_eq!(chain.ffmpeg(), Some(Path::new("/custom/ffmpeg")));
        assert_eq!(chain.ffprobe(), Some(Path::new("/custom/ffprobe")));
    }

    #[test]
    fn with_paths_skips_discovery() {
        let chain = Toolchain::with_paths(None, None);
        assert!(chain.ffmpeg().is_none());
        assert!(chain.ffprobe().is_none());
    }

    #[test]
    fn tool_display_matches_binary() {
        assert_eq!(Tool::Ffmpeg.to_string(), "ffmpeg");
        assert_eq!(Tool::Ffprobe.to_string(), "ffprobe");
    }

    #[tokio::test]
    async fn missing_binary_maps_to_tool_missing() {
        let err = run_tool(
            Tool::Ffprobe,
            Path::new("/definitely/not/here/ffprobe"),
            ["-version"],
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(err.is_tool_missing());
    }
}
