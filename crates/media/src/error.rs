use std::io;
use thiserror::Error;

use crate::tools::Tool;

/// Errors surfaced by the external-tool helpers.
///
/// Most media operations fail soft (probe returns `None`, a failed frame grab is
/// skipped), so only the audio demuxer and callers that must distinguish a missing
/// binary from a generic failure ever see these.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The binary could not be located or spawned.
    #[error("{0} not found")]
    ToolMissing(Tool),
    /// The process did not finish within its time bound and was killed.
    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: Tool, secs: u64 },
    /// The process exited non-zero for a reason we do not recover from.
    #[error("{tool} failed: {stderr}")]
    ToolFailed { tool: Tool, stderr: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl MediaError {
    /// True when the failure is "binary absent" rather than a runtime failure.
    pub fn is_tool_missing(&self) -> bool {
        matches!(self, MediaError::ToolMissing(_))
    }
}
