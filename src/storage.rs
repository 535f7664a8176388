use std::path::{Path, PathBuf};

use thiserror::Error;

/// Why a storage key was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StorageKeyError {
    #[error("missing_storage_key")]
    Missing,
    #[error("invalid_storage_key")]
    Invalid,
}

impl StorageKeyError {
    pub fn code(self) -> &'static str {
        match self {
            StorageKeyError::Missing => "missing_storage_key",
            StorageKeyError::Invalid => "invalid_storage_key",
        }
    }
}

/// Map an upload storage key to a path directly under `uploads_dir`.
///
/// Keys are single path components: separators and `..` are refused outright
/// rather than normalized away.
pub fn resolve_storage_key(uploads_dir: &Path, key: &str) -> Result<PathBuf, StorageKeyError> {
    if key.trim().is_empty() {
        return Err(StorageKeyError::Missing);
    }
    if key.contains('/') || key.contains('\\') || key.contains("..") {
        return Err(StorageKeyError::Invalid);
    }
    Ok(uploads_dir.join(key))
}
