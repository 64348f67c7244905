//! Scratch-file helpers for converted artifacts.

use crate::domain::error::{BridgeError, Result};
use std::path::{Path, PathBuf};

/// Pick a scratch path for a converted artifact in the OS temp directory,
/// shaped `querycraft_<stem>_<millis>.djson`.
pub fn scratch_djson_path(input: Option<&Path>) -> PathBuf {
    let stem = input
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let stamp = chrono::Utc::now().timestamp_millis();
    std::env::temp_dir().join(format!("querycraft_{}_{}.djson", stem, stamp))
}

/// Remove a scratch file; a file that is already gone counts as success.
pub async fn remove_file_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BridgeError::IoError(format!(
            "failed to remove {}: {}",
            path.display(),
            e
        ))),
    }
}

pub async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

pub async fn file_size(path: &Path) -> Result<u64> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| BridgeError::IoError(format!("failed to stat {}: {}", path.display(), e)))?;
    Ok(meta.len())
}
