//! Prepared-artifact cache
//!
//! Reads are soft: a missing or unparsable artifact is a miss, never an
//! error, so a partial file left by an aborted push only costs a
//! rebuild. Writes go through a temp file in the target directory and a
//! rename, so readers never observe partial content.

use crate::error::{SkiffError, SkiffResult};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;

/// Read a cached JSON artifact; any failure is a miss
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) => {
            debug!("Cache miss for {}: {e}", path.display());
            return None;
        }
    };
    match serde_json::from_slice(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Cache miss for {} (unparsable): {e}", path.display());
            None
        }
    }
}

/// Read a cached artifact's raw bytes; any failure is a miss
pub async fn read_bytes(path: &Path) -> Option<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(content) => Some(content),
        Err(e) => {
            debug!("Cache miss for {}: {e}", path.display());
            None
        }
    }
}

/// Persist an artifact atomically (write to temp file, then rename)
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> SkiffResult<()> {
    let path = path.to_path_buf();
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || {
        let dir = path
            .parent()
            .ok_or_else(|| SkiffError::Internal(format!("no parent for {}", path.display())))?;
        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| SkiffError::io(format!("creating temp file in {}", dir.display()), e))?;
        std::io::Write::write_all(&mut temp, &bytes)
            .map_err(|e| SkiffError::io(format!("writing {}", path.display()), e))?;
        temp.persist(&path)
            .map_err(|e| SkiffError::io(format!("renaming into {}", path.display()), e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| SkiffError::Internal(format!("write task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let result: Option<Value> = read_json(&temp.path().join("absent.json")).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn unparsable_file_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.json");
        tokio::fs::write(&path, b"{truncated").await.unwrap();

        let result: Option<Value> = read_json(&path).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");

        write_atomic(&path, br#"{"ok": true}"#).await.unwrap();

        let value: Value = read_json(&path).await.unwrap();
        assert_eq!(value["ok"], Value::Bool(true));
        assert_eq!(read_bytes(&path).await.unwrap(), br#"{"ok": true}"#);
    }

    #[tokio::test]
    async fn write_atomic_replaces_existing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");

        write_atomic(&path, b"1").await.unwrap();
        write_atomic(&path, b"2").await.unwrap();

        assert_eq!(read_bytes(&path).await.unwrap(), b"2");
        // No stray temp files left behind
        let entries: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
