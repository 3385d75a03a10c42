//! Store layout
//!
//! Typed path derivation over the storage root. The upload area holds
//! raw layer tarballs during preparation, content-addressed compressed
//! blobs, and cached manifest/config documents.

use crate::error::{SkiffError, SkiffResult};
use std::path::{Path, PathBuf};

/// Path derivation for the local store
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    /// Create a layout rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The storage root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of unpacked images
    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    /// The upload area
    pub fn upload_dir(&self) -> PathBuf {
        self.root.join("upload")
    }

    /// Cached manifest document for an image identity
    pub fn manifest_path(&self, id: &str) -> PathBuf {
        self.upload_dir().join(format!("{id}.manifest.json"))
    }

    /// Cached config document for an image identity
    pub fn config_path(&self, id: &str) -> PathBuf {
        self.upload_dir().join(format!("{id}.config.json"))
    }

    /// Content-addressed compressed layer blob.
    ///
    /// Addressed purely by compressed digest, independent of any image
    /// identity. `digest` is the `sha256:<hex>` form; the filename uses
    /// the bare hex.
    pub fn blob_path(&self, digest: &str) -> PathBuf {
        let hex = digest.strip_prefix("sha256:").unwrap_or(digest);
        self.upload_dir().join(format!("{hex}.tar.gz"))
    }

    /// Create the upload area if needed
    pub async fn ensure_upload_dir(&self) -> SkiffResult<PathBuf> {
        let dir = self.upload_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SkiffError::io(format!("creating {}", dir.display()), e))?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_deterministic() {
        let layout = StoreLayout::new("/var/lib/skiff");
        assert_eq!(
            layout.manifest_path("abc"),
            PathBuf::from("/var/lib/skiff/upload/abc.manifest.json")
        );
        assert_eq!(
            layout.config_path("abc"),
            PathBuf::from("/var/lib/skiff/upload/abc.config.json")
        );
    }

    #[test]
    fn blob_path_strips_digest_prefix() {
        let layout = StoreLayout::new("/var/lib/skiff");
        let with_prefix = layout.blob_path("sha256:deadbeef");
        let bare = layout.blob_path("deadbeef");
        assert_eq!(with_prefix, bare);
        assert!(with_prefix.ends_with("deadbeef.tar.gz"));
    }

    #[tokio::test]
    async fn ensure_upload_dir_creates() {
        let temp = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(temp.path().join("store"));
        let dir = layout.ensure_upload_dir().await.unwrap();
        assert!(dir.is_dir());
    }
}
