//! Unpacked image representation
//!
//! An unpacked image is a directory holding a `metadata.json` file and
//! either ordered `layers/<NN>/` subdirectories (bottom layer first) or
//! a single `rootfs/` directory treated as one layer.

use crate::error::{SkiffError, SkiffResult};
use crate::image::reference::Reference;
use crate::oci::types::HistoryEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Image metadata loaded from `metadata.json`
///
/// Both sections default so a bare rootfs directory stays pushable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Environment mapping; sorted key order makes the rendered
    /// "KEY=VALUE" list deterministic
    pub env: BTreeMap<String, String>,

    /// Layer history entries
    pub history: Vec<HistoryEntry>,
}

/// An unpacked image on disk
#[derive(Debug, Clone)]
pub struct UnpackedImage {
    /// The reference this image was unpacked from
    pub reference: Reference,
    /// Image directory
    pub path: PathBuf,
}

impl UnpackedImage {
    /// Open an unpacked image, resolving its directory from an explicit
    /// override or the storage root.
    pub fn open(
        reference: Reference,
        path_override: Option<&Path>,
        storage_root: &Path,
    ) -> SkiffResult<Self> {
        let path = match path_override {
            Some(p) => p.to_path_buf(),
            None => storage_root.join("images").join(reference.path_id()),
        };

        let image = Self { reference, path };
        if !image.path.is_dir() || image.layer_dirs().is_empty() {
            return Err(SkiffError::NotAnImage { path: image.path });
        }
        Ok(image)
    }

    /// Path of the metadata file
    pub fn metadata_path(&self) -> PathBuf {
        self.path.join("metadata.json")
    }

    /// Ordered layer directories, bottom layer first.
    ///
    /// `layers/<NN>/` subdirectories sorted by name, or a single
    /// `rootfs/` directory. Empty when neither exists.
    pub fn layer_dirs(&self) -> Vec<PathBuf> {
        let layers_dir = self.path.join("layers");
        if layers_dir.is_dir() {
            let mut dirs: Vec<PathBuf> = std::fs::read_dir(&layers_dir)
                .into_iter()
                .flatten()
                .flatten()
                .map(|entry| entry.path())
                .filter(|p| p.is_dir())
                .collect();
            dirs.sort();
            return dirs;
        }

        let rootfs = self.path.join("rootfs");
        if rootfs.is_dir() {
            return vec![rootfs];
        }
        Vec::new()
    }

    /// Load image metadata.
    ///
    /// A missing file yields defaults; unparsable content is fatal. An
    /// empty history gains one synthetic non-empty entry so the history
    /// normalization invariant can always be satisfied.
    pub async fn load_metadata(&self) -> SkiffResult<Metadata> {
        let path = self.metadata_path();
        let mut metadata = if path.exists() {
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| SkiffError::io(format!("reading {}", path.display()), e))?;
            serde_json::from_str(&content).map_err(|e| SkiffError::MetadataInvalid {
                path: path.clone(),
                reason: e.to_string(),
            })?
        } else {
            debug!("No metadata.json, using defaults");
            Metadata::default()
        };

        if metadata.history.is_empty() {
            metadata.history.push(HistoryEntry {
                created_by: Some("skiff import".to_string()),
                ..Default::default()
            });
        }
        Ok(metadata)
    }

    /// Write one tarball per layer into `dest_dir`, bottom layer first.
    ///
    /// Entries are appended in sorted path order and owner ids are
    /// zeroed, so the same layer content produces the same archive.
    pub async fn write_layer_tarballs(&self, dest_dir: &Path) -> SkiffResult<Vec<PathBuf>> {
        let run_id = uuid::Uuid::new_v4();
        let mut tarballs = Vec::new();

        for (i, layer_dir) in self.layer_dirs().into_iter().enumerate() {
            let tar_path = dest_dir.join(format!("{run_id}-{i:02}.tar"));
            debug!(
                "Writing layer tarball {} from {}",
                tar_path.display(),
                layer_dir.display()
            );

            let src = layer_dir.clone();
            let dest = tar_path.clone();
            tokio::task::spawn_blocking(move || write_tarball(&src, &dest))
                .await
                .map_err(|e| SkiffError::Internal(format!("tarball task failed: {e}")))??;

            tarballs.push(tar_path);
        }
        Ok(tarballs)
    }
}

/// Build a deterministic tar archive of `src` rooted at `.`
fn write_tarball(src: &Path, dest: &Path) -> SkiffResult<()> {
    let file = std::fs::File::create(dest)
        .map_err(|e| SkiffError::io(format!("creating {}", dest.display()), e))?;
    let mut builder = tar::Builder::new(file);
    builder.follow_symlinks(false);
    // Deterministic headers: zeroed owner ids and fixed mtime
    builder.mode(tar::HeaderMode::Deterministic);

    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| SkiffError::io("walking layer directory", e.into()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| SkiffError::Internal(format!("path outside layer root: {e}")))?
            .to_path_buf();

        builder
            .append_path_with_name(entry.path(), &rel)
            .map_err(|e| SkiffError::io(format!("archiving {}", rel.display()), e))?;
    }

    builder
        .into_inner()
        .map_err(|e| SkiffError::io(format!("finishing {}", dest.display()), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_image(dir: &Path, layers: &[&str]) -> UnpackedImage {
        for (i, content) in layers.iter().enumerate() {
            let layer = dir.join("layers").join(format!("{i:02}"));
            std::fs::create_dir_all(layer.join("etc")).unwrap();
            std::fs::write(layer.join("etc").join("data"), content).unwrap();
        }
        UnpackedImage {
            reference: Reference::parse("localhost:5000/test:latest").unwrap(),
            path: dir.to_path_buf(),
        }
    }

    #[test]
    fn open_missing_dir_is_not_an_image() {
        let temp = TempDir::new().unwrap();
        let reference = Reference::parse("localhost:5000/test:latest").unwrap();
        let result = UnpackedImage::open(
            reference,
            Some(&temp.path().join("nope")),
            temp.path(),
        );
        assert!(matches!(result, Err(SkiffError::NotAnImage { .. })));
    }

    #[test]
    fn open_empty_dir_is_not_an_image() {
        let temp = TempDir::new().unwrap();
        let reference = Reference::parse("localhost:5000/test:latest").unwrap();
        let result = UnpackedImage::open(reference, Some(temp.path()), temp.path());
        assert!(matches!(result, Err(SkiffError::NotAnImage { .. })));
    }

    #[test]
    fn layer_dirs_ordered_bottom_first() {
        let temp = TempDir::new().unwrap();
        let image = make_image(temp.path(), &["bottom", "middle", "top"]);

        let dirs = image.layer_dirs();
        assert_eq!(dirs.len(), 3);
        assert!(dirs[0].ends_with("00"));
        assert!(dirs[2].ends_with("02"));
    }

    #[test]
    fn rootfs_counts_as_single_layer() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("rootfs").join("bin")).unwrap();
        let reference = Reference::parse("localhost:5000/test:latest").unwrap();

        let image = UnpackedImage::open(reference, Some(temp.path()), temp.path()).unwrap();
        assert_eq!(image.layer_dirs().len(), 1);
    }

    #[tokio::test]
    async fn metadata_defaults_when_missing() {
        let temp = TempDir::new().unwrap();
        let image = make_image(temp.path(), &["x"]);

        let metadata = image.load_metadata().await.unwrap();
        assert!(metadata.env.is_empty());
        // Synthetic entry keeps the history invariant satisfiable
        assert_eq!(metadata.history.len(), 1);
        assert!(metadata.history[0].is_non_empty());
    }

    #[tokio::test]
    async fn metadata_parse_failure_is_fatal() {
        let temp = TempDir::new().unwrap();
        let image = make_image(temp.path(), &["x"]);
        std::fs::write(image.metadata_path(), "{broken").unwrap();

        let result = image.load_metadata().await;
        assert!(matches!(result, Err(SkiffError::MetadataInvalid { .. })));
    }

    #[tokio::test]
    async fn metadata_loads_env_and_history() {
        let temp = TempDir::new().unwrap();
        let image = make_image(temp.path(), &["x"]);
        std::fs::write(
            image.metadata_path(),
            r#"{
              "env": {"PATH": "/usr/bin", "HOME": "/root"},
              "history": [
                {"created_by": "FROM scratch", "empty_layer": true},
                {"created_by": "COPY /"}
              ]
            }"#,
        )
        .unwrap();

        let metadata = image.load_metadata().await.unwrap();
        assert_eq!(metadata.env.len(), 2);
        assert_eq!(metadata.history.len(), 2);
        // BTreeMap iterates in key order
        let keys: Vec<&String> = metadata.env.keys().collect();
        assert_eq!(keys, ["HOME", "PATH"]);
    }

    #[tokio::test]
    async fn tarballs_written_per_layer_in_order() {
        let temp = TempDir::new().unwrap();
        let image = make_image(temp.path(), &["bottom", "top"]);
        let out = TempDir::new().unwrap();

        let tarballs = image.write_layer_tarballs(out.path()).await.unwrap();
        assert_eq!(tarballs.len(), 2);
        for path in &tarballs {
            assert!(path.exists());
        }
        // Names carry the layer index, bottom first
        assert!(tarballs[0].to_string_lossy().ends_with("-00.tar"));
        assert!(tarballs[1].to_string_lossy().ends_with("-01.tar"));
    }

    #[tokio::test]
    async fn tarball_content_is_deterministic() {
        let temp = TempDir::new().unwrap();
        let image = make_image(temp.path(), &["same"]);
        let out = TempDir::new().unwrap();

        let first = image.write_layer_tarballs(out.path()).await.unwrap();
        let second = image.write_layer_tarballs(out.path()).await.unwrap();

        let a = std::fs::read(&first[0]).unwrap();
        let b = std::fs::read(&second[0]).unwrap();
        assert_eq!(a, b);
    }
}
