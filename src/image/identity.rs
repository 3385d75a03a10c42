//! Image identity resolution
//!
//! The artifact cache is keyed by a stable image identity: the version
//! control hash of the image directory when one is recorded, otherwise
//! a reference-derived identifier.

use crate::image::reference::Reference;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Resolve the identity for an unpacked image directory.
///
/// Never fails: a missing or errored `git` lookup falls back to the
/// reference-derived id.
pub async fn resolve(image_dir: &Path, reference: &Reference) -> String {
    match git_head(image_dir).await {
        Some(hash) => {
            debug!("Image identity from git: {hash}");
            hash
        }
        None => {
            let id = reference.path_id();
            debug!("Image identity from reference: {id}");
            id
        }
    }
}

/// Ask git for the HEAD commit of the image directory, if it is tracked
async fn git_head(dir: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["-C"])
        .arg(dir)
        .args(["rev-parse", "HEAD"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let valid = hash.len() == 40 && hash.chars().all(|c| c.is_ascii_hexdigit());
    valid.then_some(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn untracked_dir_falls_back_to_reference() {
        let temp = TempDir::new().unwrap();
        let reference = Reference::parse("localhost:5000/app:v1").unwrap();

        let id = resolve(temp.path(), &reference).await;
        assert_eq!(id, reference.path_id());
    }

    #[tokio::test]
    async fn identity_is_stable() {
        let temp = TempDir::new().unwrap();
        let reference = Reference::parse("localhost:5000/app:v1").unwrap();

        let a = resolve(temp.path(), &reference).await;
        let b = resolve(temp.path(), &reference).await;
        assert_eq!(a, b);
    }
}
