//! Layer preparation
//!
//! Turns raw per-layer tarballs into content-addressed gzip blobs. One
//! streaming pass computes the uncompressed digest (the diff ID) while
//! compressing and digesting the output, then the blob is renamed to
//! its content-addressed path.
//!
//! Compression is fixed at maximum level with no embedded filename and
//! a zeroed timestamp, so identical content always produces an
//! identical compressed digest. The cache and registry dedup depend on
//! this.

use crate::error::{SkiffError, SkiffResult};
use crate::store::StoreLayout;
use flate2::{Compression, GzBuilder};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A prepared layer blob
#[derive(Debug, Clone)]
pub struct LayerArtifact {
    /// Digest of the uncompressed tarball ("sha256:<hex>")
    pub diff_id: String,
    /// Digest of the compressed blob ("sha256:<hex>")
    pub digest: String,
    /// Content-addressed blob location
    pub path: PathBuf,
    /// Compressed size in bytes
    pub size: u64,
}

/// Prepare all layers, bottom first.
///
/// Layers are independent, so each runs on the blocking pool; the
/// returned list preserves the input order.
pub async fn prepare_layers(
    tarballs: Vec<PathBuf>,
    layout: &StoreLayout,
) -> SkiffResult<Vec<LayerArtifact>> {
    let total = tarballs.len();
    let mut tasks = Vec::with_capacity(total);

    for (i, tarball) in tarballs.into_iter().enumerate() {
        info!("layer {}/{}: preparing", i + 1, total);
        let layout = layout.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            prepare_one(&tarball, &layout)
        }));
    }

    let mut artifacts = Vec::with_capacity(total);
    for joined in futures_util::future::join_all(tasks).await {
        let artifact =
            joined.map_err(|e| SkiffError::Internal(format!("layer task failed: {e}")))??;
        artifacts.push(artifact);
    }
    Ok(artifacts)
}

/// Hash and compress a single raw tarball, consuming it
fn prepare_one(tarball: &Path, layout: &StoreLayout) -> SkiffResult<LayerArtifact> {
    let scratch = tarball.with_extension("tar.gz.partial");

    let mut input = std::fs::File::open(tarball)
        .map_err(|e| SkiffError::io(format!("opening {}", tarball.display()), e))?;
    let output = std::fs::File::create(&scratch)
        .map_err(|e| SkiffError::io(format!("creating {}", scratch.display()), e))?;

    // gzip -9 --no-name equivalent
    let mut encoder = GzBuilder::new()
        .mtime(0)
        .write(HashingWriter::new(output), Compression::best());

    let mut diff_hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let n = input
            .read(&mut buffer)
            .map_err(|e| SkiffError::io(format!("reading {}", tarball.display()), e))?;
        if n == 0 {
            break;
        }
        diff_hasher.update(&buffer[..n]);
        encoder
            .write_all(&buffer[..n])
            .map_err(|e| SkiffError::io(format!("compressing {}", tarball.display()), e))?;
    }

    let writer = encoder
        .finish()
        .map_err(|e| SkiffError::io(format!("compressing {}", tarball.display()), e))?;
    let (compressed_hex, size) = writer.finish();

    let diff_id = format!("sha256:{}", hex::encode(diff_hasher.finalize()));
    let digest = format!("sha256:{compressed_hex}");

    let blob_path = layout.blob_path(&digest);
    std::fs::rename(&scratch, &blob_path)
        .map_err(|e| SkiffError::io(format!("renaming into {}", blob_path.display()), e))?;
    std::fs::remove_file(tarball)
        .map_err(|e| SkiffError::io(format!("removing {}", tarball.display()), e))?;

    debug!("Prepared layer {digest} ({size} bytes) at {}", blob_path.display());
    Ok(LayerArtifact {
        diff_id,
        digest,
        path: blob_path,
        size,
    })
}

/// Write adapter that digests and counts everything passing through
struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    fn finish(self) -> (String, u64) {
        (hex::encode(self.hasher.finalize()), self.written)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn layout_with_tarball(content: &[u8]) -> (TempDir, StoreLayout, PathBuf) {
        let temp = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp.path());
        let upload = layout.ensure_upload_dir().await.unwrap();
        let tarball = upload.join("raw-00.tar");
        std::fs::write(&tarball, content).unwrap();
        (temp, layout, tarball)
    }

    #[tokio::test]
    async fn prepare_records_both_digests() {
        let (_temp, layout, tarball) = layout_with_tarball(b"layer content").await;

        let artifacts = prepare_layers(vec![tarball.clone()], &layout).await.unwrap();
        assert_eq!(artifacts.len(), 1);

        let artifact = &artifacts[0];
        assert!(artifact.diff_id.starts_with("sha256:"));
        assert!(artifact.digest.starts_with("sha256:"));
        // Uncompressed and compressed digests always differ
        assert_ne!(artifact.diff_id, artifact.digest);
        // diff_id covers the raw bytes
        let expected = format!("sha256:{}", hex::encode(Sha256::digest(b"layer content")));
        assert_eq!(artifact.diff_id, expected);
    }

    #[tokio::test]
    async fn blob_lands_at_content_addressed_path() {
        let (_temp, layout, tarball) = layout_with_tarball(b"abc").await;

        let artifacts = prepare_layers(vec![tarball.clone()], &layout).await.unwrap();
        let artifact = &artifacts[0];

        assert_eq!(artifact.path, layout.blob_path(&artifact.digest));
        assert!(artifact.path.exists());
        assert_eq!(
            artifact.size,
            std::fs::metadata(&artifact.path).unwrap().len()
        );
        // The raw tarball is consumed
        assert!(!tarball.exists());
    }

    #[tokio::test]
    async fn compression_is_deterministic() {
        let (_temp_a, layout_a, tarball_a) = layout_with_tarball(b"same bytes").await;
        let (_temp_b, layout_b, tarball_b) = layout_with_tarball(b"same bytes").await;

        let a = prepare_layers(vec![tarball_a], &layout_a).await.unwrap();
        let b = prepare_layers(vec![tarball_b], &layout_b).await.unwrap();

        assert_eq!(a[0].digest, b[0].digest);
        assert_eq!(a[0].size, b[0].size);
        assert_eq!(
            std::fs::read(&a[0].path).unwrap(),
            std::fs::read(&b[0].path).unwrap()
        );
    }

    #[tokio::test]
    async fn order_preserved_across_layers() {
        let temp = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp.path());
        let upload = layout.ensure_upload_dir().await.unwrap();

        let mut tarballs = Vec::new();
        for (i, content) in [&b"bottom"[..], &b"middle"[..], &b"top"[..]]
            .iter()
            .enumerate()
        {
            let path = upload.join(format!("raw-{i:02}.tar"));
            std::fs::write(&path, content).unwrap();
            tarballs.push(path);
        }

        let artifacts = prepare_layers(tarballs, &layout).await.unwrap();
        assert_eq!(artifacts.len(), 3);
        let bottom = format!("sha256:{}", hex::encode(Sha256::digest(b"bottom")));
        let top = format!("sha256:{}", hex::encode(Sha256::digest(b"top")));
        assert_eq!(artifacts[0].diff_id, bottom);
        assert_eq!(artifacts[2].diff_id, top);
    }

    #[tokio::test]
    async fn missing_tarball_errors() {
        let temp = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp.path());
        layout.ensure_upload_dir().await.unwrap();

        let result =
            prepare_layers(vec![layout.upload_dir().join("absent.tar")], &layout).await;
        assert!(matches!(result, Err(SkiffError::Io { .. })));
    }
}
