//! Push orchestration
//!
//! Drives the prepare → upload → cleanup pipeline. Transitions are
//! strictly sequential and irreversible; a failure in any stage aborts
//! the whole push.

use crate::error::{SkiffError, SkiffResult};
use crate::image::{identity, Reference, UnpackedImage};
use crate::layer::prepare_layers;
use crate::oci::builder::finalize_documents;
use crate::oci::types::{Descriptor, SCHEMA_VERSION};
use crate::oci::{DocumentBuilder, ImageConfig, Manifest, PreparedDocuments};
use crate::registry::Client;
use crate::store::{cache, StoreLayout};
use std::path::PathBuf;
use tracing::{debug, info};

/// Pipeline state; see `push`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initialized,
    Prepared,
    Uploaded,
    CleanedUp,
}

/// One layer ready for upload
#[derive(Debug, Clone)]
struct UploadLayer {
    digest: String,
    path: PathBuf,
}

/// Pushes one unpacked image to one destination
pub struct Pusher {
    image: UnpackedImage,
    dest: Reference,
    client: Box<dyn Client>,
    layout: StoreLayout,
    cache_enabled: bool,
    identity: String,
    state: State,
    layers: Vec<UploadLayer>,
    documents: Option<PreparedDocuments>,
}

impl Pusher {
    /// Create a pusher; resolves the image identity used as cache key
    pub async fn new(
        image: UnpackedImage,
        dest: Reference,
        client: Box<dyn Client>,
        layout: StoreLayout,
        cache_enabled: bool,
    ) -> Self {
        let identity = identity::resolve(&image.path, &image.reference).await;
        Self {
            image,
            dest,
            client,
            layout,
            cache_enabled,
            identity,
            state: State::Initialized,
            layers: Vec::new(),
            documents: None,
        }
    }

    /// The destination reference
    pub fn destination(&self) -> &Reference {
        &self.dest
    }

    /// Drive the full pipeline. The only externally invoked operation.
    pub async fn push(mut self) -> SkiffResult<()> {
        self.prepare().await?;
        self.upload().await?;
        self.cleanup().await?;
        Ok(())
    }

    fn advance(&mut self, from: State, to: State) -> SkiffResult<()> {
        if self.state != from {
            return Err(SkiffError::Internal(format!(
                "push pipeline out of order: {:?} -> {to:?}",
                self.state
            )));
        }
        self.state = to;
        Ok(())
    }

    /// Prepare manifest, config, and layer blobs.
    ///
    /// The registry probe comes first so credential failures surface
    /// before any compression work is spent.
    async fn prepare(&mut self) -> SkiffResult<()> {
        self.advance(State::Initialized, State::Prepared)?;

        self.client.probe().await?;
        self.layout.ensure_upload_dir().await?;

        let cached = if self.cache_enabled {
            debug!("Cache enabled, checking for previously prepared files");
            self.load_cached().await
        } else {
            None
        };

        let (config, descriptors, layers) = match cached {
            Some(found) => found,
            None => self.prepare_new().await?,
        };

        let documents = finalize_documents(config, descriptors)?;
        debug!("Config digest: {}", documents.config_digest);

        if self.cache_enabled {
            cache::write_atomic(
                &self.layout.manifest_path(&self.identity),
                &documents.manifest_bytes,
            )
            .await?;
            cache::write_atomic(
                &self.layout.config_path(&self.identity),
                &documents.config_bytes,
            )
            .await?;
        }

        self.layers = layers;
        self.documents = Some(documents);
        Ok(())
    }

    /// Try to reuse previously prepared artifacts; any missing or
    /// unparsable piece is a soft miss.
    async fn load_cached(&self) -> Option<(ImageConfig, Vec<Descriptor>, Vec<UploadLayer>)> {
        let config: ImageConfig =
            cache::read_json(&self.layout.config_path(&self.identity)).await?;
        let manifest: Manifest =
            cache::read_json(&self.layout.manifest_path(&self.identity)).await?;

        if manifest.schema_version != SCHEMA_VERSION {
            debug!("Cached manifest has wrong schema version, rebuilding");
            return None;
        }

        let mut layers = Vec::with_capacity(manifest.layers.len());
        for descriptor in &manifest.layers {
            let path = self.layout.blob_path(&descriptor.digest);
            if !path.is_file() {
                debug!("Cached layer blob missing: {}", path.display());
                return None;
            }
            layers.push(UploadLayer {
                digest: descriptor.digest.clone(),
                path,
            });
        }

        info!("Reusing previously prepared files");
        Some((config, manifest.layers, layers))
    }

    /// Full preparation: tarballs, layer blobs, then metadata
    async fn prepare_new(
        &self,
    ) -> SkiffResult<(ImageConfig, Vec<Descriptor>, Vec<UploadLayer>)> {
        let tarballs = self
            .image
            .write_layer_tarballs(&self.layout.upload_dir())
            .await?;
        let artifacts = prepare_layers(tarballs, &self.layout).await?;

        let mut builder = DocumentBuilder::new();
        for artifact in &artifacts {
            builder.add_layer(artifact);
        }

        info!("preparing metadata");
        let metadata = self.image.load_metadata().await?;
        builder.set_env(&metadata.env);
        builder.set_history(metadata.history)?;

        let layers = artifacts
            .iter()
            .map(|a| UploadLayer {
                digest: a.digest.clone(),
                path: a.path.clone(),
            })
            .collect();
        let (config, descriptors) = builder.into_parts();
        Ok((config, descriptors, layers))
    }

    /// Upload layers in order, then config, then manifest.
    ///
    /// The config must precede the manifest because the manifest
    /// references the config digest.
    async fn upload(&mut self) -> SkiffResult<()> {
        self.advance(State::Prepared, State::Uploaded)?;
        let documents = self
            .documents
            .as_ref()
            .ok_or_else(|| SkiffError::Internal("upload before prepare".to_string()))?;

        info!("starting upload");
        let total = self.layers.len();
        for (i, layer) in self.layers.iter().enumerate() {
            let label = format!("layer {}/{}", i + 1, total);
            self.client
                .upload_blob(&layer.digest, &layer.path, &label)
                .await?;
        }

        self.client
            .upload_config(&documents.config_digest, &documents.config_bytes)
            .await?;
        self.client.upload_manifest(&documents.manifest_bytes).await?;
        self.client.close().await?;
        Ok(())
    }

    /// Remove prepared blobs unless the cache keeps them
    async fn cleanup(&mut self) -> SkiffResult<()> {
        self.advance(State::Uploaded, State::CleanedUp)?;

        if self.cache_enabled {
            return Ok(());
        }

        info!("cleaning up");
        for layer in &self.layers {
            debug!("deleting blob: {}", layer.path.display());
            tokio::fs::remove_file(&layer.path)
                .await
                .map_err(|e| SkiffError::io(format!("removing {}", layer.path.display()), e))?;
        }
        Ok(())
    }
}
