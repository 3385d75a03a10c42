//! Config and manifest construction
//!
//! Builds the two documents from layer artifacts and image metadata,
//! normalizes history for registry compatibility, and finalizes both to
//! canonical bytes. The manifest's config descriptor is only written
//! during finalization, from the fully serialized config bytes.

use crate::error::{SkiffError, SkiffResult};
use crate::layer::LayerArtifact;
use crate::oci::types::{
    canonical_json, Descriptor, EmptyObject, HistoryEntry, ImageConfig, Manifest, RootFs,
    RuntimeConfig, MEDIA_TYPE_CONFIG, MEDIA_TYPE_LAYER, MEDIA_TYPE_MANIFEST, SCHEMA_VERSION,
};
use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Digest of a byte sequence in OCI form
pub fn bytes_digest(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

/// Host architecture in GOARCH naming
pub fn host_architecture() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64le",
        other => other,
    }
}

/// Finalized documents, ready for upload and caching
#[derive(Debug, Clone)]
pub struct PreparedDocuments {
    /// Canonical config bytes
    pub config_bytes: Vec<u8>,
    /// Digest of `config_bytes`
    pub config_digest: String,
    /// Canonical manifest bytes
    pub manifest_bytes: Vec<u8>,
}

/// Builds config and manifest documents for one push
#[derive(Debug)]
pub struct DocumentBuilder {
    config: ImageConfig,
    layers: Vec<Descriptor>,
}

impl DocumentBuilder {
    /// Start from the fixed skeletons
    pub fn new() -> Self {
        Self {
            config: ImageConfig {
                architecture: host_architecture().to_string(),
                skiff_version: env!("CARGO_PKG_VERSION").to_string(),
                comment: "pushed with skiff".to_string(),
                config: RuntimeConfig::default(),
                container_config: EmptyObject {},
                created: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                history: Vec::new(),
                os: "linux".to_string(),
                rootfs: RootFs::default(),
            },
            layers: Vec::new(),
        }
    }

    /// Record a prepared layer; call order is bottom layer first
    pub fn add_layer(&mut self, artifact: &LayerArtifact) {
        self.config.rootfs.diff_ids.push(artifact.diff_id.clone());
        self.layers.push(Descriptor {
            media_type: MEDIA_TYPE_LAYER.to_string(),
            size: artifact.size,
            digest: artifact.digest.clone(),
        });
    }

    /// Render the environment mapping as "KEY=VALUE" strings.
    /// The BTreeMap key order makes the list deterministic.
    pub fn set_env(&mut self, env: &BTreeMap<String, String>) {
        self.config.config.env = env.iter().map(|(k, v)| format!("{k}={v}")).collect();
    }

    /// Normalize and install the history list
    pub fn set_history(&mut self, history: Vec<HistoryEntry>) -> SkiffResult<()> {
        self.config.history = normalize_history(history)?;
        Ok(())
    }

    /// Tear down into the config document and the layer descriptors,
    /// ready for `finalize_documents`
    pub fn into_parts(self) -> (ImageConfig, Vec<Descriptor>) {
        (self.config, self.layers)
    }

    /// Serialize both documents to their canonical byte form
    pub fn finalize(self) -> SkiffResult<PreparedDocuments> {
        finalize_documents(self.config, self.layers)
    }
}

/// Serialize config and manifest to canonical bytes.
///
/// The config is serialized first; its digest and length become the
/// manifest's config descriptor, and only then is the manifest
/// serialized. Cached documents are finalized through the same path,
/// so a cache hit reproduces the first run's bytes exactly.
pub fn finalize_documents(
    config: ImageConfig,
    layers: Vec<Descriptor>,
) -> SkiffResult<PreparedDocuments> {
    let config_bytes = canonical_json(&config)?;
    let config_digest = bytes_digest(&config_bytes);

    let manifest = Manifest {
        schema_version: SCHEMA_VERSION,
        media_type: MEDIA_TYPE_MANIFEST.to_string(),
        config: Descriptor {
            media_type: MEDIA_TYPE_CONFIG.to_string(),
            size: config_bytes.len() as u64,
            digest: config_digest.clone(),
        },
        layers,
    };
    let manifest_bytes = canonical_json(&manifest)?;

    Ok(PreparedDocuments {
        config_bytes,
        config_digest,
        manifest_bytes,
    })
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize history so exactly one entry is non-empty.
///
/// Some registries reject uploads when the count of non-empty history
/// entries does not match the uploaded layer count. Skiff always pushes
/// with a single non-empty entry: the last entry that is not marked
/// `empty_layer` wins, every other entry is forced empty.
pub fn normalize_history(mut history: Vec<HistoryEntry>) -> SkiffResult<Vec<HistoryEntry>> {
    let winner = history
        .iter()
        .rposition(HistoryEntry::is_non_empty)
        .ok_or(SkiffError::HistoryInvariant)?;

    for (i, entry) in history.iter_mut().enumerate() {
        if i != winner {
            entry.empty_layer = Some(true);
        }
    }
    Ok(history)
}
