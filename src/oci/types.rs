//! Docker v2 / OCI document structures
//!
//! Explicit value structs replace loosely-typed JSON maps so that the
//! canonical serializer always produces the same bytes for the same
//! logical document. Struct field order is the serialization order.

use crate::error::SkiffResult;
use serde::{Deserialize, Serialize};

/// Media type of a Docker v2 schema 2 manifest
pub const MEDIA_TYPE_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
/// Media type of an image config blob
pub const MEDIA_TYPE_CONFIG: &str = "application/vnd.docker.container.image.v1+json";
/// Media type of a gzip-compressed layer blob
pub const MEDIA_TYPE_LAYER: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";

/// Manifest schema version (Docker v2 schema 2)
pub const SCHEMA_VERSION: u32 = 2;

/// Image configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Host architecture in GOARCH naming (amd64, arm64, ...)
    pub architecture: String,

    /// Version of the tool that produced this config
    pub skiff_version: String,

    /// Free-form comment
    pub comment: String,

    /// Runtime configuration (environment)
    pub config: RuntimeConfig,

    /// Build-time container configuration (unused, kept for compatibility)
    pub container_config: EmptyObject,

    /// Creation timestamp, UTC ISO-8601
    pub created: String,

    /// Layer history, one entry per build step
    pub history: Vec<HistoryEntry>,

    /// Operating system
    pub os: String,

    /// Filesystem layer identities
    pub rootfs: RootFs,
}

/// Runtime configuration section of the image config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Environment as "KEY=VALUE" strings, sorted by key
    #[serde(rename = "Env", default)]
    pub env: Vec<String>,
}

/// An intentionally empty JSON object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyObject {}

/// One history entry; `empty_layer` marks entries without filesystem content
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_layer: Option<bool>,
}

impl HistoryEntry {
    /// Whether this entry represents a layer with filesystem content
    pub fn is_non_empty(&self) -> bool {
        !self.empty_layer.unwrap_or(false)
    }
}

/// Rootfs section: ordered uncompressed-layer digests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootFs {
    pub diff_ids: Vec<String>,

    #[serde(rename = "type")]
    pub fs_type: String,
}

impl Default for RootFs {
    fn default() -> Self {
        Self {
            diff_ids: Vec::new(),
            fs_type: "layers".to_string(),
        }
    }
}

/// Content descriptor referencing a blob by media type, size, and digest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(rename = "mediaType")]
    pub media_type: String,

    pub size: u64,

    pub digest: String,
}

/// Image manifest (Docker v2 schema 2)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,

    #[serde(rename = "mediaType")]
    pub media_type: String,

    pub config: Descriptor,

    pub layers: Vec<Descriptor>,
}

/// Serialize a document to its canonical byte form.
///
/// Two-space-indented JSON with struct-declared key order. Digests over
/// documents are computed on exactly these bytes, and exactly these bytes
/// are uploaded and cached.
pub fn canonical_json<T: Serialize>(value: &T) -> SkiffResult<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(value)?)
}
