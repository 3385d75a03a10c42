//! Registry client abstraction
//!
//! The pusher depends on this trait, not on the HTTP implementation,
//! so upload ordering can be tested with an in-memory client.

use crate::error::SkiffResult;
use async_trait::async_trait;
use std::path::Path;

/// Abstract registry upload interface
///
/// Implementations must make `upload_blob` idempotent: the registry may
/// already hold a blob with the same digest, in which case the upload
/// is skipped.
#[async_trait]
pub trait Client: Send + Sync {
    /// Read-only request against the registry base endpoint.
    ///
    /// Forces authentication before any expensive local work, so
    /// credential failures surface before layers are compressed.
    async fn probe(&self) -> SkiffResult<()>;

    /// Upload one layer blob from disk. `label` is a human-readable
    /// progress prefix such as "layer 2/3".
    async fn upload_blob(&self, digest: &str, path: &Path, label: &str) -> SkiffResult<()>;

    /// Upload the config blob
    async fn upload_config(&self, digest: &str, bytes: &[u8]) -> SkiffResult<()>;

    /// Upload the manifest for the destination tag.
    /// Must be called after `upload_config`; the manifest references
    /// the config digest.
    async fn upload_manifest(&self, bytes: &[u8]) -> SkiffResult<()>;

    /// Release client resources
    async fn close(&self) -> SkiffResult<()>;
}
