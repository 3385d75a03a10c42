//! OCI/Docker v2 documents: types, canonical serialization, and the
//! config/manifest builder with history normalization.

pub mod builder;
pub mod types;

pub use builder::{bytes_digest, finalize_documents, DocumentBuilder, PreparedDocuments};
pub use types::{Descriptor, HistoryEntry, ImageConfig, Manifest};
