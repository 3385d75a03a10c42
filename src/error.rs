//! Error types for Skiff
//!
//! All modules use `SkiffResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Skiff operations
pub type SkiffResult<T> = Result<T, SkiffError>;

/// All errors that can occur in Skiff
#[derive(Error, Debug)]
pub enum SkiffError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload cache requested but the cache is disabled in configuration")]
    CacheUnavailable,

    // Image errors
    #[error("Invalid image reference: {reference}: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("{path} does not appear to be an unpacked image")]
    NotAnImage { path: PathBuf },

    #[error("Invalid image metadata at {path}: {reason}")]
    MetadataInvalid { path: PathBuf, reason: String },

    #[error("Image history has no non-empty entry; image is malformed")]
    HistoryInvariant,

    // Registry errors
    #[error("Registry authentication failed ({status}) for {url}")]
    RegistryAuth { status: u16, url: String },

    #[error("Registry request failed while {context}: {reason}")]
    RegistryRequest { context: String, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SkiffError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a registry request error with stage context
    pub fn registry(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RegistryRequest {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::RegistryAuth { .. } => {
                Some("Set SKIFF_USERNAME and SKIFF_PASSWORD for the destination registry")
            }
            Self::CacheUnavailable => Some("Enable the cache in config: [push] cache = true"),
            Self::NotAnImage { .. } => {
                Some("Expected a directory with a rootfs/ or layers/ subdirectory")
            }
            _ => None,
        }
    }
}
