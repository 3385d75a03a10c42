//! Configuration schema for Skiff
//!
//! Configuration is stored at `~/.config/skiff/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage settings
    pub storage: StorageConfig,

    /// Push behavior
    pub push: PushConfig,

    /// Registry access settings
    pub registry: RegistryConfig,
}

/// Local storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage root holding unpacked images and the upload area
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("skiff"),
        }
    }
}

/// Push behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Whether the prepared-artifact cache subsystem is available.
    /// The per-invocation `--cache` flag fails fast when this is off.
    pub cache: bool,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self { cache: true }
    }
}

/// Registry access settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Username for registry authentication (SKIFF_USERNAME overrides)
    pub username: Option<String>,

    /// Password or token (SKIFF_PASSWORD overrides)
    pub password: Option<String>,

    /// Registries reachable over plain HTTP (development registries)
    pub insecure: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            insecure: vec!["localhost".to_string(), "127.0.0.1".to_string()],
        }
    }
}
