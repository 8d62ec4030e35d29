//! Sync configuration
//!
//! Loaded from `sync.json` in the config directory when present:
//!
//! ```json
//! { "default_visible_limit": 50, "maximum_auto_download_message_size": 65536 }
//! ```
//!
//! Missing fields and a missing file fall back to the defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config filename in the config directory
const SYNC_CONFIG_FILE: &str = "sync.json";

/// Per-call limits for folder sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum number of messages to materialize in one sync call
    pub default_visible_limit: usize,
    /// Body size cap sent as the body preference truncation size
    pub maximum_auto_download_message_size: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_visible_limit: 25,
            maximum_auto_download_message_size: 32 * 1024,
        }
    }
}

impl SyncConfig {
    pub fn new(default_visible_limit: usize, maximum_auto_download_message_size: u64) -> Self {
        Self {
            default_visible_limit,
            maximum_auto_download_message_size,
        }
    }

    /// Load from the config directory, using defaults if the file doesn't exist
    pub fn load() -> Result<Self> {
        config::load_json_or_default(SYNC_CONFIG_FILE)
    }

    /// Load from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Parse from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse sync config JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.default_visible_limit, 25);
        assert_eq!(config.maximum_auto_download_message_size, 32768);
    }

    #[test]
    fn test_parse_full() {
        let config = SyncConfig::from_json(
            r#"{ "default_visible_limit": 100, "maximum_auto_download_message_size": 1024 }"#,
        )
        .unwrap();
        assert_eq!(config, SyncConfig::new(100, 1024));
    }

    #[test]
    fn test_parse_partial_uses_defaults() {
        let config = SyncConfig::from_json(r#"{ "default_visible_limit": 5 }"#).unwrap();
        assert_eq!(config.default_visible_limit, 5);
        assert_eq!(config.maximum_auto_download_message_size, 32768);
    }

    #[test]
    fn test_invalid_json() {
        assert!(SyncConfig::from_json(r#"{ "default_visible_limit": "many" }"#).is_err());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let present = config::config_path(SYNC_CONFIG_FILE).is_some_and(|p| p.exists());
        if !present {
            assert_eq!(SyncConfig::load().unwrap(), SyncConfig::default());
        }
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.json");
        std::fs::write(&path, r#"{ "maximum_auto_download_message_size": 10 }"#).unwrap();

        let config = SyncConfig::from_file(&path).unwrap();
        assert_eq!(config.maximum_auto_download_message_size, 10);
        assert_eq!(config.default_visible_limit, 25);
    }
}
