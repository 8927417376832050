//! Configuration file handling.
//!
//! Loads a TOML file with the backup directory, named connections and named
//! presets. `MONGOVAULT_BACKUP_DIR` overrides the storage section.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionDescriptor;
use crate::error::{Error, Result};
use crate::selection::{SelectionIntent, SelectionMode};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub connections: HashMap<String, ConnectionDescriptor>,

    #[serde(default)]
    pub presets: HashMap<String, Preset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Where archives and their sidecars live.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
        }
    }
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

/// A saved backup intent: which connection, which collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub connection: String,

    #[serde(default)]
    pub mode: SelectionMode,

    #[serde(default)]
    pub collections: Vec<String>,
}

impl Preset {
    pub fn intent(&self) -> SelectionIntent {
        SelectionIntent {
            mode: self.mode,
            collections: self.collections.clone(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and apply environment overrides.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        if let Ok(dir) = std::env::var("MONGOVAULT_BACKUP_DIR") {
            config.storage.backup_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    /// Look up a named connection, with the key folded into the descriptor.
    pub fn connection(&self, name: &str) -> Result<ConnectionDescriptor> {
        let mut descriptor = self
            .connections
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Configuration(format!("unknown connection '{name}'")))?;
        descriptor.name = name.into();
        Ok(descriptor)
    }

    pub fn preset(&self, name: &str) -> Result<&Preset> {
        self.presets
            .get(name)
            .ok_or_else(|| Error::Configuration(format!("unknown preset '{name}'")))
    }
}
