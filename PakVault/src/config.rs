//! Persisted explorer configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum number of recent archives to track
const MAX_RECENT_ARCHIVES: usize = 10;

// Default value functions for serde
fn default_thumbnail_capacity() -> usize {
    200
}
fn default_true() -> bool {
    true
}

/// Explorer settings persisted between runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Per-archive thumbnail cache capacity
    #[serde(default = "default_thumbnail_capacity")]
    pub thumbnail_capacity: usize,
    /// Default the export dialog to native format
    #[serde(default = "default_true")]
    pub export_native_default: bool,
    /// Recently opened archives, most recent first
    #[serde(default)]
    pub recent_archives: Vec<String>,
    /// Last export target directory
    #[serde(default)]
    pub last_export_dir: Option<String>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            thumbnail_capacity: default_thumbnail_capacity(),
            export_native_default: true,
            recent_archives: Vec::new(),
            last_export_dir: None,
        }
    }
}

impl ExplorerConfig {
    /// Path of the config file in the platform config directory
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pakvault").join("config.toml"))
    }

    /// Load the config, falling back to defaults if the file is absent
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let Some(path) = Self::default_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        let config = toml::from_str(&text)?;
        Ok(config)
    }

    /// Save the config to the platform config directory
    ///
    /// # Errors
    /// Returns [`Error::Config`] if no config directory exists or
    /// serialization fails.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()
            .ok_or_else(|| Error::Config("no config directory".to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(&path, text)?;
        Ok(())
    }

    /// Record an archive path as most recently used
    pub fn push_recent(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.recent_archives.retain(|p| *p != path);
        self.recent_archives.insert(0, path);
        self.recent_archives.truncate(MAX_RECENT_ARCHIVES);
    }
}
