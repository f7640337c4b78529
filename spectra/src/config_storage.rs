//! Persistent storage for scan settings.
//!
//! Stores the scan configuration and an optional replacement mineral table.
//! Everything lives in ~/.geospectra/ by default.

use crate::config::ScanConfig;
use crate::minerals::MineralRegistry;
use std::path::{Path, PathBuf};

const SCAN_CONFIG_FILE: &str = "scan_config.json";
const MINERALS_FILE: &str = "minerals.json";

/// Configuration storage manager.
#[derive(Debug, Clone)]
pub struct ConfigStorage {
    /// Root directory for all configuration (e.g., ~/.geospectra)
    root_path: PathBuf,
}

impl ConfigStorage {
    /// Create a config storage at the default path (~/.geospectra)
    pub fn new() -> std::io::Result<Self> {
        let home = std::env::var("HOME")
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::NotFound, "HOME not set"))?;
        Ok(Self::with_path(PathBuf::from(home).join(".geospectra")))
    }

    pub fn with_path(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn scan_config_path(&self) -> PathBuf {
        self.root_path.join(SCAN_CONFIG_FILE)
    }

    fn minerals_path(&self) -> PathBuf {
        self.root_path.join(MINERALS_FILE)
    }

    /// Get the stored scan configuration.
    ///
    /// Returns None if nothing is stored.
    /// Returns Some(Err) if the file exists but cannot be loaded.
    pub fn get_scan_config(&self) -> Option<std::io::Result<ScanConfig>> {
        let path = self.scan_config_path();
        if !path.exists() {
            return None;
        }
        Some(ScanConfig::load_from_file(&path))
    }

    /// Save the scan configuration, creating the root directory if needed.
    pub fn save_scan_config(&self, config: &ScanConfig) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.root_path)?;
        let path = self.scan_config_path();
        config.save_to_file(&path)?;
        Ok(path)
    }

    /// Returns Ok(true) if the file was deleted, Ok(false) if it didn't exist.
    pub fn delete_scan_config(&self) -> std::io::Result<bool> {
        remove_if_exists(&self.scan_config_path())
    }

    /// Get the stored mineral table override.
    ///
    /// Returns None if nothing is stored.
    /// Returns Some(Err) if the file exists but is unreadable or invalid.
    pub fn get_minerals(&self) -> Option<std::io::Result<MineralRegistry>> {
        let path = self.minerals_path();
        if !path.exists() {
            return None;
        }
        Some(MineralRegistry::load_from_file(&path))
    }

    pub fn save_minerals(&self, registry: &MineralRegistry) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.root_path)?;
        let path = self.minerals_path();
        registry.save_to_file(&path)?;
        Ok(path)
    }

    /// Returns Ok(true) if the file was deleted, Ok(false) if it didn't exist.
    pub fn delete_minerals(&self) -> std::io::Result<bool> {
        remove_if_exists(&self.minerals_path())
    }
}

impl Default for ConfigStorage {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self::with_path(PathBuf::from(".geospectra")))
    }
}

fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(path)?;
    Ok(true)
}
