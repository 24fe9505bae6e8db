//! Configuration Management
//!
//! Handles persistent configuration storage for mistctl. Only convenience
//! defaults live here; the API token is supplied per run and never written
//! to disk.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Last used region id
    #[serde(default)]
    pub region: Option<String>,
    /// Last used organization ID
    #[serde(default)]
    pub org_id: Option<String>,
    /// Maximum in-flight requests during a bulk run
    #[serde(default)]
    pub concurrency: Option<usize>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("mistctl").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Get effective region (CLI > config > first region)
    pub fn effective_region(&self) -> String {
        self.region
            .clone()
            .unwrap_or_else(|| "global01".to_string())
    }

    /// Get effective organization (CLI > config, no default)
    pub fn effective_org(&self) -> String {
        self.org_id.clone().unwrap_or_default()
    }

    /// Get effective bulk concurrency (CLI > config > sequential)
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.unwrap_or(1).max(1)
    }

    /// Remember the last used region and organization
    pub fn remember(&mut self, region: &str, org_id: &str) -> Result<()> {
        self.region = Some(region.to_string());
        self.org_id = Some(org_id.to_string());
        self.save()
    }
}
