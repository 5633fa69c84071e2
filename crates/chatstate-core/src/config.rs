use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_HEAVY_ANIMATION_TIMEOUT_MS, FOLDER_UPDATE_THROTTLE_MS, SLOW_CONTAINERS_UPDATE_MS,
    SLOW_FOLDER_UPDATE_MS,
};

/// Runtime configuration shared by the store, the animation gate and the folder manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    /// Enables development-only checks: stale-write detection and slow-path warnings.
    pub debug_checks: bool,
    /// Whether this context coordinates the others. Non-master contexts bootstrap
    /// the folder manager eagerly on first access.
    pub is_master_tab: bool,
    pub folder_update_throttle_ms: u64,
    pub slow_folder_update_ms: u64,
    pub slow_containers_update_ms: u64,
    /// Auto-expiry for heavy animations started without an explicit duration.
    pub heavy_animation_timeout_ms: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            debug_checks: cfg!(debug_assertions),
            is_master_tab: true,
            folder_update_throttle_ms: FOLDER_UPDATE_THROTTLE_MS,
            slow_folder_update_ms: SLOW_FOLDER_UPDATE_MS,
            slow_containers_update_ms: SLOW_CONTAINERS_UPDATE_MS,
            heavy_animation_timeout_ms: DEFAULT_HEAVY_ANIMATION_TIMEOUT_MS,
        }
    }
}

impl CoreConfig {
    /// Load config from a JSON file. Missing fields fall back to defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize config")
    }

    pub fn folder_update_throttle(&self) -> Duration {
        Duration::from_millis(self.folder_update_throttle_ms)
    }

    pub fn slow_folder_update(&self) -> Duration {
        Duration::from_millis(self.slow_folder_update_ms)
    }

    pub fn slow_containers_update(&self) -> Duration {
        Duration::from_millis(self.slow_containers_update_ms)
    }

    pub fn heavy_animation_timeout(&self) -> Duration {
        Duration::from_millis(self.heavy_animation_timeout_ms)
    }
}
