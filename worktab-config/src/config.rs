//! Core `Config` struct, YAML persistence and validation.

use crate::error::ConfigError;
use crate::types::{KeyBinding, LogLevel};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Workspace tab session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // ========================================================================
    // Persistence
    // ========================================================================
    /// Quiet period (ms) after the last tab mutation before the tab set is saved
    #[serde(default = "crate::defaults::persist_debounce_ms")]
    pub persist_debounce_ms: u64,

    /// First retry delay (ms) after a failed save; doubles per consecutive failure
    #[serde(default = "crate::defaults::retry_initial_backoff_ms")]
    pub retry_initial_backoff_ms: u64,

    /// Upper bound (ms) for the retry delay
    #[serde(default = "crate::defaults::retry_max_backoff_ms")]
    pub retry_max_backoff_ms: u64,

    /// Directory holding per-user tab set files (defaults to the platform data dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,

    // ========================================================================
    // Tabs
    // ========================================================================
    /// How many closed tabs can be reopened
    #[serde(default = "crate::defaults::closed_tab_history")]
    pub closed_tab_history: usize,

    /// Route of the reserved dashboard tab
    #[serde(default = "crate::defaults::dashboard_route")]
    pub dashboard_route: String,

    /// Route navigated to after logout
    #[serde(default = "crate::defaults::post_logout_route")]
    pub post_logout_route: String,

    // ========================================================================
    // Keybindings
    // ========================================================================
    /// Keyboard shortcuts mapped to tab actions
    #[serde(default = "crate::defaults::keybindings")]
    pub keybindings: Vec<KeyBinding>,

    // ========================================================================
    // Debug Logging
    // ========================================================================
    #[serde(default)]
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            persist_debounce_ms: crate::defaults::persist_debounce_ms(),
            retry_initial_backoff_ms: crate::defaults::retry_initial_backoff_ms(),
            retry_max_backoff_ms: crate::defaults::retry_max_backoff_ms(),
            storage_dir: None,
            closed_tab_history: crate::defaults::closed_tab_history(),
            dashboard_route: crate::defaults::dashboard_route(),
            post_logout_route: crate::defaults::post_logout_route(),
            keybindings: crate::defaults::keybindings(),
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file, creating a default one if missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        log::info!("Config path: {:?}", path);

        if !path.exists() {
            log::info!("Config file not found, creating default at {:?}", path);
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(path)
            .map_err(ConfigError::from)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        let mut config: Config = if contents.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml_ng::from_str(&contents)
                .map_err(ConfigError::from)
                .with_context(|| format!("Failed to parse config from {:?}", path))?
        };

        config.merge_default_keybindings();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let yaml = serde_yaml_ng::to_string(self).map_err(ConfigError::from)?;

        // Atomic save: write to temp file then rename to prevent corruption on crash
        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, &yaml).map_err(ConfigError::from)?;
        fs::rename(&temp_path, path).map_err(ConfigError::from)?;

        Ok(())
    }

    /// Get the configuration file path: `<config dir>/worktab/config.yaml`
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    /// Get the configuration directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("worktab")
    }

    /// Directory holding the per-user tab set files.
    pub fn tab_store_dir(&self) -> PathBuf {
        match &self.storage_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("worktab")
                .join("tabs"),
        }
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }

    pub fn retry_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_initial_backoff_ms)
    }

    pub fn retry_max_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_max_backoff_ms)
    }

    /// Check field values that serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.persist_debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "persist_debounce_ms must be greater than zero".to_string(),
            ));
        }
        if self.closed_tab_history == 0 {
            return Err(ConfigError::Validation(
                "closed_tab_history must be at least 1".to_string(),
            ));
        }
        if self.retry_initial_backoff_ms == 0 {
            return Err(ConfigError::Validation(
                "retry_initial_backoff_ms must be greater than zero".to_string(),
            ));
        }
        if self.retry_max_backoff_ms < self.retry_initial_backoff_ms {
            return Err(ConfigError::Validation(format!(
                "retry_max_backoff_ms ({}) is smaller than retry_initial_backoff_ms ({})",
                self.retry_max_backoff_ms, self.retry_initial_backoff_ms
            )));
        }
        if !self.dashboard_route.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "dashboard_route '{}' must start with '/'",
                self.dashboard_route
            )));
        }
        Ok(())
    }

    /// Merge default keybindings into the user's config.
    /// Only adds keybindings for actions that don't already exist in the user's config.
    pub(crate) fn merge_default_keybindings(&mut self) {
        let existing_actions: HashSet<String> = self
            .keybindings
            .iter()
            .map(|kb| kb.action.clone())
            .collect();

        let mut added_count = 0;
        for default_kb in crate::defaults::keybindings() {
            if !existing_actions.contains(&default_kb.action) {
                log::info!(
                    "Adding new default keybinding: {} -> {}",
                    default_kb.key,
                    default_kb.action
                );
                self.keybindings.push(default_kb);
                added_count += 1;
            }
        }

        if added_count > 0 {
            log::info!(
                "Merged {} new default keybinding(s) into user config",
                added_count
            );
        }
    }
}
