//! Settings management for KiroBar
//!
//! Handles persistent configuration including:
//! - Refresh interval
//! - Probe timeout and terminal type
//! - Explicit `kiro-cli` location
//! - Usage warning thresholds

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::FetchContext;
use crate::runner::DEFAULT_TERM;

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Refresh interval in seconds (0 = manual only)
    pub refresh_interval_secs: u64,

    /// Hard deadline for one `kiro-cli` run, in seconds
    pub timeout_secs: u64,

    /// Explicit path to `kiro-cli`, skipping the PATH search
    pub binary_path: Option<PathBuf>,

    /// Terminal type forced for the child process
    pub term: String,

    /// High usage threshold for warnings (percentage)
    pub high_usage_threshold: u8,

    /// Critical usage threshold for alerts (percentage)
    pub critical_usage_threshold: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 300, // 5 minutes
            timeout_secs: 20,
            binary_path: None,
            term: DEFAULT_TERM.to_string(),
            high_usage_threshold: 70,
            critical_usage_threshold: 90,
        }
    }
}

/// How alarming a usage percent is under the configured thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageLevel {
    Normal,
    High,
    Critical,
}

impl Settings {
    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("KiroBar").join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring unreadable settings at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load settings from a specific file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save settings to disk
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::settings_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine settings path"))?;
        self.save_to(&path)
    }

    /// Save settings to a specific file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;

        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Build the fetch context these settings describe
    pub fn fetch_context(&self) -> FetchContext {
        FetchContext {
            timeout: self.timeout(),
            binary_path: self.binary_path.clone(),
            term: self.term.clone(),
        }
    }

    /// Classify a usage percent against the thresholds
    pub fn usage_level(&self, percent: u8) -> UsageLevel {
        if percent >= self.critical_usage_threshold {
            UsageLevel::Critical
        } else if percent >= self.high_usage_threshold {
            UsageLevel::High
        } else {
            UsageLevel::Normal
        }
    }
}
