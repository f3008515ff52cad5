//! Configuration management for MIDI Keypad
//!
//! Handles loading, parsing and validation of the YAML configuration file.
//! Every field has a default, so the file itself is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::info;

use crate::engine::HoldMode;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub midi: MidiConfig,
    pub mapping: MappingConfig,
    pub hold: HoldConfig,
}

/// MIDI input configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MidiConfig {
    /// Port index or case-insensitive name substring; prompt when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Receive SysEx and log it as hex
    pub show_sysex: bool,
    /// Capacity of the callback → engine channel
    pub queue_capacity: usize,
}

/// Mapping file configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Mapping file; relative paths resolve against the app base directory
    pub file: PathBuf,
    /// Keep loaded entries when a learn session starts
    pub keep_existing_on_learn: bool,
}

/// Key hold configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HoldConfig {
    /// Re-press interval in milliseconds
    pub interval_ms: u64,
    pub mode: HoldMode,
}

impl HoldConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            device: None,
            show_sysex: false,
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from(default_mapping_file()),
            keep_existing_on_learn: false,
        }
    }
}

impl Default for HoldConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            mode: HoldMode::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !fs::try_exists(path).await.unwrap_or(false) {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let config = Self::load(path).await?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Parse and validate YAML text
    pub fn parse(contents: &str) -> Result<Self> {
        // An empty file deserializes to null
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for correctness
    pub fn validate(&self) -> Result<()> {
        if self.midi.queue_capacity == 0 {
            anyhow::bail!("midi.queue_capacity must be greater than 0");
        }
        if let Some(device) = &self.midi.device {
            if device.trim().is_empty() {
                anyhow::bail!("midi.device cannot be empty (remove it to be prompted)");
            }
        }

        if self.mapping.file.as_os_str().is_empty() {
            anyhow::bail!("mapping.file cannot be empty");
        }

        if self.hold.interval_ms == 0 || self.hold.interval_ms > 1000 {
            anyhow::bail!(
                "hold.interval_ms is {} (must be 1-1000)",
                self.hold.interval_ms
            );
        }

        Ok(())
    }
}

// Default value functions
fn default_queue_capacity() -> usize { 256 }
fn default_mapping_file() -> &'static str { "mapping.txt" }
fn default_interval_ms() -> u64 { 25 }
