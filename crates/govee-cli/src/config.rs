//! Configuration file management.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use govee_core::{ConnectionConfig, EngineConfig};
use govee_types::Calibration;
use govee_types::uuid::MAC_PREFIXES;
use serde::{Deserialize, Serialize};

use crate::cli::OutputFormat;

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default device address or alias
    #[serde(default)]
    pub device: Option<String>,

    /// Default output format
    #[serde(default)]
    pub format: Option<OutputFormat>,

    /// Connection timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Protocol wait overrides
    #[serde(default)]
    pub engine: EngineOverrides,

    /// Known devices keyed by address
    #[serde(default)]
    pub devices: BTreeMap<String, KnownDevice>,
}

/// Optional overrides for the engine's poll interval and wait caps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineOverrides {
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub field_wait_secs: Option<u64>,
    #[serde(default)]
    pub ack_wait_secs: Option<u64>,
    #[serde(default)]
    pub history_wait_secs: Option<u64>,
}

/// A device entry: a friendly name and the offsets applied to its advertisements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnownDevice {
    #[serde(default)]
    pub alias: Option<String>,

    #[serde(flatten)]
    pub calibration: Calibration,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("govee")
            .join("config.toml")
    }

    /// Load config from file, or return default if not found
    pub fn load() -> Self {
        let path = Self::path();
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => match Self::parse(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {:#}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Parse config file contents
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid config.toml")
    }

    /// Engine configuration with any configured overrides applied
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        let overrides = &self.engine;
        if let Some(ms) = overrides.poll_interval_ms {
            config = config.poll_interval(Duration::from_millis(ms));
        }
        if let Some(secs) = overrides.field_wait_secs {
            config = config.field_wait(Duration::from_secs(secs));
        }
        if let Some(secs) = overrides.ack_wait_secs {
            config = config.ack_wait(Duration::from_secs(secs));
        }
        if let Some(secs) = overrides.history_wait_secs {
            config = config.history_wait(Duration::from_secs(secs));
        }
        config
    }

    /// Connection configuration; an explicit timeout overrides the configured one
    pub fn connection_config(&self, timeout: Option<u64>) -> ConnectionConfig {
        match timeout.or(self.timeout) {
            Some(secs) => ConnectionConfig::default().connection_timeout(Duration::from_secs(secs)),
            None => ConnectionConfig::default(),
        }
    }

    /// Configured calibration per device address
    pub fn calibrations(&self) -> impl Iterator<Item = (&str, Calibration)> {
        self.devices
            .iter()
            .filter(|(_, device)| !device.calibration.is_zero())
            .map(|(address, device)| (address.as_str(), device.calibration))
    }

    /// Label for a device in listings: its alias if one is configured
    pub fn label<'a>(&'a self, address: &'a str) -> &'a str {
        self.devices
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(address))
            .and_then(|(_, device)| device.alias.as_deref())
            .unwrap_or(address)
    }
}

/// Resolve device from arg, env var, or config.
/// Aliases are resolved to their address.
pub fn resolve_device(device: Option<String>, config: &Config) -> Option<String> {
    device
        .or_else(|| config.device.clone())
        .map(|d| resolve_alias(&d, config))
}

/// Resolve an alias to its device address, or return the original if not an alias.
///
/// Addresses with a Govee prefix are returned unchanged. Otherwise an exact
/// alias match wins over the first alias starting with the label.
pub fn resolve_alias(device: &str, config: &Config) -> String {
    let upper = device.to_ascii_uppercase();
    if MAC_PREFIXES.iter().any(|prefix| upper.starts_with(prefix)) {
        return device.to_string();
    }

    let by_alias = |matches: &dyn Fn(&str) -> bool| {
        config
            .devices
            .iter()
            .find(|(_, known)| known.alias.as_deref().is_some_and(matches))
            .map(|(address, _)| address.clone())
    };

    by_alias(&|alias| alias == device)
        .or_else(|| by_alias(&|alias| alias.starts_with(device)))
        .unwrap_or_else(|| device.to_string())
}
