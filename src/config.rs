//! Configuration file
//!
//! TOML at `~/.config/macropad/config.toml` by default. A missing file yields
//! the defaults, which are then written back so there is something to edit.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use macropad_bluez::{ServiceConfig, DEFAULT_PROFILE_PATH};
use macropad_hid::HID_PSM_CONTROL;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::actions::{self, ActionId};
use crate::input::CanonicalEvent;
use crate::mapping::{default_mappings, ActionMap};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("serializing config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Bluetooth adapter and SDP record settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Adapter alias hosts see while pairing
    pub alias: String,
    pub service_name: String,
    pub service_description: String,
    pub provider: String,
    /// L2CAP PSM for the profile; `0` lets BlueZ choose
    pub psm: Option<u16>,
    pub profile_path: String,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            alias: "MacroPad HID".to_string(),
            service_name: "MacroPad HID".to_string(),
            service_description: "Bluetooth HID Keyboard".to_string(),
            provider: "MacroPad".to_string(),
            psm: Some(HID_PSM_CONTROL),
            profile_path: DEFAULT_PROFILE_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Input device nodes to read
    #[serde(default = "default_device_paths")]
    pub device_paths: Vec<PathBuf>,

    /// Seconds before retrying a missing or failed device
    #[serde(default = "default_backoff")]
    pub reconnect_backoff_secs: u64,

    /// Upper bound on one readiness wait, in milliseconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,

    /// Command drain interval, in milliseconds
    #[serde(default = "default_tick")]
    pub tick_ms: u64,

    #[serde(default)]
    pub bluetooth: BluetoothConfig,

    /// Per-action trigger overrides: `action = [[type, code, value], ...]`
    #[serde(default)]
    pub triggers: BTreeMap<String, Vec<CanonicalEvent>>,

    #[serde(default = "default_mappings")]
    pub mappings: ActionMap,
}

fn default_device_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/dev/input/event0"),
        PathBuf::from("/dev/input/event1"),
    ]
}

fn default_backoff() -> u64 {
    5
}

fn default_poll_timeout() -> u64 {
    1000
}

fn default_tick() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_paths: default_device_paths(),
            reconnect_backoff_secs: default_backoff(),
            poll_timeout_ms: default_poll_timeout(),
            tick_ms: default_tick(),
            bluetooth: BluetoothConfig::default(),
            triggers: BTreeMap::new(),
            mappings: default_mappings(),
        }
    }
}

/// Only the mapping table, for reloads.
#[derive(Deserialize)]
struct MappingsOnly {
    #[serde(default = "default_mappings")]
    mappings: ActionMap,
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("macropad")
            .join("config.toml")
    }

    pub fn from_toml(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_toml(path, &read(path)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config, writing the defaults back if the file does not exist.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_toml(path, &read(path)?);
        }
        let config = Self::default();
        match config.save(path) {
            Ok(()) => info!("Wrote default config to {}", path.display()),
            Err(e) => warn!("Could not write default config: {}", e),
        }
        Ok(config)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io_err)?;
        Ok(())
    }

    /// Re-read only `[mappings]` from `path`.
    pub fn load_mappings(path: &Path) -> Result<ActionMap, ConfigError> {
        let content = read(path)?;
        let only: MappingsOnly = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(only.mappings)
    }

    /// Trigger lists per action, in action order, with overrides applied.
    pub fn trigger_entries(&self) -> Vec<(ActionId, Vec<CanonicalEvent>)> {
        actions::ACTION_IDS
            .iter()
            .map(|&id| {
                let triggers = self
                    .triggers
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| actions::default_triggers(id));
                (id, triggers)
            })
            .collect()
    }

    /// `[triggers]` keys that name no action; these are ignored.
    pub fn unknown_trigger_actions(&self) -> Vec<&str> {
        self.triggers
            .keys()
            .map(String::as_str)
            .filter(|name| !actions::is_known(name))
            .collect()
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms.max(1))
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn service_config(&self) -> ServiceConfig {
        let bt = &self.bluetooth;
        ServiceConfig {
            alias: bt.alias.clone(),
            service_name: bt.service_name.clone(),
            service_description: bt.service_description.clone(),
            provider: bt.provider.clone(),
            psm: bt.psm.filter(|&psm| psm != 0),
            profile_path: bt.profile_path.clone(),
            tick: self.tick(),
        }
    }
}
