//! # Server Configuration
//!
//! One TOML file loaded at startup, every field optional, defaults
//! matching the shipped playground. The calibration and simulation
//! sections deserialize straight into the core's own config types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use phosphor_core::{CalibrationConfig, SimConfig};

/// Complete server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the viewer listener binds.
    pub bind_address: String,
    /// Remove a viewer's avatar (and free its wand) when the connection
    /// closes. Off by default: avatars outlive reconnects.
    pub reap_on_disconnect: bool,
    /// Calibration machine tuning.
    pub calibration: CalibrationConfig,
    /// Simulation tick tuning.
    pub simulation: SimConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_owned(),
            reap_on_disconnect: false,
            calibration: CalibrationConfig::default(),
            simulation: SimConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads a TOML config file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Read`] if the file is unreadable,
    /// [`ConfigError::Parse`] if it is not valid config TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Wall-clock period of one simulation tick.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.simulation.tick_rate))
    }
}

/// Configuration loading failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid config TOML.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Offending path.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}
