//! Configuration System using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults (`BotConfig::default()`)
//! 2. `botblocks.toml` (or an explicit path)
//! 3. Environment variables prefixed with `BOTBLOCKS__`, nested keys split on `__`
//!
//! # Example
//! ```no_run
//! use botblocks::config::BotConfig;
//!
//! let config = BotConfig::load()?;
//! println!("Device: {}", config.device.address);
//! # Ok::<(), botblocks::error::BotError>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppResult, BotError};
use crate::tracing_setup::OutputFormat;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "botblocks.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Remote device settings
    pub device: DeviceConfig,
    /// Interpreter pacing and event log settings
    pub interpreter: InterpreterConfig,
    /// Program persistence settings
    pub storage: StorageConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json); unknown names fail to load
    pub log_format: OutputFormat,
}

/// Remote device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Base URL of the device, e.g. `http://192.168.4.1`
    pub address: String,
    /// Pause after every dispatched command, in milliseconds
    pub settle_delay_ms: u64,
    /// Upper bound for an in-flight request before it is dropped, in milliseconds
    pub request_timeout_ms: u64,
}

/// Interpreter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Pause after every executed node, in milliseconds
    pub pacing_delay_ms: u64,
    /// Number of events retained by the event log
    pub event_buffer: usize,
}

/// Program storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON file per saved program slot
    pub program_dir: PathBuf,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "botblocks".to_string(),
            log_level: "info".to_string(),
            log_format: OutputFormat::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: "http://192.168.4.1".to_string(),
            settle_delay_ms: 50,
            request_timeout_ms: 2000,
        }
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            pacing_delay_ms: 50,
            event_buffer: 1000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            program_dir: PathBuf::from("programs"),
        }
    }
}

impl DeviceConfig {
    /// Settle delay as a `Duration`
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Request timeout as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl InterpreterConfig {
    /// Pacing delay as a `Duration`
    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }
}

impl BotConfig {
    /// Load configuration from `botblocks.toml` and environment variables
    ///
    /// A missing file is not an error; defaults apply.
    /// Example override: `BOTBLOCKS__DEVICE__ADDRESS=http://10.0.0.7`
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: BotConfig = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(BotConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("BOTBLOCKS__").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(BotError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if !self.device.address.starts_with("http://") {
            return Err(BotError::Configuration(format!(
                "Invalid device address '{}'. Must start with http://",
                self.device.address
            )));
        }

        if self.interpreter.event_buffer == 0 {
            return Err(BotError::Configuration(
                "interpreter.event_buffer must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
