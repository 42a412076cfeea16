//! Configuration management for the picture frame.
//!
//! Handles loading, saving, and validating configuration from JSON files.

use crate::control::Power;
use crate::input::{ButtonPins, InputSource};
use crate::render::SinkKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "/opt/sparky-screen/config.json";

/// Highest BCM pin number on the 40-pin header
const MAX_BCM_PIN: u8 = 27;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the images to cycle through
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,

    /// File extensions that count as media (case-insensitive)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Only accept files whose content looks like an image
    #[serde(default)]
    pub verify_format: bool,

    /// Web server port (control socket and viewer)
    #[serde(default = "default_web_port")]
    pub web_port: u16,

    /// Accept control messages over the network
    #[serde(default = "default_true")]
    pub network_enabled: bool,

    /// Button source
    #[serde(default)]
    pub input_source: InputSource,

    /// BCM pin of the next-image button
    #[serde(default = "default_toggle_pin")]
    pub toggle_pin: u8,

    /// BCM pin of the power button
    #[serde(default = "default_power_pin")]
    pub power_pin: u8,

    /// Button debounce in milliseconds
    #[serde(default = "default_button_debounce_ms")]
    pub button_debounce_ms: u64,

    /// Power state at startup
    #[serde(default)]
    pub initial_power: Power,

    /// Where render directives go
    #[serde(default)]
    pub render_sink: SinkKind,

    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("/opt/sparky-screen/gifs")
}

fn default_extensions() -> Vec<String> {
    vec!["gif".to_string()]
}

fn default_web_port() -> u16 {
    42069
}

fn default_true() -> bool {
    true
}

fn default_toggle_pin() -> u8 {
    crate::input::gpio::pins::TOGGLE
}

fn default_power_pin() -> u8 {
    crate::input::gpio::pins::POWER
}

fn default_button_debounce_ms() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media_dir: default_media_dir(),
            extensions: default_extensions(),
            verify_format: false,
            web_port: default_web_port(),
            network_enabled: true,
            input_source: InputSource::default(),
            toggle_pin: default_toggle_pin(),
            power_pin: default_power_pin(),
            button_debounce_ms: default_button_debounce_ms(),
            initial_power: Power::default(),
            render_sink: SinkKind::default(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file atomically
    ///
    /// Uses a write-to-temp-then-rename pattern so a power cut during the
    /// write never leaves a truncated file behind.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;

        // Write to temporary file first
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)?;

        // Atomic rename - either fully succeeds or fails, never partial
        std::fs::rename(&tmp_path, path).map_err(|e| {
            // Clean up temp file on rename failure
            let _ = std::fs::remove_file(&tmp_path);
            ConfigError::ReadError(e)
        })?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.web_port == 0 {
            return Err(ConfigError::ValidationError(
                "web_port must be greater than 0".to_string(),
            ));
        }

        if self.extensions.iter().all(|e| e.trim().trim_start_matches('.').is_empty()) {
            return Err(ConfigError::ValidationError(
                "at least one media extension is required".to_string(),
            ));
        }

        for (name, pin) in [("toggle_pin", self.toggle_pin), ("power_pin", self.power_pin)] {
            if pin > MAX_BCM_PIN {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be between 0 and {}",
                    name, MAX_BCM_PIN
                )));
            }
        }

        if self.toggle_pin == self.power_pin {
            return Err(ConfigError::ValidationError(
                "toggle_pin and power_pin must differ".to_string(),
            ));
        }

        if self.button_debounce_ms > 1000 {
            return Err(ConfigError::ValidationError(
                "button_debounce_ms must be at most 1000".to_string(),
            ));
        }

        Ok(())
    }

    /// GPIO pin assignment for the button source
    pub fn button_pins(&self) -> ButtonPins {
        ButtonPins {
            toggle: self.toggle_pin,
            power: self.power_pin,
            debounce: Duration::from_millis(self.button_debounce_ms),
        }
    }

    /// Message shown when there is nothing to display
    pub fn no_media_message(&self) -> String {
        format!(
            "No GIFs located in {}. Add some and they will show up.",
            self.media_dir.display()
        )
    }
}
