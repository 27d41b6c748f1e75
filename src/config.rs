// SPDX-License-Identifier: GPL-3.0-only

//! Persisted settings
//!
//! Stored as pretty printed JSON in `<config dir>/mivonix/config.json`.
//! Missing fields take their defaults, so older files keep loading.

use crate::backends::camera::{CaptureConfig, SourceFormat};
use crate::backends::gpio::Ft232hSettings;
use crate::constants::{keypad, timing, video};
use crate::control::WhiteBalanceMode;
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// White balance mode applied at startup
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum InitialWhiteBalance {
    /// Leave the camera in automatic mode
    #[default]
    Auto,
    /// Fixed color temperature in Kelvin, clamped to what the camera accepts
    Manual(u32),
}

impl From<InitialWhiteBalance> for WhiteBalanceMode {
    fn from(value: InitialWhiteBalance) -> Self {
        match value {
            InitialWhiteBalance::Auto => WhiteBalanceMode::Auto,
            InitialWhiteBalance::Manual(kelvin) => WhiteBalanceMode::Manual(kelvin),
        }
    }
}

/// Keypad expander settings
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeypadConfig {
    /// Start the keypad monitor with the session
    pub enabled: bool,
    pub vendor_id: u16,
    pub product_id: u16,
    pub poll_interval_ms: u64,
    /// Bound for a single pin read
    pub read_timeout_ms: u64,
}

impl Default for KeypadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vendor_id: keypad::VENDOR_ID,
            product_id: keypad::PRODUCT_ID,
            poll_interval_ms: keypad::POLL_INTERVAL.as_millis() as u64,
            read_timeout_ms: keypad::READ_TIMEOUT.as_millis() as u64,
        }
    }
}

impl KeypadConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settings(&self) -> Ft232hSettings {
        Ft232hSettings {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }
}

/// Calibration frame settings
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Frames dropped before the calibration frame
    pub warmup_frames: u32,
    /// Wait per frame
    pub timeout_ms: u64,
    /// Read calibration frames from this still image instead of the camera
    pub image: Option<PathBuf>,
    /// Keep every calibration frame as a JPEG in this directory
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            warmup_frames: timing::CALIBRATION_WARMUP_FRAMES,
            timeout_ms: timing::CALIBRATION_SAMPLE_TIMEOUT.as_millis() as u64,
            image: None,
            snapshot_dir: None,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera node used for video and controls
    pub video_device: String,
    /// Capture resolution
    pub capture: CaptureConfig,
    /// Encoding requested from the camera
    pub source_format: SourceFormat,
    /// Display sink element
    pub video_sink: String,
    pub keypad: KeypadConfig,
    pub calibration: CalibrationConfig,
    pub initial_white_balance: InitialWhiteBalance,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            video_device: video::DEFAULT_DEVICE.to_string(),
            capture: CaptureConfig::default(),
            source_format: SourceFormat::default(),
            video_sink: video::DEFAULT_SINK.to_string(),
            keypad: KeypadConfig::default(),
            calibration: CalibrationConfig::default(),
            initial_white_balance: InitialWhiteBalance::default(),
        }
    }
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mivonix").join("config.json"))
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No configuration file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let config = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Invalid {}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Write to `path`, creating the parent directory
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    pub fn calibration_timeout(&self) -> Duration {
        Duration::from_millis(self.calibration.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{ "video_device": "/dev/video4" }"#).unwrap();
        assert_eq!(config.video_device, "/dev/video4");
        assert_eq!(config.capture, CaptureConfig::new(1280, 720));
        assert!(config.keypad.enabled);
    }

    #[test]
    fn test_keypad_settings() {
        let keypad = KeypadConfig {
            read_timeout_ms: 40,
            ..KeypadConfig::default()
        };
        let settings = keypad.settings();
        assert_eq!(settings.vendor_id, 0x0403);
        assert_eq!(settings.timeout, Duration::from_millis(40));
        assert_eq!(keypad.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_initial_white_balance_manual() {
        let config: Config =
            serde_json::from_str(r#"{ "initial_white_balance": { "Manual": 5600 } }"#).unwrap();
        assert_eq!(config.initial_white_balance, InitialWhiteBalance::Manual(5600));
        assert_eq!(
            WhiteBalanceMode::from(config.initial_white_balance),
            WhiteBalanceMode::Manual(5600)
        );
    }
}
