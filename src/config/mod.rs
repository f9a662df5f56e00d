//! Configuration and serialization module.

use crate::capture::{BitRange, CaptureError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration values the rig cannot run with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    BitRange(#[from] CaptureError),

    #[error("{device} resolution {width}x{height} must be non-zero")]
    EmptyResolution {
        device: &'static str,
        width: u32,
        height: u32,
    },
}

/// Scanner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Lowest Gray code bit captured.
    pub low_bit: u32,
    /// Highest Gray code bit captured.
    pub high_bit: u32,
    /// Projector output.
    pub projector: ProjectorConfig,
    /// Camera sensor (and lighting for the simulated rig).
    pub camera: CameraConfig,
    /// Emit intermediate previews while capturing.
    pub preview: bool,
    /// Where the decoded index map is written.
    pub output: PathBuf,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            low_bit: 0,
            high_bit: 9,
            projector: ProjectorConfig::default(),
            camera: CameraConfig::default(),
            preview: true,
            output: PathBuf::from("decoded.png"),
        }
    }
}

impl ScannerConfig {
    /// Validated bit range.
    pub fn bit_range(&self) -> Result<BitRange, CaptureError> {
        BitRange::new(self.low_bit, self.high_bit)
    }

    /// Check every value the rig depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bit_range()?;
        let resolutions = [
            ("projector", self.projector.width, self.projector.height),
            ("camera", self.camera.width, self.camera.height),
        ];
        for (device, width, height) in resolutions {
            if width == 0 || height == 0 {
                return Err(ConfigError::EmptyResolution { device, width, height });
            }
        }
        Ok(())
    }
}

/// Projector output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    /// Native resolution width.
    pub width: u32,
    /// Native resolution height.
    pub height: u32,
    /// Brightness of lit pattern columns.
    pub max_brightness: u8,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            max_brightness: 255,
        }
    }
}

/// Camera configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    /// Constant scene light (0-255).
    pub ambient: u8,
    /// Reflected fraction of projector light (0.0-1.0).
    pub gain: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            ambient: 20,
            gain: 0.7,
        }
    }
}

/// Load scanner configuration. `.json` files are read as JSON, anything else as XML.
pub fn load_config(path: &Path) -> std::io::Result<ScannerConfig> {
    let contents = std::fs::read_to_string(path)?;

    if path.extension().map(|e| e == "json").unwrap_or(false) {
        serde_json::from_str(&contents).map_err(std::io::Error::other)
    } else {
        quick_xml::de::from_str(&contents).map_err(std::io::Error::other)
    }
}
