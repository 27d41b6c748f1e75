// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for the video pipeline and its controllers

use crate::constants::zoom;
use serde::{Deserialize, Serialize};

/// Transport state of the video pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportState {
    /// No resources held
    #[default]
    Null,
    /// Geometry applied, device not streaming
    Ready,
    /// Streaming, frames held
    Paused,
    /// Streaming to the display
    Playing,
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportState::Null => write!(f, "stopped"),
            TransportState::Ready => write!(f, "ready"),
            TransportState::Paused => write!(f, "paused"),
            TransportState::Playing => write!(f, "playing"),
        }
    }
}

impl From<TransportState> for gstreamer::State {
    fn from(state: TransportState) -> Self {
        match state {
            TransportState::Null => gstreamer::State::Null,
            TransportState::Ready => gstreamer::State::Ready,
            TransportState::Paused => gstreamer::State::Paused,
            TransportState::Playing => gstreamer::State::Playing,
        }
    }
}

/// Capture resolution requested from the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl CaptureConfig {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::new(
            crate::constants::video::DEFAULT_WIDTH,
            crate::constants::video::DEFAULT_HEIGHT,
        )
    }
}

impl std::fmt::Display for CaptureConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for CaptureConfig {
    type Err = String;

    /// Parse `WIDTHxHEIGHT`, e.g. `1920x1080`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid width '{}': {}", w, e))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid height '{}': {}", h, e))?;
        if width == 0 || height == 0 {
            return Err(format!("resolution must be non-zero, got '{}'", s));
        }
        Ok(Self { width, height })
    }
}

/// Pixel margins removed from each edge of the captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CropWindow {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl CropWindow {
    /// Same margin on every edge
    pub const fn uniform(margin: u32) -> Self {
        Self {
            left: margin,
            right: margin,
            top: margin,
            bottom: margin,
        }
    }

    /// True when nothing is cropped
    pub fn is_empty(&self) -> bool {
        self.left == 0 && self.right == 0 && self.top == 0 && self.bottom == 0
    }

    /// Whether a non-empty picture remains after cropping a frame of `config` size
    pub fn fits(&self, config: &CaptureConfig) -> bool {
        let horizontal = u64::from(self.left) + u64::from(self.right);
        let vertical = u64::from(self.top) + u64::from(self.bottom);
        horizontal < u64::from(config.width) && vertical < u64::from(config.height)
    }
}

/// Index into the zoom preset table
///
/// Always within `[0, PRESETS.len())`; advancing wraps around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ZoomLevel(usize);

impl ZoomLevel {
    /// Number of presets in the cycle
    pub const COUNT: usize = zoom::PRESETS.len();

    /// Level for a preset index, wrapped into range
    pub fn new(index: usize) -> Self {
        Self(index % Self::COUNT)
    }

    pub fn index(self) -> usize {
        self.0
    }

    /// The following preset, wrapping back to 0 after the last one
    pub fn next(self) -> Self {
        Self((self.0 + 1) % Self::COUNT)
    }

    /// Crop margins for this preset
    pub fn crop(self) -> CropWindow {
        zoom::PRESETS[self.0]
    }
}

impl std::fmt::Display for ZoomLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.0, Self::COUNT - 1)
    }
}

/// Encoding delivered by the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SourceFormat {
    /// Uncompressed frames (`video/x-raw`)
    #[default]
    Raw,
    /// Motion JPEG (`image/jpeg`), decoded in the pipeline
    Mjpeg,
}

impl SourceFormat {
    /// Caps media type requested from the source
    pub fn media_type(self) -> &'static str {
        match self {
            SourceFormat::Raw => "video/x-raw",
            SourceFormat::Mjpeg => "image/jpeg",
        }
    }
}
