// SPDX-License-Identifier: GPL-3.0-only

//! Auto white balance toggle
//!
//! Leaving auto mode needs a manual color temperature. It is estimated from
//! a calibration frame taken while the live view is stopped (the camera node
//! cannot be shared with the live pipeline). The frame is captured and
//! estimated before any control is written, so a failed capture or estimate
//! leaves the device and the mode exactly as they were.
//!
//! Some cameras only latch the white balance mode when a stream starts, so
//! a live view that was streaming is restarted after every toggle.

use super::PipelineController;
use crate::backends::camera::capture::{self, FrameSource};
use crate::backends::camera::{CameraControl, DeviceControlPort, TransportState};
use crate::constants::white_balance::{MAX_KELVIN, MIN_KELVIN};
use crate::errors::{EstimationError, WhiteBalanceError};
use crate::media::color_temperature;
use image::RgbImage;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Current white balance mode of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhiteBalanceMode {
    /// Device adjusts white balance itself
    #[default]
    Auto,
    /// Fixed color temperature in Kelvin, within `[MIN_KELVIN, MAX_KELVIN]`
    Manual(u32),
}

impl std::fmt::Display for WhiteBalanceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WhiteBalanceMode::Auto => write!(f, "auto"),
            WhiteBalanceMode::Manual(kelvin) => write!(f, "manual {}K", kelvin),
        }
    }
}

/// Frame to Kelvin estimator
pub type Estimator = Box<dyn Fn(&RgbImage) -> Result<u32, EstimationError> + Send>;

/// Drives the auto/manual white balance switch on the camera
pub struct WhiteBalanceController {
    mode: WhiteBalanceMode,
    port: Box<dyn DeviceControlPort>,
    frames: Box<dyn FrameSource>,
    estimator: Estimator,
    snapshot_dir: Option<PathBuf>,
}

impl WhiteBalanceController {
    /// Controller in auto mode using the chroma based estimator
    pub fn new(port: Box<dyn DeviceControlPort>, frames: Box<dyn FrameSource>) -> Self {
        Self {
            mode: WhiteBalanceMode::Auto,
            port,
            frames,
            estimator: Box::new(color_temperature::estimate),
            snapshot_dir: None,
        }
    }

    /// Replace the estimator
    pub fn with_estimator(mut self, estimator: Estimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Keep a JPEG of every calibration frame in `dir`
    pub fn with_snapshot_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.snapshot_dir = dir;
        self
    }

    pub fn mode(&self) -> WhiteBalanceMode {
        self.mode
    }

    /// Switch between auto and manual white balance.
    ///
    /// `pipeline` is the live view, if video is available. It is stopped while
    /// the calibration frame is taken and restarted afterwards only when it
    /// was `Playing` or `Paused` before; a `Null` or `Ready` live view stays
    /// stopped. On error the mode is unchanged.
    pub fn toggle(
        &mut self,
        mut pipeline: Option<&mut PipelineController>,
    ) -> Result<WhiteBalanceMode, WhiteBalanceError> {
        let previous = pipeline.as_deref().map(PipelineController::state);

        if let Some(pc) = pipeline.as_deref_mut()
            && let Err(e) = pc.stop()
        {
            warn!(error = %e, "Failed to stop live view before white balance change");
        }

        let result = match self.mode {
            WhiteBalanceMode::Auto => self.enter_manual(),
            WhiteBalanceMode::Manual(_) => self.enter_auto(),
        };

        if let (Some(pc), Some(previous)) = (pipeline, previous) {
            resume(pc, previous);
        }

        match &result {
            Ok(mode) => info!(%mode, "White balance changed"),
            Err(e) => warn!(mode = %self.mode, error = %e, "White balance change aborted"),
        }
        result
    }

    /// Write `mode` to the device without calibration, e.g. at startup
    pub fn apply(&mut self, mode: WhiteBalanceMode) -> Result<(), WhiteBalanceError> {
        match mode {
            WhiteBalanceMode::Auto => {
                self.enter_auto()?;
            }
            WhiteBalanceMode::Manual(kelvin) => {
                let kelvin = self.device_kelvin(kelvin);
                self.write_manual(kelvin)?;
            }
        }
        info!(mode = %self.mode, "White balance applied");
        Ok(())
    }

    fn enter_manual(&mut self) -> Result<WhiteBalanceMode, WhiteBalanceError> {
        let frame = self.frames.grab_frame()?;
        self.keep_snapshot(&frame);

        let estimate = (self.estimator)(&frame)?;
        let kelvin = self.device_kelvin(estimate);
        debug!(estimate, kelvin, "Estimated color temperature");

        self.write_manual(kelvin)?;
        Ok(self.mode)
    }

    /// Switch auto off and write `kelvin`. Auto is switched back on if the
    /// temperature is refused.
    fn write_manual(&mut self, kelvin: u32) -> Result<(), WhiteBalanceError> {
        self.port.set_control(CameraControl::AutoWhiteBalance, 0)?;
        if let Err(e) = self.port.set_control(CameraControl::WhiteBalanceTemperature, kelvin as i32) {
            if let Err(restore) = self.port.set_control(CameraControl::AutoWhiteBalance, 1) {
                warn!(error = %restore, "Failed to re-enable auto white balance");
            }
            self.mode = WhiteBalanceMode::Auto;
            return Err(e.into());
        }

        self.mode = WhiteBalanceMode::Manual(kelvin);
        Ok(())
    }

    fn enter_auto(&mut self) -> Result<WhiteBalanceMode, WhiteBalanceError> {
        self.port.set_control(CameraControl::AutoWhiteBalance, 1)?;
        self.mode = WhiteBalanceMode::Auto;
        Ok(self.mode)
    }

    /// Clamp to the supported range and to what the driver advertises
    fn device_kelvin(&mut self, estimate: u32) -> u32 {
        let mut kelvin = estimate.clamp(MIN_KELVIN, MAX_KELVIN);

        if let Some(range) = self.port.control_range(CameraControl::WhiteBalanceTemperature) {
            let low = u32::try_from(range.minimum).unwrap_or(MIN_KELVIN).max(MIN_KELVIN);
            let high = u32::try_from(range.maximum).unwrap_or(MAX_KELVIN).min(MAX_KELVIN);
            if low <= high && !(low..=high).contains(&kelvin) {
                debug!(kelvin, low, high, "Estimate outside driver range");
                kelvin = kelvin.clamp(low, high);
            }
        }
        kelvin
    }

    fn keep_snapshot(&self, frame: &RgbImage) {
        if let Some(dir) = &self.snapshot_dir
            && let Err(e) = capture::save_snapshot(frame, dir)
        {
            warn!(error = %e, "Failed to keep calibration frame");
        }
    }
}

/// Bring the live view back after a toggle
fn resume(pipeline: &mut PipelineController, previous: TransportState) {
    let result = match previous {
        TransportState::Playing => pipeline.play(),
        TransportState::Paused => pipeline.play().and_then(|()| pipeline.pause()),
        TransportState::Null | TransportState::Ready => Ok(()),
    };
    if let Err(e) = result {
        warn!(state = %previous, error = %e, "Failed to restart live view");
    }
}
