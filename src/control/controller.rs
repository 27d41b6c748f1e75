// SPDX-License-Identifier: GPL-3.0-only

//! The single command interface shared by every control surface

use super::{Command, PipelineController, WhiteBalanceController, WhiteBalanceMode};
use crate::backends::camera::{CaptureConfig, TransportState, ZoomLevel};
use crate::errors::{AppResult, PipelineError};
use tracing::{debug, warn};

/// Read-only view of the controller for status displays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerStatus {
    /// `None` when video is unavailable for this session
    pub transport: Option<TransportState>,
    pub resolution: Option<CaptureConfig>,
    pub zoom: Option<ZoomLevel>,
    pub white_balance: WhiteBalanceMode,
}

/// Owns the pipeline and white balance controllers on the control loop thread
pub struct Controller {
    pipeline: Option<PipelineController>,
    white_balance: WhiteBalanceController,
}

impl Controller {
    /// `pipeline` is `None` when the live view could not be built; every
    /// other operation keeps working.
    pub fn new(pipeline: Option<PipelineController>, white_balance: WhiteBalanceController) -> Self {
        if pipeline.is_none() {
            warn!("Video unavailable, transport commands will be rejected");
        }
        Self {
            pipeline,
            white_balance,
        }
    }

    /// Run `command` to completion. Failures are logged and returned.
    pub fn execute(&mut self, command: Command) -> AppResult<()> {
        debug!(%command, "Executing command");
        let result = match command {
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::Stop => self.stop(),
            Command::ZoomCycle => self.zoom_cycle().map(|_| ()),
            Command::ToggleAwb => self.toggle_awb().map(|_| ()),
        };
        if let Err(e) = &result {
            warn!(%command, error = %e, "Command failed");
        }
        result
    }

    pub fn play(&mut self) -> AppResult<()> {
        Ok(self.video()?.play()?)
    }

    pub fn pause(&mut self) -> AppResult<()> {
        Ok(self.video()?.pause()?)
    }

    pub fn stop(&mut self) -> AppResult<()> {
        Ok(self.video()?.stop()?)
    }

    pub fn zoom_cycle(&mut self) -> AppResult<ZoomLevel> {
        Ok(self.video()?.zoom_cycle()?)
    }

    pub fn set_resolution(&mut self, config: CaptureConfig) -> AppResult<()> {
        Ok(self.video()?.set_resolution(config)?)
    }

    pub fn toggle_awb(&mut self) -> AppResult<WhiteBalanceMode> {
        Ok(self.white_balance.toggle(self.pipeline.as_mut())?)
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            transport: self.pipeline.as_ref().map(PipelineController::state),
            resolution: self.pipeline.as_ref().map(PipelineController::capture_config),
            zoom: self.pipeline.as_ref().map(PipelineController::zoom),
            white_balance: self.white_balance.mode(),
        }
    }

    /// Stop and release the live view; later transport commands fail with
    /// [`PipelineError::Unavailable`].
    pub fn shutdown_video(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take()
            && let Err(e) = pipeline.stop()
        {
            warn!(error = %e, "Failed to stop pipeline during shutdown");
        }
    }

    fn video(&mut self) -> Result<&mut PipelineController, PipelineError> {
        self.pipeline.as_mut().ok_or(PipelineError::Unavailable)
    }
}
