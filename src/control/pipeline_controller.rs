// SPDX-License-Identifier: GPL-3.0-only

//! Transport state machine for the live view
//!
//! ```text
//!            configure            play
//!   Null ──────────────▶ Ready ─────────▶ Playing ◀──▶ Paused
//!    ▲                                        │   pause/play
//!    └──────────────────── stop ──────────────┘ (from any state)
//! ```
//!
//! Geometry never changes on a streaming pipeline. Zoom and resolution
//! changes run as stop, configure, play; if the new geometry is rejected the
//! previous transport state is restored and the stored geometry is kept.

use crate::backends::camera::{CaptureConfig, CropWindow, TransportState, VideoPipeline, ZoomLevel};
use crate::errors::PipelineError;
use tracing::{debug, info, warn};

/// Owns the live view pipeline and the geometry applied to it
pub struct PipelineController {
    pipeline: Box<dyn VideoPipeline>,
    state: TransportState,
    config: CaptureConfig,
    crop: CropWindow,
    zoom: ZoomLevel,
}

impl PipelineController {
    /// Wrap `pipeline` in the `Null` state.
    ///
    /// `config` is only the pending geometry: nothing is applied to the
    /// pipeline until the first `configure()`, and `capture_config()`
    /// reports it as requested rather than applied until then.
    pub fn new(pipeline: Box<dyn VideoPipeline>, config: CaptureConfig) -> Self {
        let zoom = ZoomLevel::default();
        Self {
            pipeline,
            state: TransportState::Null,
            config,
            crop: zoom.crop(),
            zoom,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Capture resolution; the pending one until the first `configure()`
    pub fn capture_config(&self) -> CaptureConfig {
        self.config
    }

    pub fn crop(&self) -> CropWindow {
        self.crop
    }

    pub fn zoom(&self) -> ZoomLevel {
        self.zoom
    }

    /// Apply capture resolution and crop. Not allowed while `Playing`.
    ///
    /// From `Null` the pipeline moves to `Ready`; from `Ready` or `Paused` the
    /// state is kept. A rejected geometry leaves state and geometry unchanged.
    pub fn configure(&mut self, config: CaptureConfig, crop: CropWindow) -> Result<(), PipelineError> {
        if self.state == TransportState::Playing {
            return Err(PipelineError::InvalidTransition {
                operation: "configure",
                state: self.state,
            });
        }

        if let Err(e) = self.pipeline.apply_geometry(&config, &crop) {
            warn!(resolution = %config, ?crop, error = %e, "Pipeline rejected geometry");
            return Err(e);
        }
        self.config = config;
        self.crop = crop;

        if self.state == TransportState::Null {
            self.transition(TransportState::Ready)?;
        }

        info!(resolution = %config, ?crop, state = %self.state, "Pipeline configured");
        Ok(())
    }

    /// Start streaming. No-op while already `Playing`.
    ///
    /// A refused start leaves the pipeline stopped.
    pub fn play(&mut self) -> Result<(), PipelineError> {
        if self.state == TransportState::Playing {
            debug!("Already playing");
            return Ok(());
        }

        if let Err(e) = self.transition(TransportState::Playing) {
            if let Err(stop_err) = self.pipeline.set_transport(TransportState::Null) {
                warn!(error = %stop_err, "Failed to release pipeline after refused start");
            }
            self.state = TransportState::Null;
            return Err(e);
        }

        info!(resolution = %self.config, zoom = %self.zoom, "Playing");
        Ok(())
    }

    /// Hold the current frame. Only valid while `Playing`.
    pub fn pause(&mut self) -> Result<(), PipelineError> {
        if self.state != TransportState::Playing {
            return Err(PipelineError::InvalidTransition {
                operation: "pause",
                state: self.state,
            });
        }
        self.transition(TransportState::Paused)?;
        info!("Paused");
        Ok(())
    }

    /// Release the device. The element wiring and geometry are kept.
    pub fn stop(&mut self) -> Result<(), PipelineError> {
        if self.state == TransportState::Null {
            debug!("Already stopped");
            return Ok(());
        }
        self.transition(TransportState::Null)?;
        info!("Stopped");
        Ok(())
    }

    /// Advance to the next zoom preset and restart with its crop.
    ///
    /// Once the crop is applied the new level is kept, even if the restart
    /// is then refused and the pipeline is left stopped.
    pub fn zoom_cycle(&mut self) -> Result<ZoomLevel, PipelineError> {
        let next = self.zoom.next();
        self.reconfigure(self.config, next.crop())?;
        self.zoom = next;
        info!(zoom = %next, crop = ?next.crop(), "Zoom changed");
        self.play()?;
        Ok(next)
    }

    /// Change the capture resolution, keeping the current crop
    pub fn set_resolution(&mut self, config: CaptureConfig) -> Result<(), PipelineError> {
        self.reconfigure(config, self.crop)?;
        info!(resolution = %config, "Resolution changed");
        self.play()
    }

    /// Stop and apply the geometry. On rejection the previous transport
    /// state is restored.
    fn reconfigure(&mut self, config: CaptureConfig, crop: CropWindow) -> Result<(), PipelineError> {
        let previous = self.state;
        self.stop()?;

        if let Err(e) = self.configure(config, crop) {
            self.restore(previous);
            return Err(e);
        }
        Ok(())
    }

    /// Best-effort return to `target` after an aborted reconfiguration
    fn restore(&mut self, target: TransportState) {
        let result = match target {
            TransportState::Null => Ok(()),
            TransportState::Ready => self.transition(TransportState::Ready),
            TransportState::Playing => self.play(),
            TransportState::Paused => self.play().and_then(|()| self.pause()),
        };
        if let Err(e) = result {
            warn!(state = %target, error = %e, "Failed to restore pipeline state");
        }
    }

    fn transition(&mut self, target: TransportState) -> Result<(), PipelineError> {
        debug!(from = %self.state, to = %target, "Pipeline transition");
        self.pipeline.set_transport(target).map_err(|e| {
            warn!(from = %self.state, to = %target, error = %e, "Pipeline state change failed");
            e
        })?;
        self.state = target;
        Ok(())
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        if self.state != TransportState::Null
            && let Err(e) = self.stop()
        {
            warn!(error = %e, "Failed to stop pipeline on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        transports: Vec<TransportState>,
        geometry: Vec<(CaptureConfig, CropWindow)>,
        fail_next_play: bool,
    }

    struct FakePipeline {
        calls: Arc<Mutex<Calls>>,
        reject_geometry: bool,
    }

    impl VideoPipeline for FakePipeline {
        fn apply_geometry(&mut self, config: &CaptureConfig, crop: &CropWindow) -> Result<(), PipelineError> {
            if self.reject_geometry || !crop.fits(config) {
                return Err(PipelineError::ConfigRejected("test".into()));
            }
            self.calls.lock().unwrap().geometry.push((*config, *crop));
            Ok(())
        }

        fn set_transport(&mut self, state: TransportState) -> Result<(), PipelineError> {
            let mut calls = self.calls.lock().unwrap();
            if state == TransportState::Playing && calls.fail_next_play {
                calls.fail_next_play = false;
                return Err(PipelineError::StateChange("busy".into()));
            }
            calls.transports.push(state);
            Ok(())
        }
    }

    fn controller(config: CaptureConfig) -> (PipelineController, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let pipeline = FakePipeline {
            calls: Arc::clone(&calls),
            reject_geometry: false,
        };
        (PipelineController::new(Box::new(pipeline), config), calls)
    }

    #[test]
    fn test_initial_state() {
        let (pc, calls) = controller(CaptureConfig::default());
        assert_eq!(pc.state(), TransportState::Null);
        assert_eq!(pc.zoom().index(), 0);
        assert!(calls.lock().unwrap().transports.is_empty());
    }

    #[test]
    fn test_pause_requires_playing() {
        let (mut pc, _) = controller(CaptureConfig::default());
        assert!(matches!(
            pc.pause(),
            Err(PipelineError::InvalidTransition { operation: "pause", .. })
        ));
        pc.play().unwrap();
        pc.pause().unwrap();
        assert_eq!(pc.state(), TransportState::Paused);
        pc.play().unwrap();
        assert_eq!(pc.state(), TransportState::Playing);
    }

    #[test]
    fn test_play_and_stop_not_repeated() {
        let (mut pc, calls) = controller(CaptureConfig::default());
        pc.play().unwrap();
        pc.play().unwrap();
        pc.stop().unwrap();
        pc.stop().unwrap();
        assert_eq!(
            calls.lock().unwrap().transports,
            vec![TransportState::Playing, TransportState::Null]
        );
    }

    #[test]
    fn test_configure_rejected_while_playing() {
        let (mut pc, _) = controller(CaptureConfig::default());
        pc.play().unwrap();
        assert!(matches!(
            pc.configure(CaptureConfig::new(640, 480), CropWindow::default()),
            Err(PipelineError::InvalidTransition { .. })
        ));
        assert_eq!(pc.capture_config(), CaptureConfig::default());
    }

    #[test]
    fn test_zoom_restarts_pipeline() {
        let (mut pc, calls) = controller(CaptureConfig::new(640, 480));
        pc.play().unwrap();
        calls.lock().unwrap().transports.clear();

        let level = pc.zoom_cycle().unwrap();
        assert_eq!(level.index(), 1);
        assert_eq!(pc.state(), TransportState::Playing);

        let calls = calls.lock().unwrap();
        assert_eq!(
            calls.transports,
            vec![TransportState::Null, TransportState::Ready, TransportState::Playing]
        );
        assert_eq!(calls.geometry.last(), Some(&(CaptureConfig::new(640, 480), CropWindow::uniform(50))));
    }

    #[test]
    fn test_rejected_zoom_keeps_previous_state() {
        // 320x240 cannot take the 150 px preset
        let (mut pc, _) = controller(CaptureConfig::new(320, 240));
        pc.zoom_cycle().unwrap();
        pc.zoom_cycle().unwrap();
        pc.pause().unwrap();

        assert!(matches!(pc.zoom_cycle(), Err(PipelineError::ConfigRejected(_))));
        assert_eq!(pc.zoom().index(), 2);
        assert_eq!(pc.crop(), CropWindow::uniform(100));
        assert_eq!(pc.state(), TransportState::Paused);
    }

    #[test]
    fn test_set_resolution_keeps_crop() {
        let (mut pc, calls) = controller(CaptureConfig::default());
        pc.zoom_cycle().unwrap();
        pc.set_resolution(CaptureConfig::new(1920, 1080)).unwrap();

        assert_eq!(pc.capture_config(), CaptureConfig::new(1920, 1080));
        assert_eq!(pc.crop(), CropWindow::uniform(50));
        assert_eq!(pc.state(), TransportState::Playing);
        assert_eq!(
            calls.lock().unwrap().geometry.last(),
            Some(&(CaptureConfig::new(1920, 1080), CropWindow::uniform(50)))
        );
    }

    #[test]
    fn test_refused_restart_keeps_zoom_in_step_with_crop() {
        let (mut pc, calls) = controller(CaptureConfig::new(640, 480));
        pc.play().unwrap();
        calls.lock().unwrap().fail_next_play = true;

        assert!(matches!(pc.zoom_cycle(), Err(PipelineError::StateChange(_))));
        assert_eq!(pc.state(), TransportState::Null);
        assert_eq!(pc.zoom().index(), 1);
        assert_eq!(pc.crop(), pc.zoom().crop());

        // The next press moves on instead of repeating the same preset
        assert_eq!(pc.zoom_cycle().unwrap().index(), 2);
        assert_eq!(pc.crop(), CropWindow::uniform(100));
        assert_eq!(pc.state(), TransportState::Playing);
    }
}
