// SPDX-License-Identifier: GPL-3.0-only

//! Session wiring
//!
//! A [`Session`] builds the live view, the white balance controller and the
//! keypad monitor from a [`Config`], connects the keypad to the control
//! queue, and tears everything down in a fixed order:
//!
//! 1. stop the keypad monitor (no more producer thread),
//! 2. close the control queue and drop what is still queued,
//! 3. stop and release the live view,
//! 4. close the camera control handle.
//!
//! Failure to build the live view or to open the keypad degrades the
//! session instead of aborting it.

use crate::backends::camera::{
    CropWindow, FrameSource, GstFrameGrabber, GstVideoPipeline, ImageFileSource, PipelineSettings,
    V4l2ControlPort,
};
use crate::backends::gpio::{ExpanderOpener, Ft232hSettings, HardwareInputMonitor, KeypadStatus};
use crate::config::Config;
use crate::control::{
    ControlEvent, ControlLoop, Controller, EventDispatcher, LoopExit, PipelineController,
    WhiteBalanceController, event_queue,
};
use crate::errors::GpioError;
use tracing::{error, info, warn};

/// Running control session
pub struct Session<O: ExpanderOpener = Ft232hSettings> {
    monitor: Option<HardwareInputMonitor<O>>,
    control: ControlLoop,
    dispatcher: EventDispatcher,
    controller: Option<Controller>,
    keypad_error: Option<GpioError>,
}

impl Session<Ft232hSettings> {
    /// Build every component from `config` and start the live view
    pub fn start(config: &Config) -> Self {
        info!(device = %config.video_device, resolution = %config.capture, "Starting session");

        let controller = Controller::new(build_live_view(config), build_white_balance(config));

        let monitor = config.keypad.enabled.then(|| {
            HardwareInputMonitor::new(config.keypad.settings())
                .with_poll_interval(config.keypad.poll_interval())
        });
        if monitor.is_none() {
            info!("Keypad disabled");
        }

        Self::from_parts(controller, monitor)
    }
}

impl<O: ExpanderOpener> Session<O> {
    /// Assemble a session from prepared parts and start the keypad monitor
    pub fn from_parts(controller: Controller, monitor: Option<HardwareInputMonitor<O>>) -> Self {
        let (dispatcher, control) = event_queue();
        let mut session = Self {
            monitor,
            control,
            dispatcher,
            controller: Some(controller),
            keypad_error: None,
        };
        session.start_keypad();
        session
    }

    /// (Re)start the keypad monitor, e.g. after it lost the device
    pub fn start_keypad(&mut self) {
        let Some(monitor) = self.monitor.as_mut() else {
            return;
        };

        let dispatcher = self.dispatcher.clone();
        match monitor.start(move |button| {
            dispatcher.dispatch(ControlEvent::Button(button));
        }) {
            Ok(()) => self.keypad_error = None,
            Err(e) => {
                warn!(error = %e, "Keypad unavailable, continuing without hardware buttons");
                self.keypad_error = Some(e);
            }
        }
    }

    /// Handle for producers outside the control loop
    pub fn dispatcher(&self) -> EventDispatcher {
        self.dispatcher.clone()
    }

    pub fn controller(&self) -> Option<&Controller> {
        self.controller.as_ref()
    }

    pub fn controller_mut(&mut self) -> Option<&mut Controller> {
        self.controller.as_mut()
    }

    pub fn keypad_status(&self) -> Option<KeypadStatus> {
        self.monitor.as_ref().map(HardwareInputMonitor::status)
    }

    /// Why the keypad failed to start, if it did
    pub fn keypad_error(&self) -> Option<&GpioError> {
        self.keypad_error.as_ref()
    }

    /// Handle queued events without blocking
    pub fn process_pending(&mut self) -> Option<LoopExit> {
        let controller = self.controller.as_mut()?;
        self.control.process_pending(controller)
    }

    /// Handle events until a shutdown event arrives
    pub fn run(&mut self) -> LoopExit {
        match self.controller.as_mut() {
            Some(controller) => self.control.run(controller),
            None => LoopExit::Shutdown,
        }
    }

    /// Tear down in order. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(monitor) = self.monitor.as_mut() {
            monitor.stop();
        }

        self.control.close();
        self.control.discard_pending();

        if let Some(mut controller) = self.controller.take() {
            controller.shutdown_video();
            // Dropping the controller closes the camera control handle
            drop(controller);
            info!("Session shut down");
        }
    }
}

impl<O: ExpanderOpener> Drop for Session<O> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Build the live view and start it. `None` when GStreamer cannot build it.
fn build_live_view(config: &Config) -> Option<PipelineController> {
    let settings = PipelineSettings {
        device_path: config.video_device.clone(),
        source_format: config.source_format,
        sink: config.video_sink.clone(),
    };

    let pipeline = match GstVideoPipeline::new(&settings) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!(error = %e, "Video unavailable");
            return None;
        }
    };

    let mut controller = PipelineController::new(Box::new(pipeline), config.capture);
    if let Err(e) = controller.configure(config.capture, CropWindow::default()) {
        warn!(error = %e, "Initial configuration rejected");
    } else if let Err(e) = controller.play() {
        warn!(error = %e, "Failed to start live view");
    }
    Some(controller)
}

fn build_white_balance(config: &Config) -> WhiteBalanceController {
    let port = Box::new(V4l2ControlPort::new(&config.video_device));
    let mut white_balance = WhiteBalanceController::new(port, calibration_source(config))
        .with_snapshot_dir(config.calibration.snapshot_dir.clone());

    if let Err(e) = white_balance.apply(config.initial_white_balance.into()) {
        warn!(error = %e, "Failed to set initial white balance");
    }
    white_balance
}

/// Frame source for calibration and snapshots
pub fn calibration_source(config: &Config) -> Box<dyn FrameSource> {
    match &config.calibration.image {
        Some(path) => Box::new(ImageFileSource::new(path.clone())),
        None => Box::new(
            GstFrameGrabber::new(&config.video_device, config.source_format, config.capture)
                .with_warmup_frames(config.calibration.warmup_frames)
                .with_timeout(config.calibration_timeout()),
        ),
    }
}
