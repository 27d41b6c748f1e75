// SPDX-License-Identifier: GPL-3.0-only

//! Keypad monitor and session teardown tests against a scripted expander

use image::RgbImage;
use mivonix::Session;
use mivonix::backends::camera::{
    CameraControl, CaptureConfig, CropWindow, DeviceControlPort, FrameSource, TransportState,
    VideoPipeline,
};
use mivonix::backends::gpio::{
    ExpanderOpener, GpioExpander, GpioSnapshot, HardwareInputMonitor, KeypadStatus,
};
use mivonix::control::{
    Command, ControlEvent, Controller, PipelineController, WhiteBalanceController,
};
use mivonix::errors::{CaptureError, ControlError, GpioError, PipelineError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Log = Arc<Mutex<Vec<&'static str>>>;

/// Replays a list of line levels, then holds the last one
struct ScriptedExpander {
    levels: VecDeque<u8>,
    log: Log,
}

impl GpioExpander for ScriptedExpander {
    fn read_snapshot(&mut self) -> Result<GpioSnapshot, GpioError> {
        let level = if self.levels.len() > 1 {
            self.levels.pop_front()
        } else {
            self.levels.front().copied()
        };
        Ok(GpioSnapshot(level.unwrap_or(0xFF)))
    }
}

impl Drop for ScriptedExpander {
    fn drop(&mut self) {
        self.log.lock().unwrap().push("keypad closed");
    }
}

struct ScriptedOpener {
    levels: Vec<u8>,
    log: Log,
    fail: bool,
}

impl ScriptedOpener {
    fn new(levels: &[u8], log: &Log) -> Self {
        Self {
            levels: levels.to_vec(),
            log: Arc::clone(log),
            fail: false,
        }
    }
}

impl ExpanderOpener for ScriptedOpener {
    type Expander = ScriptedExpander;

    fn open(&mut self) -> Result<ScriptedExpander, GpioError> {
        if self.fail {
            return Err(GpioError::DeviceOpen("no device 0403:6014".into()));
        }
        Ok(ScriptedExpander {
            levels: self.levels.iter().copied().collect(),
            log: Arc::clone(&self.log),
        })
    }
}

struct LoggingPipeline(Log);

impl VideoPipeline for LoggingPipeline {
    fn apply_geometry(&mut self, _: &CaptureConfig, _: &CropWindow) -> Result<(), PipelineError> {
        Ok(())
    }

    fn set_transport(&mut self, state: TransportState) -> Result<(), PipelineError> {
        if state == TransportState::Null {
            self.0.lock().unwrap().push("video stopped");
        }
        Ok(())
    }
}

struct LoggingPort(Log);

impl DeviceControlPort for LoggingPort {
    fn set_control(&mut self, _: CameraControl, _: i32) -> Result<(), ControlError> {
        Ok(())
    }
}

impl Drop for LoggingPort {
    fn drop(&mut self) {
        self.0.lock().unwrap().push("port closed");
    }
}

struct NoFrames;

impl FrameSource for NoFrames {
    fn grab_frame(&mut self) -> Result<RgbImage, CaptureError> {
        Err(CaptureError::NoFrame)
    }
}

fn controller(log: &Log) -> Controller {
    let pipeline = PipelineController::new(
        Box::new(LoggingPipeline(Arc::clone(log))),
        CaptureConfig::new(640, 480),
    );
    let white_balance =
        WhiteBalanceController::new(Box::new(LoggingPort(Arc::clone(log))), Box::new(NoFrames));
    Controller::new(Some(pipeline), white_balance)
}

fn monitor(opener: ScriptedOpener) -> HardwareInputMonitor<ScriptedOpener> {
    HardwareInputMonitor::new(opener).with_poll_interval(Duration::from_millis(1))
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..1000 {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn test_press_sequence_reports_each_falling_edge_once() {
    let log = Log::default();
    let levels = [0xFF, 0xFB, 0xFB, 0xFF, 0xFB, 0xF0, 0xF0, 0xFF];
    let mut monitor = monitor(ScriptedOpener::new(&levels, &log));

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    monitor
        .start(move |event| sink.lock().unwrap().push(event.id))
        .unwrap();

    assert!(wait_until(|| events.lock().unwrap().len() >= 5));
    // Idle lines must not produce anything further
    std::thread::sleep(Duration::from_millis(30));
    monitor.stop();

    assert_eq!(*events.lock().unwrap(), vec![1, 1, 2, 3, 4]);
    assert_eq!(*log.lock().unwrap(), vec!["keypad closed"]);
}

#[test]
fn test_open_failure_is_reported_to_caller() {
    let log = Log::default();
    let mut opener = ScriptedOpener::new(&[], &log);
    opener.fail = true;
    let mut monitor = monitor(opener);

    assert!(matches!(monitor.start(|_| {}), Err(GpioError::DeviceOpen(_))));
    assert!(!monitor.is_running());
    assert_eq!(monitor.status(), KeypadStatus::Stopped);
    monitor.stop();
}

#[test]
fn test_keypad_press_reaches_pipeline() {
    let log = Log::default();
    let keypad = monitor(ScriptedOpener::new(&[0xFF, 0xFB], &log));
    let mut session = Session::from_parts(controller(&log), Some(keypad));
    assert_eq!(session.keypad_status(), Some(KeypadStatus::Running));

    let playing = wait_until(|| {
        session.process_pending();
        session.controller().and_then(|c| c.status().transport) == Some(TransportState::Playing)
    });
    assert!(playing);
    session.shutdown();
}

#[test]
fn test_shutdown_order() {
    let log = Log::default();
    let keypad = monitor(ScriptedOpener::new(&[0xFF], &log));
    let mut session = Session::from_parts(controller(&log), Some(keypad));

    session
        .controller_mut()
        .unwrap()
        .execute(Command::Play)
        .unwrap();
    let dispatcher = session.dispatcher();
    assert!(dispatcher.dispatch(ControlEvent::Command(Command::Pause)));

    session.shutdown();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["keypad closed", "video stopped", "port closed"]
    );
    assert_eq!(session.keypad_status(), Some(KeypadStatus::Stopped));
    assert!(session.controller().is_none());
    assert!(!dispatcher.is_open());
    assert!(!dispatcher.dispatch(ControlEvent::Command(Command::Play)));

    // A second shutdown does nothing
    session.shutdown();
    assert_eq!(log.lock().unwrap().len(), 3);
}

#[test]
fn test_session_without_keypad_device() {
    let log = Log::default();
    let mut opener = ScriptedOpener::new(&[], &log);
    opener.fail = true;
    let mut session = Session::from_parts(controller(&log), Some(monitor(opener)));

    assert!(matches!(session.keypad_error(), Some(GpioError::DeviceOpen(_))));
    assert_eq!(session.keypad_status(), Some(KeypadStatus::Stopped));

    // Other control surfaces keep working
    session.dispatcher().dispatch(ControlEvent::Command(Command::Play));
    assert_eq!(session.process_pending(), None);
    assert_eq!(
        session.controller().and_then(|c| c.status().transport),
        Some(TransportState::Playing)
    );
}
