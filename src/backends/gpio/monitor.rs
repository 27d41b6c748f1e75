// SPDX-License-Identifier: GPL-3.0-only

//! Background keypad polling
//!
//! The monitor opens the expander on the caller's thread so open and mode
//! errors are returned directly, then hands the expander to a
//! [`PollLoopController`] thread. That thread is the only code that ever
//! touches the device until it exits and closes it.
//!
//! Shutdown latency is bounded: every pin read is a control transfer with
//! a fixed timeout, and the wait between polls is interrupted by `stop()`.

use super::poll_loop::{LoopAction, PollLoopController};
use super::{ButtonEvent, ExpanderOpener, GpioExpander, GpioSnapshot};
use crate::constants::keypad;
use crate::errors::GpioError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info};

/// Observable state of the keypad input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypadStatus {
    /// Not started, or stopped by the owner
    Stopped,
    /// Polling thread active
    Running,
    /// Polling ended on a read error; needs an explicit restart
    Faulted,
}

impl std::fmt::Display for KeypadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeypadStatus::Stopped => write!(f, "off"),
            KeypadStatus::Running => write!(f, "active"),
            KeypadStatus::Faulted => write!(f, "lost"),
        }
    }
}

/// Per-thread polling state
struct PollState<E, F> {
    expander: E,
    previous: GpioSnapshot,
    callback: F,
    faulted: Arc<AtomicBool>,
}

impl<E, F> PollState<E, F>
where
    E: GpioExpander,
    F: FnMut(ButtonEvent),
{
    fn poll_once(&mut self) -> LoopAction {
        let current = match self.expander.read_snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "Keypad read failed, button input disabled until restart");
                self.faulted.store(true, Ordering::SeqCst);
                return LoopAction::Stop;
            }
        };

        if current != self.previous {
            debug!(previous = %self.previous, current = %current, "Keypad lines changed");
            for event in current.pressed_since(self.previous) {
                debug!(%event, "Button pressed");
                (self.callback)(event);
            }
            self.previous = current;
        }

        LoopAction::Continue
    }
}

/// Polls a GPIO expander on a background thread and reports button presses
pub struct HardwareInputMonitor<O: ExpanderOpener> {
    opener: O,
    poll_interval: Duration,
    controller: Option<PollLoopController>,
    faulted: Arc<AtomicBool>,
}

impl<O: ExpanderOpener> HardwareInputMonitor<O> {
    pub fn new(opener: O) -> Self {
        Self {
            opener,
            poll_interval: keypad::POLL_INTERVAL,
            controller: None,
            faulted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Override the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Open the expander and start polling.
    ///
    /// `callback` runs on the polling thread once per detected press, in line
    /// order, and must return quickly. Fails with
    /// [`GpioError::AlreadyRunning`] while a previous polling thread is alive.
    pub fn start<F>(&mut self, callback: F) -> Result<(), GpioError>
    where
        F: FnMut(ButtonEvent) + Send + 'static,
    {
        if self.is_running() {
            return Err(GpioError::AlreadyRunning);
        }
        // Reap a thread that ended on its own
        if let Some(mut finished) = self.controller.take() {
            finished.join();
        }

        let expander = self.opener.open()?;

        self.faulted.store(false, Ordering::SeqCst);
        let state = PollState {
            expander,
            previous: GpioSnapshot::RELEASED,
            callback,
            faulted: Arc::clone(&self.faulted),
        };

        self.controller = Some(PollLoopController::start(
            "keypad-monitor",
            self.poll_interval,
            state,
            PollState::poll_once,
        ));

        info!(interval_ms = self.poll_interval.as_millis() as u64, "Keypad monitor started");
        Ok(())
    }

    /// Stop polling and wait for the thread to exit.
    ///
    /// A read in progress is allowed to finish, so this returns within one
    /// read timeout. Clears a previous fault. No-op when the monitor is not
    /// running.
    pub fn stop(&mut self) {
        if let Some(mut controller) = self.controller.take() {
            controller.stop();
            info!("Keypad monitor stopped");
        }
        self.faulted.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.controller
            .as_ref()
            .is_some_and(PollLoopController::is_running)
    }

    pub fn status(&self) -> KeypadStatus {
        if self.is_running() {
            KeypadStatus::Running
        } else if self.faulted.load(Ordering::SeqCst) {
            KeypadStatus::Faulted
        } else {
            KeypadStatus::Stopped
        }
    }
}

impl<O: ExpanderOpener> Drop for HardwareInputMonitor<O> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedExpander {
        reads: VecDeque<Result<u8, GpioError>>,
    }

    impl GpioExpander for ScriptedExpander {
        fn read_snapshot(&mut self) -> Result<GpioSnapshot, GpioError> {
            // Hold the last level once the script runs out
            match self.reads.pop_front() {
                Some(read) => {
                    if self.reads.is_empty()
                        && let Ok(bits) = &read
                    {
                        self.reads.push_back(Ok(*bits));
                    }
                    read.map(GpioSnapshot)
                }
                None => Ok(GpioSnapshot::RELEASED),
            }
        }
    }

    struct ScriptedOpener {
        script: Vec<Result<u8, GpioError>>,
        opens: usize,
    }

    impl ExpanderOpener for ScriptedOpener {
        type Expander = ScriptedExpander;

        fn open(&mut self) -> Result<ScriptedExpander, GpioError> {
            self.opens += 1;
            Ok(ScriptedExpander {
                reads: self.script.iter().cloned().collect(),
            })
        }
    }

    fn monitor(script: Vec<Result<u8, GpioError>>) -> HardwareInputMonitor<ScriptedOpener> {
        HardwareInputMonitor::new(ScriptedOpener { script, opens: 0 })
            .with_poll_interval(Duration::from_millis(2))
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let mut monitor = monitor(vec![]);
        monitor.stop();
        monitor.stop();
        assert_eq!(monitor.status(), KeypadStatus::Stopped);
    }

    #[test]
    fn test_press_reported_once() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        let mut monitor = monitor(vec![Ok(0xFF), Ok(0xFB), Ok(0xFB), Ok(0xFB)]);
        monitor
            .start(move |event| sink.lock().unwrap().push(event.id))
            .unwrap();

        wait_until(|| !events.lock().unwrap().is_empty());
        std::thread::sleep(Duration::from_millis(20));
        monitor.stop();

        assert_eq!(*events.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_second_start_rejected_while_running() {
        let mut monitor = monitor(vec![Ok(0xFF)]);
        monitor.start(|_| {}).unwrap();
        assert_eq!(monitor.start(|_| {}), Err(GpioError::AlreadyRunning));
        assert_eq!(monitor.opener.opens, 1);
        monitor.stop();
        assert!(!monitor.is_running());
    }

    #[test]
    fn test_read_error_faults_loop() {
        let mut monitor = monitor(vec![Ok(0xFF), Err(GpioError::PollRead("gone".into()))]);
        monitor.start(|_| {}).unwrap();

        wait_until(|| !monitor.is_running());
        assert_eq!(monitor.status(), KeypadStatus::Faulted);

        // An explicit restart opens the device again
        monitor.start(|_| {}).unwrap();
        assert_eq!(monitor.opener.opens, 2);
        monitor.stop();
    }

    #[test]
    fn test_stop_after_fault_reports_stopped() {
        let mut monitor = monitor(vec![Err(GpioError::PollRead("gone".into()))]);
        monitor.start(|_| {}).unwrap();

        wait_until(|| !monitor.is_running());
        assert_eq!(monitor.status(), KeypadStatus::Faulted);
        monitor.stop();
        assert_eq!(monitor.status(), KeypadStatus::Stopped);
    }

    /// Expander whose every read blocks like a slow control transfer
    struct SlowExpander {
        read_time: Duration,
        reading: Arc<AtomicBool>,
        closed: Arc<AtomicBool>,
    }

    impl GpioExpander for SlowExpander {
        fn read_snapshot(&mut self) -> Result<GpioSnapshot, GpioError> {
            self.reading.store(true, Ordering::SeqCst);
            std::thread::sleep(self.read_time);
            self.reading.store(false, Ordering::SeqCst);
            Ok(GpioSnapshot::RELEASED)
        }
    }

    impl Drop for SlowExpander {
        fn drop(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct SlowOpener {
        read_time: Duration,
        reading: Arc<AtomicBool>,
        closed: Arc<AtomicBool>,
    }

    impl ExpanderOpener for SlowOpener {
        type Expander = SlowExpander;

        fn open(&mut self) -> Result<SlowExpander, GpioError> {
            Ok(SlowExpander {
                read_time: self.read_time,
                reading: Arc::clone(&self.reading),
                closed: Arc::clone(&self.closed),
            })
        }
    }

    #[test]
    fn test_stop_during_read_waits_for_that_read_only() {
        let read_time = Duration::from_millis(80);
        let reading = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));
        let opener = SlowOpener {
            read_time,
            reading: Arc::clone(&reading),
            closed: Arc::clone(&closed),
        };
        // Long interval: only the read in progress may delay the stop
        let mut monitor = HardwareInputMonitor::new(opener).with_poll_interval(Duration::from_secs(10));
        monitor.start(|_| {}).unwrap();

        wait_until(|| reading.load(Ordering::SeqCst));
        assert!(reading.load(Ordering::SeqCst));

        let started = std::time::Instant::now();
        monitor.stop();
        let elapsed = started.elapsed();

        assert!(elapsed < read_time + Duration::from_millis(150), "stop took {:?}", elapsed);
        assert!(closed.load(Ordering::SeqCst));
        assert!(!monitor.is_running());
        assert_eq!(monitor.status(), KeypadStatus::Stopped);
    }
}
