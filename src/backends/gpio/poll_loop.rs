// SPDX-License-Identifier: GPL-3.0-only

//! Thread lifecycle for periodic polling loops
//!
//! A [`PollLoopController`] owns one background thread that runs a closure
//! once per interval until the closure asks to stop or the controller is
//! stopped. The stop flag is checked at the top of every cycle and the
//! inter-cycle wait is woken early on stop, so `stop()` returns after at
//! most the iteration that is currently running.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Action returned by the loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Wait one interval and run again
    Continue,
    /// Exit the thread
    Stop,
}

/// Controller for a polling loop running in a separate thread
///
/// # Example
///
/// ```ignore
/// let mut controller = PollLoopController::start(
///     "keypad",
///     Duration::from_millis(250),
///     expander,
///     |expander| match expander.read_snapshot() {
///         Ok(snapshot) => {
///             handle(snapshot);
///             LoopAction::Continue
///         }
///         Err(_) => LoopAction::Stop,
///     },
/// );
///
/// controller.stop();
/// ```
pub struct PollLoopController {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Signal to stop the loop
    stop_signal: Arc<AtomicBool>,
    /// Name for logging
    name: String,
}

impl PollLoopController {
    /// Move `state` into a new thread and call `loop_fn` on it every `interval`
    pub fn start<S, F>(name: &str, interval: Duration, mut state: S, mut loop_fn: F) -> Self
    where
        S: Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, interval_ms = interval.as_millis() as u64, "Starting poll loop");

        let thread_handle = thread::spawn(move || {
            debug!(name = %name_clone, "Poll loop thread started");

            loop {
                if stop_signal_clone.load(Ordering::SeqCst) {
                    debug!(name = %name_clone, "Stop signal received");
                    break;
                }

                if loop_fn(&mut state) == LoopAction::Stop {
                    debug!(name = %name_clone, "Loop requested stop");
                    break;
                }

                // Woken early by request_stop()
                if !stop_signal_clone.load(Ordering::SeqCst) {
                    thread::park_timeout(interval);
                }
            }

            // State (and any device it owns) is dropped on this thread
            drop(state);
            info!(name = %name_clone, "Poll loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Check if the loop thread is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting poll loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = &self.thread_handle {
            handle.thread().unpark();
        }
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending the stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for poll loop thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Poll loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Poll loop thread finished");
            }
        }
    }
}

impl Drop for PollLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "PollLoopController dropped, stopping loop");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Instant;

    #[test]
    fn test_loop_stops_itself() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller =
            PollLoopController::start("test-loop", Duration::from_millis(1), 0u32, move |n| {
                *n += 1;
                counter_clone.store(*n, Ordering::SeqCst);
                if *n >= 5 {
                    LoopAction::Stop
                } else {
                    LoopAction::Continue
                }
            });

        controller.join();
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert!(!controller.is_running());
    }

    #[test]
    fn test_stop_wakes_long_interval() {
        let ran = Arc::new(AtomicU32::new(0));
        let ran_clone = Arc::clone(&ran);

        let mut controller =
            PollLoopController::start("test-wake", Duration::from_secs(30), (), move |_| {
                ran_clone.fetch_add(1, Ordering::SeqCst);
                LoopAction::Continue
            });

        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        controller.stop();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(ran.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_state_dropped_on_exit() {
        struct Flag(Arc<AtomicBool>);
        impl Drop for Flag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let mut controller = PollLoopController::start(
            "test-drop",
            Duration::from_millis(1),
            Flag(Arc::clone(&dropped)),
            |_| LoopAction::Continue,
        );

        controller.stop();
        assert!(dropped.load(Ordering::SeqCst));
    }
}
