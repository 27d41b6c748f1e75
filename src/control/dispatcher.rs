// SPDX-License-Identifier: GPL-3.0-only

//! Hand-off from producer threads to the control loop
//!
//! [`EventDispatcher`] is the sending half: cheap to clone, never blocks, and
//! safe to call from the keypad polling thread or a signal handler.
//! [`ControlLoop`] is the receiving half, owned by the single thread that
//! runs the [`Controller`]. Events are handled one at a time in the order
//! they were dispatched.

use super::{Command, Controller};
use crate::backends::gpio::ButtonEvent;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info, warn};

/// Something for the control loop to act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Keypad press, mapped to a command on the control loop
    Button(ButtonEvent),
    /// Command from another control surface
    Command(Command),
    /// Leave the loop
    Shutdown,
}

/// Create a connected dispatcher and control loop
pub fn event_queue() -> (EventDispatcher, ControlLoop) {
    let (tx, rx) = unbounded_channel();
    (EventDispatcher { tx }, ControlLoop { rx })
}

/// Sending half of the control queue
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    tx: UnboundedSender<ControlEvent>,
}

impl EventDispatcher {
    /// Queue `event` for the control loop and return immediately.
    ///
    /// Returns `false` when the loop has shut down; the event is dropped.
    pub fn dispatch(&self, event: ControlEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(_) => {
                debug!(?event, "Control loop closed, event discarded");
                false
            }
        }
    }

    /// Whether the control loop still accepts events
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Why the control loop stopped processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// A shutdown event was received
    Shutdown,
    /// Every dispatcher was dropped
    Disconnected,
}

/// Receiving half of the control queue
#[derive(Debug)]
pub struct ControlLoop {
    rx: UnboundedReceiver<ControlEvent>,
}

impl ControlLoop {
    /// Handle everything queued so far without waiting.
    ///
    /// Returns `Some(exit)` once the loop should end.
    pub fn process_pending(&mut self, controller: &mut Controller) -> Option<LoopExit> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    if let Some(exit) = handle(controller, event) {
                        return Some(exit);
                    }
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return Some(LoopExit::Disconnected),
            }
        }
    }

    /// Block and handle events until a shutdown event arrives or every
    /// dispatcher is gone. Must not be called from inside an async runtime.
    pub fn run(&mut self, controller: &mut Controller) -> LoopExit {
        info!("Control loop running");
        loop {
            let Some(event) = self.rx.blocking_recv() else {
                info!("All dispatchers dropped, leaving control loop");
                return LoopExit::Disconnected;
            };
            if let Some(exit) = handle(controller, event) {
                return exit;
            }
        }
    }

    /// Stop accepting events. Later dispatches are discarded; events that
    /// were already queued can still be drained.
    pub fn close(&mut self) {
        debug!("Closing control queue");
        self.rx.close();
    }

    /// Drop queued events without handling them
    pub fn discard_pending(&mut self) -> usize {
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!(discarded, "Discarded queued control events");
        }
        discarded
    }
}

fn handle(controller: &mut Controller, event: ControlEvent) -> Option<LoopExit> {
    let command = match event {
        ControlEvent::Shutdown => {
            info!("Shutdown requested");
            return Some(LoopExit::Shutdown);
        }
        ControlEvent::Command(command) => command,
        ControlEvent::Button(button) => match Command::from_button(button) {
            Some(command) => command,
            None => {
                warn!(%button, "Unmapped keypad button");
                return None;
            }
        },
    };

    // Failures are logged by the controller and never end the loop
    let _ = controller.execute(command);
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_kept_in_order() {
        let (dispatcher, mut control) = event_queue();
        for id in [3, 1, 4] {
            assert!(dispatcher.dispatch(ControlEvent::Button(ButtonEvent { id })));
        }

        let received: Vec<_> = std::iter::from_fn(|| control.rx.try_recv().ok()).collect();
        assert_eq!(
            received,
            vec![
                ControlEvent::Button(ButtonEvent { id: 3 }),
                ControlEvent::Button(ButtonEvent { id: 1 }),
                ControlEvent::Button(ButtonEvent { id: 4 }),
            ]
        );
    }

    #[test]
    fn test_dispatch_after_close_is_discarded() {
        let (dispatcher, mut control) = event_queue();
        assert!(dispatcher.dispatch(ControlEvent::Command(Command::Play)));
        control.close();

        assert!(!dispatcher.is_open());
        assert!(!dispatcher.dispatch(ControlEvent::Command(Command::Stop)));
        assert_eq!(control.discard_pending(), 1);
    }

    #[test]
    fn test_dispatch_from_other_thread() {
        let (dispatcher, mut control) = event_queue();
        let producer = std::thread::spawn(move || {
            for id in 1..=4 {
                dispatcher.dispatch(ControlEvent::Button(ButtonEvent { id }));
            }
        });
        producer.join().unwrap();

        let ids: Vec<u8> = std::iter::from_fn(|| match control.rx.blocking_recv() {
            Some(ControlEvent::Button(button)) => Some(button.id),
            _ => None,
        })
        .collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }
}
