// SPDX-License-Identifier: GPL-3.0-only

//! Control loop and the command interface
//!
//! Every user action, whether it comes from the terminal surface or from a
//! keypad button, is a [`Command`] executed by the [`Controller`] on the
//! control loop thread. Keypad presses reach that thread through the
//! [`EventDispatcher`] queue.

pub mod controller;
pub mod dispatcher;
pub mod pipeline_controller;
pub mod white_balance;

pub use controller::{Controller, ControllerStatus};
pub use dispatcher::{ControlEvent, ControlLoop, EventDispatcher, LoopExit, event_queue};
pub use pipeline_controller::PipelineController;
pub use white_balance::{Estimator, WhiteBalanceController, WhiteBalanceMode};

use crate::backends::gpio::ButtonEvent;

/// Operations offered to every control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Play,
    Pause,
    Stop,
    ZoomCycle,
    ToggleAwb,
}

impl Command {
    /// Command bound to a keypad button, if any
    pub fn from_button(event: ButtonEvent) -> Option<Command> {
        match event.id {
            1 => Some(Command::Play),
            2 => Some(Command::Pause),
            3 => Some(Command::ZoomCycle),
            4 => Some(Command::ToggleAwb),
            _ => None,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Play => write!(f, "play"),
            Command::Pause => write!(f, "pause"),
            Command::Stop => write!(f, "stop"),
            Command::ZoomCycle => write!(f, "zoom"),
            Command::ToggleAwb => write!(f, "toggle auto white balance"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_map() {
        let command = |id| Command::from_button(ButtonEvent { id });
        assert_eq!(command(1), Some(Command::Play));
        assert_eq!(command(2), Some(Command::Pause));
        assert_eq!(command(3), Some(Command::ZoomCycle));
        assert_eq!(command(4), Some(Command::ToggleAwb));
        assert_eq!(command(0), None);
        assert_eq!(command(5), None);
    }
}
