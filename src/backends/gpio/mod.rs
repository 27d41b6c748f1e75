// SPDX-License-Identifier: GPL-3.0-only

//! USB keypad input
//!
//! Four push buttons are wired to the low input lines of an FT232H in
//! bit-bang mode. Lines are pulled high and read low while a button is held.
//! [`HardwareInputMonitor`] polls the lines on its own thread and reports
//! each press exactly once as a [`ButtonEvent`].

pub mod ft232h;
pub mod monitor;
pub mod poll_loop;

pub use ft232h::{Ft232hExpander, Ft232hSettings};
pub use monitor::{HardwareInputMonitor, KeypadStatus};
pub use poll_loop::{LoopAction, PollLoopController};

use crate::constants::keypad;
use crate::errors::GpioError;

/// Logical identity of a keypad button (1 to 4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonEvent {
    pub id: u8,
}

impl std::fmt::Display for ButtonEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "button {}", self.id)
    }
}

/// Levels of the expander input lines as read in one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpioSnapshot(pub u8);

impl GpioSnapshot {
    /// Every line high, i.e. nothing pressed
    pub const RELEASED: GpioSnapshot = GpioSnapshot(keypad::RELEASED_SNAPSHOT);

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Buttons whose line went from high in `previous` to low in `self`.
    ///
    /// Events come out in the fixed order of [`keypad::BUTTON_LINES`].
    /// Lines that stay low, stay high, or are not mapped produce nothing.
    pub fn pressed_since(self, previous: GpioSnapshot) -> impl Iterator<Item = ButtonEvent> {
        let falling = previous.0 & !self.0;
        keypad::BUTTON_LINES
            .into_iter()
            .filter(move |(bit, _)| falling & (1 << bit) != 0)
            .map(|(_, id)| ButtonEvent { id })
    }
}

impl std::fmt::Display for GpioSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// An opened GPIO expander ready to be polled
pub trait GpioExpander: Send {
    /// Read the current input line levels
    fn read_snapshot(&mut self) -> Result<GpioSnapshot, GpioError>;
}

/// Opens and configures a [`GpioExpander`]
///
/// Called once per monitor start; the expander it returns is owned by the
/// polling thread and closed when that thread exits.
pub trait ExpanderOpener {
    type Expander: GpioExpander + 'static;

    /// Claim the device and put it into input mode.
    ///
    /// Fails with [`GpioError::DeviceOpen`] when the device cannot be claimed
    /// and [`GpioError::ModeConfig`] when the input mode cannot be set.
    fn open(&mut self) -> Result<Self::Expander, GpioError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(current: u8, previous: u8) -> Vec<u8> {
        GpioSnapshot(current)
            .pressed_since(GpioSnapshot(previous))
            .map(|e| e.id)
            .collect()
    }

    #[test]
    fn test_single_press() {
        assert_eq!(ids(0xFB, 0xFF), vec![1]);
        assert_eq!(ids(0xF7, 0xFF), vec![2]);
        assert_eq!(ids(0xFE, 0xFF), vec![3]);
        assert_eq!(ids(0xFD, 0xFF), vec![4]);
    }

    #[test]
    fn test_held_and_released_lines_do_not_fire() {
        assert!(ids(0xFB, 0xFB).is_empty());
        assert!(ids(0xFF, 0xFB).is_empty());
        assert!(ids(0xFF, 0xFF).is_empty());
    }

    #[test]
    fn test_simultaneous_presses_follow_line_order() {
        assert_eq!(ids(0xF0, 0xFF), vec![1, 2, 3, 4]);
        assert_eq!(ids(0xFA, 0xFF), vec![1, 3]);
    }

    #[test]
    fn test_unmapped_lines_ignored() {
        assert!(ids(0x0F, 0xFF).is_empty());
        assert_eq!(ids(0x0B, 0xFF), vec![1]);
    }
}
