// SPDX-License-Identifier: GPL-3.0-only

//! FT232H in asynchronous bit-bang mode
//!
//! The chip is driven with plain vendor control transfers on interface 0:
//! reset the SIO engine, select bit-bang mode with every line as an input,
//! then read the pin levels with the "read pins" request.

use super::{ExpanderOpener, GpioExpander, GpioSnapshot};
use crate::constants::{ftdi, keypad};
use crate::errors::GpioError;
use rusb::{DeviceHandle, GlobalContext};
use std::time::Duration;
use tracing::{debug, info, warn};

/// USB identity and timing of the keypad expander
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ft232hSettings {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Bound for every control transfer, including pin reads
    pub timeout: Duration,
}

impl Default for Ft232hSettings {
    fn default() -> Self {
        Self {
            vendor_id: keypad::VENDOR_ID,
            product_id: keypad::PRODUCT_ID,
            timeout: keypad::READ_TIMEOUT,
        }
    }
}

impl ExpanderOpener for Ft232hSettings {
    type Expander = Ft232hExpander;

    fn open(&mut self) -> Result<Ft232hExpander, GpioError> {
        Ft232hExpander::open(*self)
    }
}

/// Claimed FT232H with its input lines ready to be read
pub struct Ft232hExpander {
    handle: DeviceHandle<GlobalContext>,
    settings: Ft232hSettings,
    reattach_kernel_driver: bool,
}

impl Ft232hExpander {
    /// Claim the first device matching `settings` and enter bit-bang input mode
    pub fn open(settings: Ft232hSettings) -> Result<Self, GpioError> {
        let id = format!("{:04x}:{:04x}", settings.vendor_id, settings.product_id);
        info!(device = %id, "Opening keypad expander");

        let mut handle = rusb::open_device_with_vid_pid(settings.vendor_id, settings.product_id)
            .ok_or_else(|| {
                warn!(device = %id, "Keypad expander not found or not accessible");
                GpioError::DeviceOpen(format!("no accessible USB device {}", id))
            })?;

        // The ftdi_sio serial driver usually owns the interface
        let reattach_kernel_driver = match handle.kernel_driver_active(ftdi::INTERFACE) {
            Ok(true) => {
                handle
                    .detach_kernel_driver(ftdi::INTERFACE)
                    .map_err(|e| GpioError::DeviceOpen(format!("detach kernel driver: {}", e)))?;
                debug!(device = %id, "Detached kernel driver");
                true
            }
            _ => false,
        };

        handle
            .claim_interface(ftdi::INTERFACE)
            .map_err(|e| GpioError::DeviceOpen(format!("claim interface: {}", e)))?;

        let expander = Self {
            handle,
            settings,
            reattach_kernel_driver,
        };

        // From here on Drop releases the interface if configuration fails
        expander
            .vendor_out(ftdi::SIO_RESET_REQUEST, ftdi::SIO_RESET_SIO)
            .map_err(|e| GpioError::ModeConfig(format!("reset: {}", e)))?;
        expander
            .vendor_out(
                ftdi::SIO_SET_BITMODE_REQUEST,
                bitmode_value(ftdi::BITMODE_BITBANG, ftdi::ALL_INPUTS),
            )
            .map_err(|e| GpioError::ModeConfig(format!("set bit mode: {}", e)))?;

        info!(device = %id, "Keypad expander in bit-bang input mode");
        Ok(expander)
    }

    fn vendor_out(&self, request: u8, value: u16) -> rusb::Result<usize> {
        self.handle.write_control(
            ftdi::REQTYPE_OUT,
            request,
            value,
            ftdi::CHANNEL_A_INDEX,
            &[],
            self.settings.timeout,
        )
    }
}

/// `wValue` of the set-bitmode request: mode in the high byte, direction mask in the low byte
fn bitmode_value(mode: u8, direction_mask: u8) -> u16 {
    (u16::from(mode) << 8) | u16::from(direction_mask)
}

impl GpioExpander for Ft232hExpander {
    fn read_snapshot(&mut self) -> Result<GpioSnapshot, GpioError> {
        let mut pins = [0u8; 1];
        let read = self
            .handle
            .read_control(
                ftdi::REQTYPE_IN,
                ftdi::SIO_READ_PINS_REQUEST,
                0,
                ftdi::CHANNEL_A_INDEX,
                &mut pins,
                self.settings.timeout,
            )
            .map_err(|e| GpioError::PollRead(e.to_string()))?;

        if read != pins.len() {
            return Err(GpioError::PollRead(format!("short read of {} bytes", read)));
        }
        Ok(GpioSnapshot(pins[0]))
    }
}

impl Drop for Ft232hExpander {
    fn drop(&mut self) {
        // Leave bit-bang mode so the serial function works again
        if let Err(e) = self.vendor_out(ftdi::SIO_SET_BITMODE_REQUEST, 0) {
            debug!(error = %e, "Failed to reset bit mode on close");
        }
        if let Err(e) = self.handle.release_interface(ftdi::INTERFACE) {
            debug!(error = %e, "Failed to release keypad interface");
        }
        if self.reattach_kernel_driver
            && let Err(e) = self.handle.attach_kernel_driver(ftdi::INTERFACE)
        {
            debug!(error = %e, "Failed to reattach kernel driver");
        }
        info!("Keypad expander closed");
    }
}
