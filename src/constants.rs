// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// USB keypad (FT232H GPIO expander) constants
pub mod keypad {
    use super::Duration;

    /// FTDI vendor id
    pub const VENDOR_ID: u16 = 0x0403;

    /// FT232H product id
    pub const PRODUCT_ID: u16 = 0x6014;

    /// Fixed polling interval of the input lines
    pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

    /// Upper bound for a single pin read on the USB bus
    pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

    /// Snapshot assumed before the first read: every line high (all released)
    pub const RELEASED_SNAPSHOT: u8 = 0xFF;

    /// Input line to logical button mapping, in dispatch order.
    ///
    /// Lines are active-low: a cleared bit means the button is held.
    pub const BUTTON_LINES: [(u8, u8); 4] = [
        (2, 1), // bit 2 -> button 1
        (3, 2), // bit 3 -> button 2
        (0, 3), // bit 0 -> button 3
        (1, 4), // bit 1 -> button 4
    ];

    /// Mask of all monitored input lines
    pub const MONITORED_MASK: u8 = 0b0000_1111;
}

/// Vendor requests understood by FTDI chips
pub mod ftdi {
    /// Host-to-device vendor request type
    pub const REQTYPE_OUT: u8 = 0x40;

    /// Device-to-host vendor request type
    pub const REQTYPE_IN: u8 = 0xC0;

    /// SIO reset request
    pub const SIO_RESET_REQUEST: u8 = 0x00;

    /// Reset value for the SIO request
    pub const SIO_RESET_SIO: u16 = 0x0000;

    /// Set bit mode request
    pub const SIO_SET_BITMODE_REQUEST: u8 = 0x0B;

    /// Read pins request
    pub const SIO_READ_PINS_REQUEST: u8 = 0x0C;

    /// Asynchronous bit-bang mode
    pub const BITMODE_BITBANG: u8 = 0x01;

    /// Direction mask: every line is an input
    pub const ALL_INPUTS: u8 = 0x00;

    /// USB interface claimed on the chip
    pub const INTERFACE: u8 = 0;

    /// `wIndex` addressing channel A in vendor requests
    pub const CHANNEL_A_INDEX: u16 = 1;
}

/// White balance constants
pub mod white_balance {
    /// Lowest manual color temperature accepted by the estimator and the device
    pub const MIN_KELVIN: u32 = 1000;

    /// Highest manual color temperature accepted by the estimator and the device
    pub const MAX_KELVIN: u32 = 10_000;

    /// Estimate reported for a perfectly neutral frame
    pub const NEUTRAL_KELVIN: f64 = 5000.0;

    /// Kelvin shift per unit of mean chroma difference (a - b)
    pub const KELVIN_PER_CHROMA_UNIT: f64 = 100.0;
}

/// Zoom presets expressed as crop margins in pixels
pub mod zoom {
    use crate::backends::camera::CropWindow;

    /// Ordered, cyclic preset table; preset 0 is the uncropped view
    pub const PRESETS: [CropWindow; 4] = [
        CropWindow::uniform(0),
        CropWindow::uniform(50),
        CropWindow::uniform(100),
        CropWindow::uniform(150),
    ];
}

/// Video defaults
pub mod video {
    /// Default camera node
    pub const DEFAULT_DEVICE: &str = "/dev/video0";

    /// Default capture width
    pub const DEFAULT_WIDTH: u32 = 1280;

    /// Default capture height
    pub const DEFAULT_HEIGHT: u32 = 720;

    /// Default display sink element
    pub const DEFAULT_SINK: &str = "autovideosink";

    /// Resolutions offered by the terminal surface, cycled in order
    pub const RESOLUTION_PRESETS: [(u32, u32); 3] = [(640, 480), (1280, 720), (1920, 1080)];
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Pipeline state change timeout on stop
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// Frames discarded before the calibration frame is kept
    pub const CALIBRATION_WARMUP_FRAMES: u32 = 5;

    /// Wait for a single calibration sample
    pub const CALIBRATION_SAMPLE_TIMEOUT: Duration = Duration::from_millis(3000);

    /// Input poll period of the terminal surface
    pub const TERMINAL_TICK: Duration = Duration::from_millis(50);
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
