// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera control interface
//!
//! The white balance workflow writes two controls on the camera node: the
//! automatic white balance switch and the manual color temperature. Both go
//! through [`DeviceControlPort`] so the workflow can run against a fake in
//! tests.

use crate::errors::ControlError;
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use tracing::{debug, info, warn};

// ===== V4L2 Control IDs (User Class) =====
const V4L2_CTRL_CLASS_USER: u32 = 0x00980000;
const V4L2_CID_BASE: u32 = V4L2_CTRL_CLASS_USER | 0x900;

/// Automatic white balance
pub const V4L2_CID_AUTO_WHITE_BALANCE: u32 = V4L2_CID_BASE + 12;
/// White balance temperature in Kelvin
pub const V4L2_CID_WHITE_BALANCE_TEMPERATURE: u32 = V4L2_CID_BASE + 26;

// ===== V4L2 ioctl Numbers =====
// Calculated as: (dir << 30) | (size << 16) | ('V' << 8) | nr

/// Set control value (v4l2_control: 8 bytes)
const VIDIOC_S_CTRL: libc::c_ulong = 0xC008561C;
/// Query control info (v4l2_queryctrl: 68 bytes)
const VIDIOC_QUERYCTRL: libc::c_ulong = 0xC0445624;

/// V4L2 control get/set structure
#[repr(C)]
struct V4l2Control {
    id: u32,
    value: i32,
}

/// V4L2 query control structure
#[repr(C)]
struct V4l2Queryctrl {
    id: u32,
    ctrl_type: u32,
    name: [u8; 32],
    minimum: i32,
    maximum: i32,
    step: i32,
    default_value: i32,
    flags: u32,
    reserved: [u32; 2],
}

/// Logical control points used by this application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraControl {
    /// Automatic white balance on (1) or off (0)
    AutoWhiteBalance,
    /// Manual white balance temperature in Kelvin
    WhiteBalanceTemperature,
}

impl CameraControl {
    /// V4L2 control id
    pub fn id(self) -> u32 {
        match self {
            CameraControl::AutoWhiteBalance => V4L2_CID_AUTO_WHITE_BALANCE,
            CameraControl::WhiteBalanceTemperature => V4L2_CID_WHITE_BALANCE_TEMPERATURE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CameraControl::AutoWhiteBalance => "white_balance_automatic",
            CameraControl::WhiteBalanceTemperature => "white_balance_temperature",
        }
    }
}

/// Value range advertised by the driver for an integer control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRange {
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default_value: i32,
}

/// Synchronous access to the camera's control registers
pub trait DeviceControlPort: Send {
    /// Write a control value.
    ///
    /// Returns [`ControlError::DeviceUnavailable`] when the device node cannot
    /// be opened and [`ControlError::Rejected`] when the driver refuses the write.
    fn set_control(&mut self, control: CameraControl, value: i32) -> Result<(), ControlError>;

    /// Range advertised by the driver, if it can be queried
    fn control_range(&mut self, _control: CameraControl) -> Option<ControlRange> {
        None
    }
}

/// [`DeviceControlPort`] backed by a V4L2 device node
///
/// The node is opened on first use and kept open until the port is dropped.
pub struct V4l2ControlPort {
    device_path: String,
    file: Option<File>,
}

impl V4l2ControlPort {
    pub fn new(device_path: &str) -> Self {
        Self {
            device_path: device_path.to_string(),
            file: None,
        }
    }

    fn file(&mut self) -> Result<&File, ControlError> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&self.device_path)
                .map_err(|e| {
                    warn!(device_path = %self.device_path, error = %e, "Failed to open video device");
                    ControlError::DeviceUnavailable {
                        path: self.device_path.clone(),
                        reason: e.to_string(),
                    }
                })?;
            info!(device_path = %self.device_path, "Opened video device for control access");
            self.file = Some(file);
        }

        self.file.as_ref().ok_or_else(|| ControlError::DeviceUnavailable {
            path: self.device_path.clone(),
            reason: "device handle missing".to_string(),
        })
    }
}

impl DeviceControlPort for V4l2ControlPort {
    fn set_control(&mut self, control: CameraControl, value: i32) -> Result<(), ControlError> {
        let device_path = self.device_path.clone();
        let fd = self.file()?.as_raw_fd();

        let mut ctrl = V4l2Control {
            id: control.id(),
            value,
        };

        let result = unsafe { libc::ioctl(fd, VIDIOC_S_CTRL as _, &mut ctrl as *mut V4l2Control) };

        if result < 0 {
            let errno = std::io::Error::last_os_error();
            warn!(
                device_path = %device_path,
                control = control.name(),
                value,
                ?errno,
                "Failed to set V4L2 control"
            );
            return Err(ControlError::Rejected {
                control_id: control.id(),
                value,
                reason: errno.to_string(),
            });
        }

        // Check if the driver accepted our value
        if ctrl.value != value {
            debug!(
                device_path = %device_path,
                control = control.name(),
                requested = value,
                actual = ctrl.value,
                "V4L2 control value was clamped"
            );
        }

        debug!(device_path = %device_path, control = control.name(), value, "V4L2 control set");
        Ok(())
    }

    fn control_range(&mut self, control: CameraControl) -> Option<ControlRange> {
        let fd = self.file().ok()?.as_raw_fd();

        let mut qctrl = V4l2Queryctrl {
            id: control.id(),
            ctrl_type: 0,
            name: [0; 32],
            minimum: 0,
            maximum: 0,
            step: 0,
            default_value: 0,
            flags: 0,
            reserved: [0; 2],
        };

        let result =
            unsafe { libc::ioctl(fd, VIDIOC_QUERYCTRL as _, &mut qctrl as *mut V4l2Queryctrl) };

        if result < 0 {
            debug!(control = control.name(), "Control not advertised by driver");
            return None;
        }

        Some(ControlRange {
            minimum: qctrl.minimum,
            maximum: qctrl.maximum,
            step: qctrl.step,
            default_value: qctrl.default_value,
        })
    }
}

impl Drop for V4l2ControlPort {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            debug!(device_path = %self.device_path, "Closed video device control handle");
        }
    }
}
