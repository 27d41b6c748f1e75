// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the camera control station

use crate::backends::camera::TransportState;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Keypad (GPIO expander) errors
    Gpio(GpioError),
    /// Video pipeline errors
    Pipeline(PipelineError),
    /// Device control errors
    Control(ControlError),
    /// White balance workflow errors
    WhiteBalance(WhiteBalanceError),
    /// Frame capture errors
    Capture(CaptureError),
    /// Configuration errors
    Config(String),
    /// Generic error with message
    Other(String),
}

/// Keypad errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpioError {
    /// The expander with the expected vendor/product identity could not be claimed
    DeviceOpen(String),
    /// The bit-bang input mode could not be configured
    ModeConfig(String),
    /// Reading the input lines failed
    PollRead(String),
    /// A polling thread is already active for this monitor
    AlreadyRunning,
}

/// Video pipeline errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A pipeline element could not be created or linked
    ElementCreation(String),
    /// The pipeline rejected the requested capture geometry
    ConfigRejected(String),
    /// The pipeline refused a transport state change
    StateChange(String),
    /// The operation is not valid in the current transport state
    InvalidTransition {
        /// Requested operation
        operation: &'static str,
        /// State the pipeline was in
        state: TransportState,
    },
    /// Video is unavailable for this session
    Unavailable,
}

/// Device control errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// The video device node could not be opened
    DeviceUnavailable {
        /// Device node path
        path: String,
        /// OS error description
        reason: String,
    },
    /// The driver rejected the control write
    Rejected {
        /// V4L2 control id
        control_id: u32,
        /// Requested value
        value: i32,
        /// OS error description
        reason: String,
    },
}

/// Color temperature estimation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimationError {
    /// The frame contains no pixels
    EmptyFrame,
}

/// Frame capture errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The capture pipeline could not be built or started
    Pipeline(String),
    /// No frame arrived in time
    NoFrame,
    /// A still image could not be read or decoded
    Image(String),
}

/// White balance workflow errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhiteBalanceError {
    /// No calibration frame or no estimate could be produced
    EstimationUnavailable(String),
    /// A device control write failed
    Control(ControlError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Gpio(e) => write!(f, "Keypad error: {}", e),
            AppError::Pipeline(e) => write!(f, "Pipeline error: {}", e),
            AppError::Control(e) => write!(f, "Device control error: {}", e),
            AppError::WhiteBalance(e) => write!(f, "White balance error: {}", e),
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for GpioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpioError::DeviceOpen(msg) => write!(f, "Unable to open keypad device: {}", msg),
            GpioError::ModeConfig(msg) => write!(f, "Failed to set bit-bang mode: {}", msg),
            GpioError::PollRead(msg) => write!(f, "Failed to read GPIO state: {}", msg),
            GpioError::AlreadyRunning => write!(f, "Keypad monitor is already running"),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::ElementCreation(msg) => {
                write!(f, "Failed to create pipeline elements: {}", msg)
            }
            PipelineError::ConfigRejected(msg) => write!(f, "Configuration rejected: {}", msg),
            PipelineError::StateChange(msg) => write!(f, "State change failed: {}", msg),
            PipelineError::InvalidTransition { operation, state } => {
                write!(f, "Cannot {} while {}", operation, state)
            }
            PipelineError::Unavailable => write!(f, "Video is unavailable"),
        }
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::DeviceUnavailable { path, reason } => {
                write!(f, "Failed to open video device {}: {}", path, reason)
            }
            ControlError::Rejected {
                control_id,
                value,
                reason,
            } => write!(
                f,
                "Control 0x{:08x} rejected value {}: {}",
                control_id, value, reason
            ),
        }
    }
}

impl fmt::Display for EstimationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimationError::EmptyFrame => write!(f, "Frame has no pixels"),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Pipeline(msg) => write!(f, "Capture pipeline failed: {}", msg),
            CaptureError::NoFrame => write!(f, "No frame available"),
            CaptureError::Image(msg) => write!(f, "Image error: {}", msg),
        }
    }
}

impl fmt::Display for WhiteBalanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhiteBalanceError::EstimationUnavailable(msg) => {
                write!(f, "Color temperature estimation unavailable: {}", msg)
            }
            WhiteBalanceError::Control(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for GpioError {}
impl std::error::Error for PipelineError {}
impl std::error::Error for ControlError {}
impl std::error::Error for EstimationError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for WhiteBalanceError {}

// Conversions from sub-errors to AppError
impl From<GpioError> for AppError {
    fn from(err: GpioError) -> Self {
        AppError::Gpio(err)
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::Pipeline(err)
    }
}

impl From<ControlError> for AppError {
    fn from(err: ControlError) -> Self {
        AppError::Control(err)
    }
}

impl From<WhiteBalanceError> for AppError {
    fn from(err: WhiteBalanceError) -> Self {
        AppError::WhiteBalance(err)
    }
}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<ControlError> for WhiteBalanceError {
    fn from(err: ControlError) -> Self {
        WhiteBalanceError::Control(err)
    }
}

impl From<CaptureError> for WhiteBalanceError {
    fn from(err: CaptureError) -> Self {
        WhiteBalanceError::EstimationUnavailable(err.to_string())
    }
}

impl From<EstimationError> for WhiteBalanceError {
    fn from(err: EstimationError) -> Self {
        WhiteBalanceError::EstimationUnavailable(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Other(err.to_string())
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Image(err.to_string())
    }
}
