// SPDX-License-Identifier: GPL-3.0-only

//! Mivonix - camera control station
//!
//! Drives a single V4L2 camera: a GStreamer live view with zoom presets, an
//! auto white balance switch that calibrates a manual color temperature from
//! a captured frame, and a four button USB keypad read through an FT232H
//! GPIO expander.
//!
//! # Architecture
//!
//! ```text
//!  keypad thread                      control loop thread
//! ┌──────────────────────┐  queue   ┌──────────────────────────────────┐
//! │ HardwareInputMonitor │ ───────▶ │ Controller                       │
//! └──────────────────────┘          │  ├─ PipelineController ─▶ video  │
//!  terminal keys ─────────────────▶ │  └─ WhiteBalanceController       │
//!                                   │       ├─ FrameSource             │
//!                                   │       └─ DeviceControlPort       │
//!                                   └──────────────────────────────────┘
//! ```
//!
//! - [`backends`]: camera pipeline, device controls, still capture, keypad
//! - [`control`]: command interface, event queue and state machines
//! - [`media`]: color temperature estimation
//! - [`session`]: startup wiring and ordered shutdown
//! - [`config`]: persisted settings
//! - [`terminal`]: interactive terminal surface

pub mod backends;
pub mod config;
pub mod constants;
pub mod control;
pub mod errors;
pub mod media;
pub mod session;
pub mod terminal;

// Re-export commonly used types
pub use config::Config;
pub use control::{Command, Controller};
pub use errors::{AppError, AppResult};
pub use session::Session;
