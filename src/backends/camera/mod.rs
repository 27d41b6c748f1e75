// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend
//!
//! ```text
//! ┌──────────────────────┐
//! │  PipelineController  │  ← transport state machine
//! └──────────┬───────────┘
//!            │ VideoPipeline
//!            ▼
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │   GstVideoPipeline   │   │   V4l2ControlPort    │ ← DeviceControlPort
//! └──────────────────────┘   └──────────────────────┘
//!                            ┌──────────────────────┐
//!                            │   GstFrameGrabber    │ ← FrameSource
//!                            └──────────────────────┘
//! ```
//!
//! Every hardware facing piece sits behind a trait so the controllers can
//! be driven by fakes.

pub mod capture;
pub mod pipeline;
pub mod types;
pub mod v4l2_controls;

pub use capture::{FrameSource, GstFrameGrabber, ImageFileSource};
pub use pipeline::{GstVideoPipeline, PipelineSettings, VideoPipeline};
pub use types::*;
pub use v4l2_controls::{CameraControl, ControlRange, DeviceControlPort, V4l2ControlPort};
