// SPDX-License-Identifier: GPL-3.0-only

//! Hardware backends
//!
//! - [`camera`]: live view pipeline, device controls and still capture
//! - [`gpio`]: USB keypad attached through a GPIO expander

pub mod camera;
pub mod gpio;
