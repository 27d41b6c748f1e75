// SPDX-License-Identifier: GPL-3.0-only

//! Image analysis used by the white balance workflow
//!
//! - [`color_temperature`]: Kelvin estimate from the mean chroma of a frame

pub mod color_temperature;

pub use color_temperature::estimate as estimate_color_temperature;
