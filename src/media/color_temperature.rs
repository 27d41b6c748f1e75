// SPDX-License-Identifier: GPL-3.0-only

//! Color temperature estimation from a single frame
//!
//! Pixels are converted from sRGB to CIE L\*a\*b\* (D65 white point) and the
//! a\* (green to red) and b\* (blue to yellow) channels are averaged over the
//! whole frame. A warm cast pushes b\* up, a cool cast pushes it down, and the
//! estimate moves from the neutral value by a fixed factor per unit of
//! `avg_a - avg_b`.

use crate::constants::white_balance::{KELVIN_PER_CHROMA_UNIT, MAX_KELVIN, MIN_KELVIN, NEUTRAL_KELVIN};
use crate::errors::EstimationError;
use image::RgbImage;

// sRGB primaries to XYZ, D65
const RGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.412453, 0.357580, 0.180423],
    [0.212671, 0.715160, 0.072169],
    [0.019334, 0.119193, 0.950227],
];

// D65 reference white (row sums of RGB_TO_XYZ)
const WHITE_X: f64 = 0.950456;
const WHITE_Z: f64 = 1.088754;

const EPSILON: f64 = 216.0 / 24389.0;
const KAPPA: f64 = 24389.0 / 27.0;

/// Estimate the color temperature of `frame` in Kelvin.
///
/// The result is always within `[MIN_KELVIN, MAX_KELVIN]`. A frame without
/// pixels yields [`EstimationError::EmptyFrame`].
pub fn estimate(frame: &RgbImage) -> Result<u32, EstimationError> {
    let (avg_a, avg_b) = mean_chroma(frame)?;
    Ok(kelvin_from_chroma(avg_a, avg_b))
}

/// Mean a\* and b\* over all pixels of `frame`
pub fn mean_chroma(frame: &RgbImage) -> Result<(f64, f64), EstimationError> {
    let count = u64::from(frame.width()) * u64::from(frame.height());
    if count == 0 {
        return Err(EstimationError::EmptyFrame);
    }

    let linear = linearization_table();
    let (sum_a, sum_b) = frame.pixels().fold((0.0, 0.0), |(sum_a, sum_b), pixel| {
        let (_, a, b) = lab_from_linear(
            linear[usize::from(pixel[0])],
            linear[usize::from(pixel[1])],
            linear[usize::from(pixel[2])],
        );
        (sum_a + a, sum_b + b)
    });

    let count = count as f64;
    Ok((sum_a / count, sum_b / count))
}

/// `NEUTRAL + (avg_a - avg_b) * KELVIN_PER_CHROMA_UNIT`, rounded and clamped
pub fn kelvin_from_chroma(avg_a: f64, avg_b: f64) -> u32 {
    let raw = NEUTRAL_KELVIN + (avg_a - avg_b) * KELVIN_PER_CHROMA_UNIT;
    if raw.is_nan() {
        return NEUTRAL_KELVIN as u32;
    }
    raw.round().clamp(f64::from(MIN_KELVIN), f64::from(MAX_KELVIN)) as u32
}

/// sRGB transfer function inverted for every 8-bit code value
fn linearization_table() -> [f64; 256] {
    let mut table = [0.0; 256];
    for (code, value) in table.iter_mut().enumerate() {
        let c = code as f64 / 255.0;
        *value = if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        };
    }
    table
}

fn lab_f(t: f64) -> f64 {
    if t > EPSILON {
        t.cbrt()
    } else {
        (KAPPA * t + 16.0) / 116.0
    }
}

/// L\*a\*b\* of a linear RGB triple
fn lab_from_linear(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let [x, y, z] = RGB_TO_XYZ.map(|row| row[0] * r + row[1] * g + row[2] * b);

    let fx = lab_f(x / WHITE_X);
    let fy = lab_f(y);
    let fz = lab_f(z / WHITE_Z);

    (116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_empty_frame() {
        let frame = RgbImage::new(0, 0);
        assert_eq!(estimate(&frame), Err(EstimationError::EmptyFrame));
        let frame = RgbImage::new(16, 0);
        assert_eq!(estimate(&frame), Err(EstimationError::EmptyFrame));
    }

    #[test]
    fn test_neutral_gray_is_neutral() {
        let frame = RgbImage::from_pixel(4, 4, Rgb([128, 128, 128]));
        let (a, b) = mean_chroma(&frame).unwrap();
        assert!(a.abs() < 1e-6 && b.abs() < 1e-6);
        assert_eq!(estimate(&frame), Ok(5000));
    }

    #[test]
    fn test_heuristic() {
        assert_eq!(kelvin_from_chroma(10.0, 0.0), 6000);
        assert_eq!(kelvin_from_chroma(2.0, 12.0), 4000);
        assert_eq!(kelvin_from_chroma(0.0, 0.0), 5000);
    }

    #[test]
    fn test_clamped_to_range() {
        assert_eq!(kelvin_from_chroma(60.0, 0.0), MAX_KELVIN);
        assert_eq!(kelvin_from_chroma(0.0, 60.0), MIN_KELVIN);
        assert_eq!(kelvin_from_chroma(f64::INFINITY, 0.0), MAX_KELVIN);

        // Saturated blue and yellow are far outside the raw range
        let blue = RgbImage::from_pixel(2, 2, Rgb([0, 0, 255]));
        assert_eq!(estimate(&blue), Ok(MAX_KELVIN));
        let yellow = RgbImage::from_pixel(2, 2, Rgb([255, 255, 0]));
        assert_eq!(estimate(&yellow), Ok(MIN_KELVIN));
    }

    #[test]
    fn test_known_lab_values() {
        let linear = linearization_table();
        let (l, a, b) = lab_from_linear(linear[255], linear[0], linear[0]);
        assert!((l - 53.24).abs() < 0.1);
        assert!((a - 80.09).abs() < 0.2);
        assert!((b - 67.20).abs() < 0.2);
    }
}
