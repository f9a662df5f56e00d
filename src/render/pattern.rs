//! CPU synthesis of projector pattern images.
//!
//! Every generator computes one brightness value per column and replicates
//! it down the full height, fully opaque.

use crate::capture::binary_to_gray;
use crate::projector::Pattern;
use image::{Rgba, RgbaImage};

/// Fill an image from per-column brightness values.
fn from_columns(width: u32, height: u32, values: &[u8]) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, _| {
        let v = values[x as usize];
        Rgba([v, v, v, 255])
    })
}

/// Render one Gray code bit plane.
///
/// A column is bright when bit `bit_index` of its Gray code is clear; the
/// inverted plane is the complement.
pub fn render_bit_plane(
    width: u32,
    height: u32,
    bit_index: u32,
    inverted: bool,
    max_brightness: u8,
) -> RgbaImage {
    let mask = 1u32.checked_shl(bit_index).unwrap_or(0);
    let values: Vec<u8> = (0..width)
        .map(|x| {
            let lit = (binary_to_gray(x) & mask) == 0;
            if lit != inverted {
                max_brightness
            } else {
                0
            }
        })
        .collect();

    from_columns(width, height, &values)
}

/// Render a cosine fringe with the given period (pixels) and phase shift (pixels).
pub fn render_sinusoid(width: u32, height: u32, period: u32, shift: f64, max_brightness: u8) -> RgbaImage {
    let period = period.max(1) as f64;
    let values: Vec<u8> = (0..width)
        .map(|x| {
            let phase = (x as f64 - shift) * std::f64::consts::TAU / period;
            ((1.0 + phase.cos()) * max_brightness as f64 * 0.5) as u8
        })
        .collect();

    from_columns(width, height, &values)
}

/// Render uniform illumination.
pub fn render_flat_field(width: u32, height: u32, brightness: u8) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([brightness, brightness, brightness, 255]))
}

/// Render any [`Pattern`] at the given resolution.
pub fn render_pattern(pattern: &Pattern, width: u32, height: u32, max_brightness: u8) -> RgbaImage {
    match *pattern {
        Pattern::BitPlane { bit, inverted } => {
            render_bit_plane(width, height, bit, inverted, max_brightness)
        }
        Pattern::Sinusoid { period, shift } => {
            render_sinusoid(width, height, period, shift, max_brightness)
        }
        Pattern::FlatField { brightness } => render_flat_field(width, height, brightness),
    }
}
