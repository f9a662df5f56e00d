//! Decoded structured light frame.

use super::gray_code::BitRange;
use image::{GrayImage, ImageBuffer, Luma};
use std::path::Path;

/// Per-pixel projector column index recovered from the bit planes.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Camera image dimensions.
    pub width: u32,
    pub height: u32,
    /// Bit planes the indices were decoded from.
    pub bit_range: BitRange,
    /// Column index per pixel, in `0..bit_range.column_count()`.
    pub indices: Vec<u32>,
    /// Mean |normal - inverted| / 255 over all bits (0.0-1.0 per pixel).
    pub confidence: Vec<f32>,
}

impl DecodedFrame {
    pub fn new(width: u32, height: u32, bit_range: BitRange) -> Self {
        let size = pixel_count(width, height);
        Self {
            width,
            height,
            bit_range,
            indices: vec![0; size],
            confidence: vec![0.0; size],
        }
    }

    /// Column index at camera pixel (x, y).
    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.indices.get(pixel_count(self.width, y) + x as usize).copied()
    }

    pub fn max_index(&self) -> u32 {
        self.indices.iter().copied().max().unwrap_or(0)
    }

    /// Count pixels whose confidence reaches `threshold`.
    pub fn valid_count(&self, threshold: f32) -> usize {
        self.confidence.iter().filter(|&&c| c >= threshold).count()
    }

    /// Index map as 16-bit grayscale, stretched over the full range.
    pub fn to_luma16(&self) -> ImageBuffer<Luma<u16>, Vec<u16>> {
        let scale = 65535.0 / (self.bit_range.column_count() - 1) as f64;
        ImageBuffer::from_fn(self.width, self.height, |x, y| {
            let idx = pixel_count(self.width, y) + x as usize;
            Luma([(self.indices[idx] as f64 * scale).round().min(65535.0) as u16])
        })
    }

    /// Index map as 8-bit grayscale, for previews.
    pub fn to_luma8(&self) -> GrayImage {
        let scale = 255.0 / (self.bit_range.column_count() - 1) as f64;
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let idx = pixel_count(self.width, y) + x as usize;
            Luma([(self.indices[idx] as f64 * scale).round().min(255.0) as u8])
        })
    }

    /// Write the index map as a 16-bit grayscale PNG.
    pub fn save_png(&self, path: &Path) -> std::io::Result<()> {
        self.to_luma16()
            .save(path)
            .map_err(std::io::Error::other)
    }
}

/// `width * height` without wrapping in `u32`.
fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DecodedFrame {
        let mut frame = DecodedFrame::new(4, 2, BitRange::new(0, 2).unwrap());
        frame.indices = vec![0, 1, 2, 3, 4, 5, 6, 7];
        frame.confidence = vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7];
        frame
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_pixel_count_does_not_wrap() {
        assert_eq!(pixel_count(65536, 65536), 1usize << 32);
        assert_eq!(pixel_count(u32::MAX, 2), 2 * u32::MAX as usize);
    }

    #[test]
    fn test_get() {
        let frame = sample();
        assert_eq!(frame.get(0, 0), Some(0));
        assert_eq!(frame.get(3, 1), Some(7));
        assert_eq!(frame.get(4, 0), None);
        assert_eq!(frame.max_index(), 7);
    }

    #[test]
    fn test_valid_count() {
        let frame = sample();
        assert_eq!(frame.valid_count(0.0), 8);
        assert_eq!(frame.valid_count(0.45), 3);
    }

    #[test]
    fn test_luma_stretch() {
        let frame = sample();
        let wide = frame.to_luma16();
        assert_eq!(wide.get_pixel(0, 0)[0], 0);
        assert_eq!(wide.get_pixel(3, 1)[0], 65535);

        let narrow = frame.to_luma8();
        assert_eq!(narrow.get_pixel(3, 1)[0], 255);
        assert_eq!(narrow.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_save_png() {
        let frame = sample();
        let path = std::env::temp_dir().join(format!("graycode_decoded_{}.png", std::process::id()));
        frame.save_png(&path).unwrap();
        let loaded = image::open(&path).unwrap().into_luma16();
        assert_eq!(loaded.dimensions(), (4, 2));
        assert_eq!(loaded.get_pixel(3, 1)[0], 65535);
        let _ = std::fs::remove_file(&path);
    }
}
