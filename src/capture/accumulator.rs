//! Bit plane exposure storage and decoding.

use super::decoder::DecodedFrame;
use super::error::CaptureError;
use super::gray_code::{gray_to_binary, BitRange};
use image::GrayImage;

/// Holds one exposure per (bit, polarity) for a single capture session.
#[derive(Debug, Clone)]
pub struct BitPlaneAccumulator {
    bit_range: BitRange,
    /// Slot `(bit - low_bit) * 2 + inverted`.
    slots: Vec<Option<GrayImage>>,
    /// Dimensions of the first stored exposure.
    dimensions: Option<(u32, u32)>,
    stored: usize,
    complete: bool,
}

impl BitPlaneAccumulator {
    pub fn new(bit_range: BitRange) -> Self {
        Self {
            bit_range,
            slots: vec![None; bit_range.exposure_count()],
            dimensions: None,
            stored: 0,
            complete: false,
        }
    }

    fn slot(&self, bit: u32, inverted: bool) -> Option<usize> {
        if !self.bit_range.contains(bit) {
            return None;
        }
        Some(((bit - self.bit_range.low_bit()) * 2 + inverted as u32) as usize)
    }

    pub fn bit_range(&self) -> BitRange {
        self.bit_range
    }

    pub fn has_exposure(&self, bit: u32, inverted: bool) -> bool {
        self.slot(bit, inverted)
            .map(|i| self.slots[i].is_some())
            .unwrap_or(false)
    }

    /// Stored exposure for (bit, polarity).
    pub fn exposure(&self, bit: u32, inverted: bool) -> Option<&GrayImage> {
        self.slot(bit, inverted).and_then(|i| self.slots[i].as_ref())
    }

    /// Record an exposure. An already-filled slot keeps its first exposure.
    pub fn store(&mut self, bit: u32, inverted: bool, exposure: GrayImage) -> Result<(), CaptureError> {
        let index = self.slot(bit, inverted).ok_or(CaptureError::BitOutOfRange { bit })?;

        if self.slots[index].is_some() {
            return Err(CaptureError::DuplicateExposure { bit, inverted });
        }

        let actual = exposure.dimensions();
        match self.dimensions {
            Some(expected) if expected != actual => {
                return Err(CaptureError::FrameSizeMismatch { expected, actual });
            }
            _ => self.dimensions = Some(actual),
        }

        self.slots[index] = Some(exposure);
        self.stored += 1;
        self.complete = self.slots.iter().all(Option::is_some);
        Ok(())
    }

    pub fn stored_count(&self) -> usize {
        self.stored
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Decode all bit planes into a column index map.
    ///
    /// A Gray bit is set where the inverted exposure is strictly brighter
    /// than the normal one (the normal plane lights columns whose bit is
    /// clear). Equal brightness decodes as 0.
    ///
    /// # Panics
    ///
    /// Panics if any (bit, polarity) exposure is missing.
    #[track_caller]
    pub fn compile(&self) -> DecodedFrame {
        assert!(
            self.complete,
            "compile() called with {} of {} exposures",
            self.stored,
            self.slots.len()
        );

        let planes: Vec<(&GrayImage, &GrayImage)> = self
            .slots
            .chunks_exact(2)
            .filter_map(|pair| Some((pair[0].as_ref()?, pair[1].as_ref()?)))
            .collect();
        self.decode(&planes)
    }

    /// Best-effort decode of the bit pairs captured so far, as 8-bit grayscale.
    ///
    /// Uses the completed pairs counted from the low bit, treating the
    /// missing high bits as 0. Returns `None` before the first pair is done.
    pub fn preview(&self) -> Option<GrayImage> {
        let planes: Vec<(&GrayImage, &GrayImage)> = self
            .slots
            .chunks_exact(2)
            .map_while(|pair| Some((pair[0].as_ref()?, pair[1].as_ref()?)))
            .collect();
        if planes.is_empty() {
            return None;
        }
        Some(self.decode(&planes).to_luma8())
    }

    /// Decode `planes`, ordered from the low bit upward.
    fn decode(&self, planes: &[(&GrayImage, &GrayImage)]) -> DecodedFrame {
        let (width, height) = self.dimensions.unwrap_or((0, 0));
        let mut frame = DecodedFrame::new(width, height, self.bit_range);
        let bits = planes.len() as f32;

        for (i, (index, confidence)) in frame
            .indices
            .iter_mut()
            .zip(frame.confidence.iter_mut())
            .enumerate()
        {
            let mut gray_code: u32 = 0;
            let mut total_confidence = 0.0f32;

            for (offset, (normal, inverted)) in planes.iter().enumerate().rev() {
                let normal = pixel(normal, i);
                let inverted = pixel(inverted, i);

                total_confidence += (normal as f32 - inverted as f32).abs() / 255.0;
                if inverted > normal {
                    gray_code |= 1 << offset;
                }
            }

            *index = gray_to_binary(gray_code);
            *confidence = total_confidence / bits;
        }

        frame
    }
}

fn pixel(image: &GrayImage, index: usize) -> u8 {
    image.as_raw().get(index).copied().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn flat(value: u8) -> GrayImage {
        GrayImage::from_pixel(2, 2, Luma([value]))
    }

    /// Exposures a camera would see for `columns` (one pixel per column).
    fn exposures_for(columns: &[u32], bit: u32, inverted: bool) -> GrayImage {
        let values: Vec<u8> = columns
            .iter()
            .map(|&x| {
                let lit = (crate::capture::binary_to_gray(x) >> bit) & 1 == 0;
                if lit != inverted {
                    220
                } else {
                    15
                }
            })
            .collect();
        GrayImage::from_raw(columns.len() as u32, 1, values).unwrap()
    }

    #[test]
    fn test_store_and_complete() {
        let range = BitRange::new(0, 7).unwrap();
        let mut acc = BitPlaneAccumulator::new(range);

        let mut count = 0;
        for bit in range.bits() {
            for inverted in [false, true] {
                assert!(!acc.is_complete(), "complete after {} exposures", count);
                assert!(!acc.has_exposure(bit, inverted));
                acc.store(bit, inverted, flat(10)).unwrap();
                assert!(acc.has_exposure(bit, inverted));
                count += 1;
            }
        }

        assert_eq!(count, 16);
        assert_eq!(acc.stored_count(), 16);
        assert!(acc.is_complete());
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let mut acc = BitPlaneAccumulator::new(BitRange::new(0, 7).unwrap());
        acc.store(3, false, flat(40)).unwrap();

        let result = acc.store(3, false, flat(99));
        assert_eq!(
            result,
            Err(CaptureError::DuplicateExposure { bit: 3, inverted: false })
        );
        assert_eq!(acc.exposure(3, false).unwrap().get_pixel(0, 0)[0], 40);
        assert_eq!(acc.stored_count(), 1);
        assert!(!acc.has_exposure(3, true));
    }

    #[test]
    fn test_rejects_out_of_range_and_mismatched_size() {
        let mut acc = BitPlaneAccumulator::new(BitRange::new(2, 4).unwrap());
        assert_eq!(
            acc.store(1, false, flat(0)),
            Err(CaptureError::BitOutOfRange { bit: 1 })
        );
        assert!(!acc.has_exposure(5, true));

        acc.store(2, false, flat(0)).unwrap();
        let wrong = GrayImage::new(3, 2);
        assert_eq!(
            acc.store(2, true, wrong),
            Err(CaptureError::FrameSizeMismatch {
                expected: (2, 2),
                actual: (3, 2),
            })
        );
        assert!(!acc.has_exposure(2, true));
    }

    #[test]
    #[should_panic(expected = "compile() called with 15 of 16 exposures")]
    fn test_premature_compile_panics() {
        let range = BitRange::new(0, 7).unwrap();
        let mut acc = BitPlaneAccumulator::new(range);
        for bit in range.bits() {
            acc.store(bit, false, flat(10)).unwrap();
            if bit != 7 {
                acc.store(bit, true, flat(10)).unwrap();
            }
        }
        acc.compile();
    }

    #[test]
    fn test_compile_recovers_columns() {
        let columns: Vec<u32> = (0..8).collect();
        let range = BitRange::new(0, 2).unwrap();
        let mut acc = BitPlaneAccumulator::new(range);
        for bit in range.bits() {
            for inverted in [false, true] {
                acc.store(bit, inverted, exposures_for(&columns, bit, inverted)).unwrap();
            }
        }

        let decoded = acc.compile();
        assert_eq!(decoded.indices, columns);
        assert!(decoded.confidence.iter().all(|&c| (c - 205.0 / 255.0).abs() < 1e-5));
    }

    #[test]
    fn test_compile_with_offset_range() {
        // Bits 2..=4 resolve groups of four projector columns.
        let columns: Vec<u32> = (0..32).collect();
        let range = BitRange::new(2, 4).unwrap();
        let mut acc = BitPlaneAccumulator::new(range);
        for bit in range.bits() {
            for inverted in [false, true] {
                acc.store(bit, inverted, exposures_for(&columns, bit, inverted)).unwrap();
            }
        }

        let decoded = acc.compile();
        let expected: Vec<u32> = columns.iter().map(|x| x >> 2).collect();
        assert_eq!(decoded.indices, expected);
    }

    #[test]
    fn test_tie_decodes_as_zero() {
        let range = BitRange::new(0, 2).unwrap();
        let mut acc = BitPlaneAccumulator::new(range);
        for bit in range.bits() {
            acc.store(bit, false, flat(128)).unwrap();
            acc.store(bit, true, flat(128)).unwrap();
        }

        let decoded = acc.compile();
        assert!(decoded.indices.iter().all(|&v| v == 0));
        assert!(decoded.confidence.iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_single_tied_bit() {
        // Bits 0 and 2 set (inverted brighter), bit 1 tied: Gray 0b101 -> binary 6.
        let range = BitRange::new(0, 2).unwrap();
        let mut acc = BitPlaneAccumulator::new(range);
        acc.store(0, false, flat(20)).unwrap();
        acc.store(0, true, flat(200)).unwrap();
        acc.store(1, false, flat(90)).unwrap();
        acc.store(1, true, flat(90)).unwrap();
        acc.store(2, false, flat(30)).unwrap();
        acc.store(2, true, flat(210)).unwrap();

        let decoded = acc.compile();
        assert!(decoded.indices.iter().all(|&v| v == 6));
    }

    #[test]
    fn test_preview_uses_completed_pairs() {
        let range = BitRange::new(0, 2).unwrap();
        let mut acc = BitPlaneAccumulator::new(range);
        assert!(acc.preview().is_none());

        acc.store(0, false, flat(20)).unwrap();
        assert!(acc.preview().is_none());

        acc.store(0, true, flat(200)).unwrap();
        let preview = acc.preview().unwrap();
        assert_eq!(preview.dimensions(), (2, 2));
        // Gray 0b001 -> binary 1 of 7.
        assert_eq!(preview.get_pixel(0, 0)[0], 36);
    }
}
