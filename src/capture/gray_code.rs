//! Gray code conversion and bit range configuration.

use super::error::CaptureError;
use serde::{Deserialize, Serialize};

/// Width of the decode word in bits.
pub const WORD_BITS: u32 = u32::BITS;

/// Convert binary value to Gray code.
pub fn binary_to_gray(binary: u32) -> u32 {
    binary ^ (binary >> 1)
}

/// Convert Gray code back to binary.
pub fn gray_to_binary(gray: u32) -> u32 {
    let mut binary = gray;
    let mut shift = 1;
    while shift < WORD_BITS {
        binary ^= binary >> shift;
        shift *= 2;
    }
    binary
}

/// Inclusive range of Gray code bit planes captured in one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBitRange", into = "RawBitRange")]
pub struct BitRange {
    low_bit: u32,
    high_bit: u32,
}

#[derive(Serialize, Deserialize)]
struct RawBitRange {
    low_bit: u32,
    high_bit: u32,
}

impl TryFrom<RawBitRange> for BitRange {
    type Error = CaptureError;

    fn try_from(raw: RawBitRange) -> Result<Self, Self::Error> {
        BitRange::new(raw.low_bit, raw.high_bit)
    }
}

impl From<BitRange> for RawBitRange {
    fn from(range: BitRange) -> Self {
        Self {
            low_bit: range.low_bit,
            high_bit: range.high_bit,
        }
    }
}

impl BitRange {
    /// Create a range; `low_bit` must be below `high_bit` and both must fit the decode word.
    pub fn new(low_bit: u32, high_bit: u32) -> Result<Self, CaptureError> {
        if low_bit >= high_bit || high_bit >= WORD_BITS {
            return Err(CaptureError::InvalidConfiguration { low_bit, high_bit });
        }
        Ok(Self { low_bit, high_bit })
    }

    pub fn low_bit(&self) -> u32 {
        self.low_bit
    }

    pub fn high_bit(&self) -> u32 {
        self.high_bit
    }

    /// Number of bit planes in the range.
    pub fn bit_count(&self) -> u32 {
        self.high_bit - self.low_bit + 1
    }

    /// Number of distinguishable projector columns.
    pub fn column_count(&self) -> u64 {
        1u64 << self.bit_count()
    }

    /// Exposures needed to complete a session (both polarities per bit).
    pub fn exposure_count(&self) -> usize {
        (self.bit_count() * 2) as usize
    }

    pub fn contains(&self, bit: u32) -> bool {
        (self.low_bit..=self.high_bit).contains(&bit)
    }

    /// Bits in capture order, lowest first.
    pub fn bits(&self) -> impl DoubleEndedIterator<Item = u32> {
        self.low_bit..=self.high_bit
    }
}

impl Default for BitRange {
    /// Eight bit planes, 256 columns.
    fn default() -> Self {
        Self {
            low_bit: 0,
            high_bit: 7,
        }
    }
}

impl std::fmt::Display for BitRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bits {}..={}", self.low_bit, self.high_bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_code_conversion() {
        for i in 0..65536 {
            let gray = binary_to_gray(i);
            assert_eq!(i, gray_to_binary(gray), "Failed for {}", i);
        }
    }

    #[test]
    fn test_gray_code_extremes() {
        let samples = [
            0,
            1,
            u32::MAX,
            u32::MAX - 1,
            1 << 31,
            (1 << 31) - 1,
            0xDEAD_BEEF,
            0x5555_5555,
            0xAAAA_AAAA,
        ];
        for &n in &samples {
            assert_eq!(gray_to_binary(binary_to_gray(n)), n, "Failed for {:#x}", n);
            assert_eq!(binary_to_gray(gray_to_binary(n)), n, "Inverse failed for {:#x}", n);
        }

        // Sparse sweep over the full word.
        let mut n: u32 = 0;
        loop {
            assert_eq!(gray_to_binary(binary_to_gray(n)), n);
            match n.checked_add(65_521) {
                Some(next) => n = next,
                None => break,
            }
        }
    }

    #[test]
    fn test_gray_code_adjacency() {
        for x in 0..100_000u32 {
            let diff = binary_to_gray(x) ^ binary_to_gray(x + 1);
            assert_eq!(diff.count_ones(), 1, "{} and {} differ in {} bits", x, x + 1, diff.count_ones());
        }
        let top = binary_to_gray(u32::MAX - 1) ^ binary_to_gray(u32::MAX);
        assert_eq!(top.count_ones(), 1);
    }

    #[test]
    fn test_bit_range_validation() {
        assert!(BitRange::new(0, 7).is_ok());
        assert!(BitRange::new(3, 4).is_ok());
        assert!(BitRange::new(0, 31).is_ok());

        assert!(matches!(
            BitRange::new(4, 4),
            Err(CaptureError::InvalidConfiguration { low_bit: 4, high_bit: 4 })
        ));
        assert!(BitRange::new(5, 2).is_err());
        assert!(BitRange::new(0, 32).is_err());
    }

    #[test]
    fn test_bit_range_counts() {
        let range = BitRange::new(0, 7).unwrap();
        assert_eq!(range.bit_count(), 8);
        assert_eq!(range.column_count(), 256);
        assert_eq!(range.exposure_count(), 16);

        let range = BitRange::new(2, 4).unwrap();
        assert_eq!(range.bits().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert!(range.contains(3));
        assert!(!range.contains(1));
        assert!(!range.contains(5));
    }

    #[test]
    fn test_bit_range_deserialize_rejects_invalid() {
        let ok: BitRange = serde_json::from_str(r#"{"low_bit":1,"high_bit":6}"#).unwrap();
        assert_eq!((ok.low_bit(), ok.high_bit()), (1, 6));

        let bad = serde_json::from_str::<BitRange>(r#"{"low_bit":6,"high_bit":1}"#);
        assert!(bad.is_err());
    }
}
