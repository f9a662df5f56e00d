//! Capture error taxonomy.

use super::session::FrameKind;
use crate::camera::CameraError;
use thiserror::Error;

/// Errors surfaced by the capture pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Bit range with `low_bit >= high_bit` (or beyond the decode word).
    #[error("invalid bit range: low bit {low_bit} must be below high bit {high_bit} (max 31)")]
    InvalidConfiguration { low_bit: u32, high_bit: u32 },

    /// A capture session is already in flight.
    #[error("capture already in progress")]
    Busy,

    /// Only binary structured light frames can be produced.
    #[error("unsupported frame type: {0:?}")]
    UnsupportedFrameType(FrameKind),

    /// The (bit, polarity) slot already holds an exposure.
    #[error("duplicate exposure for bit {bit} (inverted: {inverted})")]
    DuplicateExposure { bit: u32, inverted: bool },

    /// Bit outside the session's bit range.
    #[error("bit {bit} outside the configured range")]
    BitOutOfRange { bit: u32 },

    /// Exposure dimensions differ from the ones already stored.
    #[error("exposure is {actual:?}, expected {expected:?}")]
    FrameSizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
}
