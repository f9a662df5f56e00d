//! Structured light capture: Gray code conversion, bit plane accumulation and decoding.

mod accumulator;
mod decoder;
mod error;
mod gray_code;
mod session;

pub use accumulator::BitPlaneAccumulator;
pub use decoder::DecodedFrame;
pub use error::CaptureError;
pub use gray_code::{binary_to_gray, gray_to_binary, BitRange, WORD_BITS};
pub use session::{
    CaptureEvent, CaptureSession, CaptureState, FrameKind, StructuredLightCapture,
};
