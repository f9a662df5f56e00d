//! Camera input for structured light capture.
//!
//! The capture pipeline only needs two things from a camera: a way to ask
//! for one exposure, and the exposure handed back once it is ready. The
//! hand-back happens outside this trait: whoever drives the camera calls
//! [`StructuredLightCapture::on_exposure_ready`](crate::capture::StructuredLightCapture::on_exposure_ready)
//! with the [`RawExposure`] carrying the tag it was requested with.

mod simulated;

pub use simulated::SimulatedCamera;

use image::GrayImage;
use thiserror::Error;

/// Identity of one requested exposure. Cameras echo it back untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExposureTag {
    /// Session that issued the request.
    pub session: u64,
    /// Gray code bit on the projector while exposing.
    pub bit: u32,
    /// Whether the projected bit plane was inverted.
    pub inverted: bool,
}

/// One camera frame, tagged with the pattern it was exposed under.
#[derive(Debug, Clone)]
pub struct RawExposure {
    pub tag: ExposureTag,
    /// Luminance samples.
    pub image: GrayImage,
}

impl RawExposure {
    pub fn new(tag: ExposureTag, image: GrayImage) -> Self {
        Self { tag, image }
    }
}

/// Camera error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera disconnected")]
    Disconnected,
    #[error("exposure request rejected: {0}")]
    RequestRejected(String),
}

/// A device able to take single exposures on request.
pub trait ExposureSource {
    /// Start an exposure. The frame arrives later as a [`RawExposure`] with `tag`.
    fn request_exposure(&mut self, tag: ExposureTag) -> Result<(), CameraError>;
}
