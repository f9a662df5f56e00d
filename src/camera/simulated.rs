//! Simulated camera photographing an in-memory projection surface.

use super::{CameraError, ExposureSource, ExposureTag, RawExposure};
use crate::projector::SharedFrame;
use image::{GrayImage, Luma};
use std::collections::VecDeque;

/// Camera that "sees" a [`SharedFrame`] as a flat, evenly lit scene.
///
/// Requested exposures queue up until [`take_exposure`](Self::take_exposure)
/// is called, which stands in for the device's frame-ready signal.
pub struct SimulatedCamera {
    scene: SharedFrame,
    width: u32,
    height: u32,
    /// Constant light added to every pixel.
    ambient: u8,
    /// Fraction of projector light reflected back (0.0-1.0).
    gain: f32,
    pending: VecDeque<ExposureTag>,
    connected: bool,
    requested: usize,
}

impl SimulatedCamera {
    pub fn new(scene: SharedFrame, width: u32, height: u32) -> Self {
        Self {
            scene,
            width,
            height,
            ambient: 0,
            gain: 1.0,
            pending: VecDeque::new(),
            connected: true,
            requested: 0,
        }
    }

    pub fn with_lighting(mut self, ambient: u8, gain: f32) -> Self {
        self.ambient = ambient;
        self.gain = gain.clamp(0.0, 1.0);
        self
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Total exposure requests accepted.
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Complete the oldest pending exposure.
    pub fn take_exposure(&mut self) -> Option<RawExposure> {
        let tag = self.pending.pop_front()?;
        Some(RawExposure::new(tag, self.expose()))
    }

    fn expose(&self) -> GrayImage {
        let scene = self.scene.borrow();
        // Nothing shown yet, or a degenerate frame: ambient light only.
        let Some(scene) = scene.as_ref().filter(|s| s.width() > 0 && s.height() > 0) else {
            return GrayImage::from_pixel(self.width, self.height, Luma([self.ambient]));
        };

        let (scene_w, scene_h) = scene.dimensions();
        GrayImage::from_fn(self.width, self.height, |x, y| {
            // Nearest-neighbour resample onto the sensor.
            let sx = (x as u64 * scene_w as u64 / self.width as u64) as u32;
            let sy = (y as u64 * scene_h as u64 / self.height as u64) as u32;
            let [r, g, b, _] = scene.get_pixel(sx, sy).0;
            let luma = (r as u32 + g as u32 + b as u32) as f32 / 3.0;
            let value = self.ambient as f32 + luma * self.gain;
            Luma([value.round().clamp(0.0, 255.0) as u8])
        })
    }
}

impl ExposureSource for SimulatedCamera {
    fn request_exposure(&mut self, tag: ExposureTag) -> Result<(), CameraError> {
        if !self.connected {
            return Err(CameraError::Disconnected);
        }
        self.pending.push_back(tag);
        self.requested += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector::{OffscreenSurface, Pattern, ProjectionSurface};

    fn tag(bit: u32, inverted: bool) -> ExposureTag {
        ExposureTag {
            session: 1,
            bit,
            inverted,
        }
    }

    #[test]
    fn test_exposure_sees_projected_pattern() {
        let mut surface = OffscreenSurface::new(8, 2, 200);
        let mut camera = SimulatedCamera::new(surface.frame(), 8, 2).with_lighting(10, 0.5);

        surface.render(&Pattern::bit_plane(0, false));
        camera.request_exposure(tag(0, false)).unwrap();
        let exposure = camera.take_exposure().unwrap();

        assert_eq!(exposure.tag, tag(0, false));
        assert_eq!(exposure.image.get_pixel(0, 0)[0], 110);
        assert_eq!(exposure.image.get_pixel(1, 1)[0], 10);
        assert!(camera.take_exposure().is_none());
    }

    #[test]
    fn test_resamples_to_sensor_size() {
        let mut surface = OffscreenSurface::new(16, 4, 255);
        let mut camera = SimulatedCamera::new(surface.frame(), 8, 2);
        surface.render(&Pattern::bit_plane(1, false));
        camera.request_exposure(tag(1, false)).unwrap();
        let exposure = camera.take_exposure().unwrap();
        assert_eq!(exposure.image.dimensions(), (8, 2));
        // Sensor column 1 samples projector column 2 (Gray 3, bit 1 set).
        assert_eq!(exposure.image.get_pixel(1, 0)[0], 0);
        assert_eq!(exposure.image.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_empty_scene_gives_ambient() {
        let mut surface = OffscreenSurface::new(0, 4, 255);
        let mut camera = SimulatedCamera::new(surface.frame(), 8, 4).with_lighting(7, 1.0);
        surface.render(&Pattern::white());
        camera.request_exposure(tag(0, false)).unwrap();
        let exposure = camera.take_exposure().unwrap();
        assert_eq!(exposure.image.dimensions(), (8, 4));
        assert!(exposure.image.pixels().all(|p| p[0] == 7));
    }

    #[test]
    fn test_disconnected_camera_rejects_requests() {
        let surface = OffscreenSurface::new(4, 4, 255);
        let mut camera = SimulatedCamera::new(surface.frame(), 4, 4);
        camera.set_connected(false);
        assert_eq!(camera.request_exposure(tag(0, false)), Err(CameraError::Disconnected));
        assert_eq!(camera.requested(), 0);
    }
}
