//! In-memory projection surface.

use super::pattern::Pattern;
use super::sequencer::ProjectionSurface;
use crate::render::render_pattern;
use image::RgbaImage;
use std::cell::RefCell;
use std::rc::Rc;

/// Image currently "on screen", shared with whoever looks at it.
pub type SharedFrame = Rc<RefCell<Option<RgbaImage>>>;

/// Renders patterns into a shared framebuffer instead of a physical display.
pub struct OffscreenSurface {
    width: u32,
    height: u32,
    max_brightness: u8,
    frame: SharedFrame,
    history: Vec<Pattern>,
}

impl OffscreenSurface {
    pub fn new(width: u32, height: u32, max_brightness: u8) -> Self {
        Self {
            width,
            height,
            max_brightness,
            frame: Rc::new(RefCell::new(None)),
            history: Vec::new(),
        }
    }

    /// Handle to the framebuffer, e.g. for a simulated camera.
    pub fn frame(&self) -> SharedFrame {
        Rc::clone(&self.frame)
    }

    /// Every pattern rendered so far, in order.
    pub fn history(&self) -> &[Pattern] {
        &self.history
    }
}

impl ProjectionSurface for OffscreenSurface {
    fn render(&mut self, pattern: &Pattern) {
        let image = render_pattern(pattern, self.width, self.height, self.max_brightness);
        *self.frame.borrow_mut() = Some(image);
        self.history.push(*pattern);
    }
}
