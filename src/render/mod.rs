//! Pattern image synthesis for the projector.

mod pattern;

pub use pattern::{render_bit_plane, render_flat_field, render_pattern, render_sinusoid};
