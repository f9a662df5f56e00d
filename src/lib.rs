//! Gray Code Structured Light Scanner
//!
//! Captures a per-pixel projector column index by:
//! - Projecting Gray code bit planes (normal and inverted)
//! - Pairing each projected pattern with exactly one camera exposure
//! - Decoding the accumulated bit planes back to binary column indices

pub mod camera;
pub mod capture;
pub mod config;
pub mod projector;
pub mod render;
