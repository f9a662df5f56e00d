//! Projector output management module.

mod offscreen;
mod pattern;
mod sequencer;

pub use offscreen::{OffscreenSurface, SharedFrame};
pub use pattern::Pattern;
pub use sequencer::{
    AdvanceOutcome, PatternSequencer, ProjectionSurface, SequencerEvent, SequencerHandle,
    SubscriberId,
};
