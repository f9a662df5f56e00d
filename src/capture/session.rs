//! Structured light capture state machine.
//!
//! [`StructuredLightCapture`] walks the bit planes of its [`BitRange`] in the
//! order (low, normal), (low, inverted), (low + 1, normal), ... For each step
//! it asks the shared sequencer for the pattern, waits until that pattern is
//! reported on screen, asks its camera for one exposure, and stores the frame.
//! When the last step is stored the planes are decoded and the result is
//! published to subscribers.

use super::accumulator::BitPlaneAccumulator;
use super::decoder::DecodedFrame;
use super::error::CaptureError;
use super::gray_code::BitRange;
use crate::camera::{ExposureSource, ExposureTag, RawExposure};
use crate::projector::{Pattern, SequencerEvent, SequencerHandle, SubscriberId};
use crossbeam_channel::{unbounded, Receiver, Sender};
use image::GrayImage;

/// Kind of frame a caller asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Gray code decoded column indices.
    Binary,
    /// Color frames come from the underlying camera, not from here.
    Color,
}

/// State of the capture pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Ready for a new request.
    Idle,
    /// Waiting for the sequencer to report the expected pattern.
    AwaitingProjection,
    /// Waiting for the camera to deliver the expected exposure.
    AwaitingExposure,
    /// All planes stored, decoding.
    Compiling,
    /// Decoded frame published.
    Done,
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, CaptureState::Idle)
    }
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "Idle"),
            CaptureState::AwaitingProjection => write!(f, "Awaiting Projection"),
            CaptureState::AwaitingExposure => write!(f, "Awaiting Exposure"),
            CaptureState::Compiling => write!(f, "Compiling"),
            CaptureState::Done => write!(f, "Done"),
        }
    }
}

/// Notifications published by the capture pipeline.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// Partial decode (or the raw exposure) for display only.
    Intermediate(GrayImage),
    /// Final decode, exactly once per successful session.
    Decoded(DecodedFrame),
    /// The session was abandoned.
    Failed(String),
}

/// Mutable state of one in-flight capture.
#[derive(Debug)]
pub struct CaptureSession {
    pub id: u64,
    pub kind: FrameKind,
    pub current_bit: u32,
    pub current_inverted: bool,
    pub accumulator: BitPlaneAccumulator,
}

impl CaptureSession {
    fn new(id: u64, kind: FrameKind, bit_range: BitRange) -> Self {
        Self {
            id,
            kind,
            current_bit: bit_range.low_bit(),
            current_inverted: false,
            accumulator: BitPlaneAccumulator::new(bit_range),
        }
    }

    /// Tag of the exposure this session is waiting for.
    pub fn expected_tag(&self) -> ExposureTag {
        ExposureTag {
            session: self.id,
            bit: self.current_bit,
            inverted: self.current_inverted,
        }
    }

    /// Pattern this session is waiting for.
    pub fn expected_pattern(&self) -> Pattern {
        Pattern::bit_plane(self.current_bit, self.current_inverted)
    }

    /// Step to the next (bit, polarity). Returns false once past the high bit.
    fn advance(&mut self) -> bool {
        if !self.current_inverted {
            self.current_inverted = true;
        } else {
            self.current_inverted = false;
            self.current_bit += 1;
        }
        self.current_bit <= self.accumulator.bit_range().high_bit()
    }
}

/// Binds one camera, one sequencer subscription and one accumulator.
pub struct StructuredLightCapture<C: ExposureSource> {
    camera: C,
    sequencer: SequencerHandle,
    bit_range: BitRange,
    state: CaptureState,
    session: Option<CaptureSession>,
    next_session_id: u64,
    subscribers: Vec<Sender<CaptureEvent>>,
    /// Emit intermediate previews.
    pub preview_enabled: bool,
}

impl<C: ExposureSource> StructuredLightCapture<C> {
    pub fn new(camera: C, sequencer: SequencerHandle) -> Self {
        Self {
            camera,
            sequencer,
            bit_range: BitRange::default(),
            state: CaptureState::Idle,
            session: None,
            next_session_id: 1,
            subscribers: Vec::new(),
            preview_enabled: true,
        }
    }

    /// Receive intermediate and decoded frames.
    pub fn subscribe(&mut self) -> Receiver<CaptureEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Set the bit planes to capture. Rejected while a capture is running.
    pub fn set_bit_range(&mut self, low_bit: u32, high_bit: u32) -> Result<(), CaptureError> {
        if !self.state.is_idle() {
            return Err(CaptureError::Busy);
        }
        self.bit_range = BitRange::new(low_bit, high_bit)?;
        log::info!("Capture {}: {}", self.sequencer.id(), self.bit_range);
        Ok(())
    }

    pub fn bit_range(&self) -> BitRange {
        self.bit_range
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut C {
        &mut self.camera
    }

    /// Fraction of the session's exposures stored (0.0 when idle).
    pub fn progress(&self) -> f32 {
        match &self.session {
            Some(session) => {
                let acc = &session.accumulator;
                acc.stored_count() as f32 / acc.bit_range().exposure_count() as f32
            }
            None => 0.0,
        }
    }

    fn transition(&mut self, next: CaptureState) {
        log::debug!("Capture {}: {} -> {}", self.sequencer.id(), self.state, next);
        self.state = next;
    }

    /// Start capturing a frame.
    pub fn request_frame(&mut self, kind: FrameKind) -> Result<(), CaptureError> {
        if kind != FrameKind::Binary {
            return Err(CaptureError::UnsupportedFrameType(kind));
        }
        if !self.state.is_idle() {
            return Err(CaptureError::Busy);
        }

        let id = self.next_session_id;
        self.next_session_id += 1;
        let session = CaptureSession::new(id, kind, self.bit_range);
        let pattern = session.expected_pattern();

        log::info!(
            "Capture {}: session {} started ({:?}, {} exposures)",
            self.sequencer.id(),
            id,
            session.kind,
            self.bit_range.exposure_count()
        );
        self.session = Some(session);

        // Notifications from before this request belong to nobody here.
        self.discard_sequencer_events();
        self.transition(CaptureState::AwaitingProjection);
        self.sequencer.request(pattern);
        Ok(())
    }

    fn discard_sequencer_events(&self) {
        let stale = self.sequencer.events().count();
        if stale > 0 {
            log::debug!("Capture {}: dropped {} stale sequencer events", self.sequencer.id(), stale);
        }
    }

    /// Drain sequencer notifications.
    pub fn process_events(&mut self) {
        let events: Vec<SequencerEvent> = self.sequencer.events().collect();
        for event in events {
            match event {
                SequencerEvent::Projected { pattern, holders } => {
                    self.on_pattern_projected(&pattern, &holders)
                }
                SequencerEvent::SequenceComplete => {
                    log::debug!("Capture {}: sequence complete", self.sequencer.id());
                }
            }
        }
    }

    /// A pattern is on screen on behalf of `holders`. Ignored unless it is
    /// the one this session waits for and this capture holds the display.
    pub fn on_pattern_projected(&mut self, pattern: &Pattern, holders: &[SubscriberId]) {
        if self.state != CaptureState::AwaitingProjection {
            log::debug!("Capture {}: {} projected while {}", self.sequencer.id(), pattern, self.state);
            return;
        }
        let Some(session) = &self.session else {
            return;
        };
        if *pattern != session.expected_pattern() {
            log::debug!("Capture {}: ignoring {}", self.sequencer.id(), pattern);
            return;
        }
        if !holders.contains(&self.sequencer.id()) {
            log::debug!("Capture {}: {} shown without our hold", self.sequencer.id(), pattern);
            return;
        }

        let tag = session.expected_tag();
        self.transition(CaptureState::AwaitingExposure);
        if let Err(e) = self.camera.request_exposure(tag) {
            log::error!("Capture {}: exposure request failed: {}", self.sequencer.id(), e);
            self.fail(CaptureError::from(e).to_string());
        }
    }

    /// The camera delivered an exposure.
    pub fn on_exposure_ready(&mut self, exposure: RawExposure) {
        if self.state != CaptureState::AwaitingExposure {
            log::debug!(
                "Capture {}: exposure {:?} arrived while {}",
                self.sequencer.id(),
                exposure.tag,
                self.state
            );
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let expected = session.expected_tag();
        if exposure.tag != expected {
            log::warn!(
                "Capture {}: discarding exposure {:?}, expected {:?}",
                self.sequencer.id(),
                exposure.tag,
                expected
            );
            return;
        }

        let RawExposure { tag, image } = exposure;
        match session.accumulator.store(tag.bit, tag.inverted, image) {
            Ok(()) => {}
            Err(e @ CaptureError::DuplicateExposure { .. }) => {
                log::warn!("Capture {}: {}", self.sequencer.id(), e);
                return;
            }
            Err(e) => {
                log::error!("Capture {}: {}", self.sequencer.id(), e);
                self.fail(e.to_string());
                return;
            }
        }
        log::debug!(
            "Capture {}: stored bit {} (inverted: {})",
            self.sequencer.id(),
            tag.bit,
            tag.inverted
        );

        // The camera is done with the pattern on screen.
        self.sequencer.release();

        if self.preview_enabled {
            let preview = session
                .accumulator
                .preview()
                .or_else(|| session.accumulator.exposure(tag.bit, tag.inverted).cloned());
            if let Some(preview) = preview {
                self.publish(CaptureEvent::Intermediate(preview));
            }
        }

        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.advance() {
            let pattern = session.expected_pattern();
            self.transition(CaptureState::AwaitingProjection);
            self.sequencer.request(pattern);
        } else {
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.transition(CaptureState::Compiling);
        let Some(session) = self.session.take() else {
            return;
        };
        let decoded = session.accumulator.compile();
        log::info!(
            "Capture {}: session {} decoded {}x{} ({} columns)",
            self.sequencer.id(),
            session.id,
            decoded.width,
            decoded.height,
            self.bit_range.column_count()
        );
        self.publish(CaptureEvent::Decoded(decoded));
        self.transition(CaptureState::Done);
        self.transition(CaptureState::Idle);
    }

    /// Discard the in-flight session. Returns false if nothing was running.
    pub fn abort(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        self.sequencer.release();
        self.discard_sequencer_events();
        self.transition(CaptureState::Idle);
        log::info!("Capture {}: session {} aborted", self.sequencer.id(), session.id);
        true
    }

    fn fail(&mut self, reason: String) {
        if self.abort() {
            self.publish(CaptureEvent::Failed(reason));
        }
    }

    fn publish(&mut self, event: CaptureEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
