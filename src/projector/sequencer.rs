//! Shared projection sequence.
//!
//! One [`PatternSequencer`] owns the projection surface. Capture pipelines
//! subscribe and get a [`SequencerHandle`]: a channel pair used to ask for
//! patterns and to hear which pattern is actually on screen. A pattern that
//! somebody asked for stays on screen until every requester has released it,
//! so two pipelines sharing one projector never expose under each other's
//! pattern.

use super::pattern::Pattern;
use crossbeam_channel::{unbounded, Receiver, Sender, TryIter};
use std::collections::VecDeque;

/// Identifier of a sequencer subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u32);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Notifications broadcast to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SequencerEvent {
    /// The pattern is now on screen, held by `holders`. Patterns enqueued
    /// directly are shown with no holders.
    Projected {
        pattern: Pattern,
        holders: Vec<SubscriberId>,
    },
    /// Display is free and nothing is queued.
    SequenceComplete,
}

/// Requests sent from subscribers to the sequencer.
#[derive(Debug)]
enum SequencerCommand {
    Project {
        subscriber: SubscriberId,
        pattern: Pattern,
    },
    Release {
        subscriber: SubscriberId,
    },
}

/// Outcome of [`PatternSequencer::advance`].
#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    /// The pattern was handed to the surface.
    Rendering(Pattern),
    /// A render is in flight or the shown pattern is still held.
    Busy,
    /// The queue is empty.
    SequenceComplete,
}

/// A display the sequencer renders to.
pub trait ProjectionSurface {
    /// Begin showing `pattern`. Completion is reported back through
    /// [`PatternSequencer::pattern_displayed`].
    fn render(&mut self, pattern: &Pattern);
}

/// Subscriber side of the sequencer.
#[derive(Debug)]
pub struct SequencerHandle {
    id: SubscriberId,
    commands: Sender<SequencerCommand>,
    events: Receiver<SequencerEvent>,
}

impl SequencerHandle {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Ask for `pattern` to be shown. It stays up until [`release`](Self::release).
    pub fn request(&self, pattern: Pattern) {
        let command = SequencerCommand::Project {
            subscriber: self.id,
            pattern,
        };
        if self.commands.send(command).is_err() {
            log::warn!("Sequencer gone, dropping request for {}", pattern);
        }
    }

    /// Give up any pattern shown or queued on behalf of this subscriber.
    pub fn release(&self) {
        let _ = self.commands.send(SequencerCommand::Release { subscriber: self.id });
    }

    /// Drain pending notifications without blocking.
    pub fn events(&self) -> TryIter<'_, SequencerEvent> {
        self.events.try_iter()
    }
}

#[derive(Debug)]
struct QueuedPattern {
    pattern: Pattern,
    /// Subscribers waiting on this pattern. Empty for patterns enqueued directly.
    requesters: Vec<SubscriberId>,
}

#[derive(Debug)]
enum DisplayState {
    /// Nothing held on screen.
    Free,
    /// Handed to the surface, not yet confirmed.
    Rendering(QueuedPattern),
    /// On screen and held by its requesters.
    Showing(QueuedPattern),
}

/// Ordered pattern queue driving one projection surface.
pub struct PatternSequencer<S: ProjectionSurface> {
    surface: S,
    queue: VecDeque<QueuedPattern>,
    display: DisplayState,
    subscribers: Vec<(SubscriberId, Sender<SequencerEvent>)>,
    command_tx: Sender<SequencerCommand>,
    command_rx: Receiver<SequencerCommand>,
    next_subscriber: u32,
    complete_signalled: bool,
    projected_count: u64,
}

impl<S: ProjectionSurface> PatternSequencer<S> {
    pub fn new(surface: S) -> Self {
        let (command_tx, command_rx) = unbounded();
        Self {
            surface,
            queue: VecDeque::new(),
            display: DisplayState::Free,
            subscribers: Vec::new(),
            command_tx,
            command_rx,
            next_subscriber: 0,
            complete_signalled: true,
            projected_count: 0,
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&mut self) -> SequencerHandle {
        let id = SubscriberId(self.next_subscriber);
        self.next_subscriber += 1;

        let (event_tx, event_rx) = unbounded();
        self.subscribers.push((id, event_tx));
        log::debug!("Sequencer: subscriber {} registered", id);

        SequencerHandle {
            id,
            commands: self.command_tx.clone(),
            events: event_rx,
        }
    }

    /// Append a pattern. No duplicate suppression.
    pub fn enqueue(&mut self, pattern: Pattern) {
        self.queue.push_back(QueuedPattern {
            pattern,
            requesters: Vec::new(),
        });
        self.complete_signalled = false;
    }

    /// Hand the next queued pattern to the surface.
    pub fn advance(&mut self) -> AdvanceOutcome {
        let free = match &self.display {
            DisplayState::Free => true,
            DisplayState::Rendering(_) => false,
            DisplayState::Showing(entry) => entry.requesters.is_empty(),
        };
        if !free {
            return AdvanceOutcome::Busy;
        }

        match self.queue.pop_front() {
            Some(entry) => {
                let pattern = entry.pattern;
                log::debug!("Sequencer: rendering {}", pattern);
                self.surface.render(&pattern);
                self.display = DisplayState::Rendering(entry);
                AdvanceOutcome::Rendering(pattern)
            }
            None => {
                self.display = DisplayState::Free;
                if !self.complete_signalled {
                    self.complete_signalled = true;
                    log::debug!("Sequencer: sequence complete");
                    self.broadcast(SequencerEvent::SequenceComplete);
                }
                AdvanceOutcome::SequenceComplete
            }
        }
    }

    /// The surface confirms the in-flight pattern is on screen.
    ///
    /// Pending subscriber commands are applied first, so the holders in the
    /// notification never include a subscriber that already released.
    pub fn pattern_displayed(&mut self) -> Option<Pattern> {
        self.apply_commands();
        match std::mem::replace(&mut self.display, DisplayState::Free) {
            DisplayState::Rendering(entry) => {
                let event = SequencerEvent::Projected {
                    pattern: entry.pattern,
                    holders: entry.requesters.clone(),
                };
                let pattern = entry.pattern;
                self.projected_count += 1;
                self.display = DisplayState::Showing(entry);
                self.broadcast(event);
                Some(pattern)
            }
            other => {
                log::warn!("Sequencer: display confirmation with no render in flight");
                self.display = other;
                None
            }
        }
    }

    /// Apply subscriber requests, then advance if the display is free.
    pub fn pump(&mut self) -> AdvanceOutcome {
        self.apply_commands();
        self.advance()
    }

    fn apply_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                SequencerCommand::Project { subscriber, pattern } => {
                    self.handle_request(subscriber, pattern)
                }
                SequencerCommand::Release { subscriber } => self.handle_release(subscriber),
            }
        }
    }

    fn handle_request(&mut self, subscriber: SubscriberId, pattern: Pattern) {
        match &mut self.display {
            // Already up and nothing else waiting: hold it and tell the requester.
            DisplayState::Showing(entry) if entry.pattern == pattern && self.queue.is_empty() => {
                entry.requesters.push(subscriber);
                log::debug!("Sequencer: {} joins {} already on screen", subscriber, pattern);
                let event = SequencerEvent::Projected {
                    pattern,
                    holders: entry.requesters.clone(),
                };
                self.notify(subscriber, event);
                return;
            }
            DisplayState::Rendering(entry) if entry.pattern == pattern => {
                entry.requesters.push(subscriber);
                return;
            }
            _ => {}
        }

        if let Some(entry) = self.queue.iter_mut().find(|e| e.pattern == pattern) {
            entry.requesters.push(subscriber);
            return;
        }

        self.queue.push_back(QueuedPattern {
            pattern,
            requesters: vec![subscriber],
        });
        self.complete_signalled = false;
    }

    fn handle_release(&mut self, subscriber: SubscriberId) {
        match &mut self.display {
            DisplayState::Rendering(entry) | DisplayState::Showing(entry) => {
                entry.requesters.retain(|&id| id != subscriber);
            }
            DisplayState::Free => {}
        }

        // Drop queued patterns nobody wants any more; directly enqueued ones stay.
        self.queue.retain_mut(|entry| {
            if entry.requesters.is_empty() {
                return true;
            }
            entry.requesters.retain(|&id| id != subscriber);
            !entry.requesters.is_empty()
        });
    }

    fn broadcast(&mut self, event: SequencerEvent) {
        self.subscribers.retain(|(id, tx)| {
            let alive = tx.send(event.clone()).is_ok();
            if !alive {
                log::debug!("Sequencer: subscriber {} disconnected", id);
            }
            alive
        });
    }

    fn notify(&self, subscriber: SubscriberId, event: SequencerEvent) {
        if let Some((_, tx)) = self.subscribers.iter().find(|(id, _)| *id == subscriber) {
            let _ = tx.send(event);
        }
    }

    pub fn is_rendering(&self) -> bool {
        matches!(self.display, DisplayState::Rendering(_))
    }

    /// Number of patterns confirmed on screen so far.
    pub fn projected_count(&self) -> u64 {
        self.projected_count
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}
