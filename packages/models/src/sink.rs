use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use crate::{Event, PhilosopherState};

/// The single external collaborator of the demos: something that accepts
/// events for display.
///
/// Demos call `emit` from many tasks at once, so implementations must be
/// cheap and must not block for long.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

impl<F: Fn(Event) + Send + Sync> EventSink for F {
    fn emit(&self, event: Event) {
        self(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, event: Event) {
        log::trace!("NullSink: dropping {event}");
    }
}

/// An event with its position in the log and the instant it was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub sequence: usize,
    pub at: Instant,
    pub event: Event,
}

/// Keeps every event in emission order.
///
/// Emission is serialized by an internal lock, so the recorded order is a
/// total order consistent with what each task observed.
#[derive(Debug)]
pub struct RecordingSink {
    started: Instant,
    events: Mutex<Vec<Recorded>>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            events: Mutex::new(vec![]),
        }
    }

    /// A panic while recording leaves a complete `Vec`, so poisoning is
    /// ignored.
    fn recorded(&self) -> MutexGuard<'_, Vec<Recorded>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<Recorded> {
        self.recorded().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.recorded().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time between creating the sink and recording `recorded`.
    #[must_use]
    pub fn offset(&self, recorded: &Recorded) -> Duration {
        recorded.at.duration_since(self.started)
    }

    /// Items in the order they were produced.
    #[must_use]
    pub fn produced_items(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|x| match x.event {
                Event::ItemProduced { item, .. } => Some(item),
                _ => None,
            })
            .collect()
    }

    /// Items in the order they were consumed.
    #[must_use]
    pub fn consumed_items(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|x| match x.event {
                Event::ItemConsumed { item, .. } => Some(item),
                _ => None,
            })
            .collect()
    }

    /// `(id, round, state)` for every philosopher transition, in order.
    #[must_use]
    pub fn philosopher_transitions(&self) -> Vec<(usize, usize, PhilosopherState)> {
        self.events()
            .into_iter()
            .filter_map(|x| match x.event {
                Event::PhilosopherStateChanged { id, round, state } => Some((id, round, state)),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: Event) {
        let mut events = self.recorded();
        let sequence = events.len();
        events.push(Recorded {
            sequence,
            at: Instant::now(),
            event,
        });
    }
}
