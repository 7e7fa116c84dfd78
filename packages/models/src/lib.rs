#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Events announced by the classic sync demos.
//!
//! The demos never render anything themselves. Every state transition is
//! handed to an [`EventSink`] as a structured [`Event`], and the driver
//! decides how (or whether) to display it.

use serde::{Deserialize, Serialize};
use strum_macros::AsRefStr;

mod sink;

pub use sink::{EventSink, NullSink, Recorded, RecordingSink};

macro_rules! impl_display_as_ref {
    ($($type:ty),+ $(,)?) => {
        $(
            impl std::fmt::Display for $type {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(self.as_ref())
                }
            }
        )+
    };
}

/// Per-seat state of a dining philosopher.
///
/// A seat cycles `Thinking -> WaitingForGate -> WaitingForForks -> Eating`
/// once per round and ends in `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
pub enum PhilosopherState {
    Thinking,
    WaitingForGate,
    WaitingForForks,
    Eating,
    Done,
}

impl PhilosopherState {
    /// Whether the seat holds an admission permit in this state.
    #[must_use]
    pub const fn is_attempting(self) -> bool {
        matches!(self, Self::WaitingForForks | Self::Eating)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
pub enum ReaderState {
    Waiting,
    Reading,
    Idle,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
pub enum WriterState {
    Waiting,
    Writing,
    Idle,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
pub enum BarberState {
    Sleeping,
    Cutting,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
pub enum CustomerState {
    Arrived,
    Seated,
    Served,
    TurnedAway,
}

impl_display_as_ref!(
    PhilosopherState,
    ReaderState,
    WriterState,
    BarberState,
    CustomerState,
);

/// A state transition announced by one of the demos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An item was written into the ring. `occupied` is the number of filled
    /// slots right after the write, observed inside the critical section.
    ItemProduced {
        item: u64,
        slot: usize,
        occupied: usize,
    },
    /// An item was read out of the ring. `occupied` is the number of filled
    /// slots right after the read, observed inside the critical section.
    ItemConsumed {
        item: u64,
        slot: usize,
        occupied: usize,
    },
    PhilosopherStateChanged {
        id: usize,
        round: usize,
        state: PhilosopherState,
    },
    ReaderStateChanged {
        id: usize,
        round: usize,
        state: ReaderState,
        active_readers: usize,
    },
    WriterStateChanged {
        id: usize,
        round: usize,
        state: WriterState,
    },
    BarberStateChanged {
        state: BarberState,
        haircuts: usize,
    },
    /// `free_chairs` is known only when the customer looked at the waiting
    /// room, i.e. for `Seated` and `TurnedAway`.
    CustomerStateChanged {
        id: usize,
        state: CustomerState,
        free_chairs: Option<usize>,
    },
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn attempting_states_hold_the_gate() {
        assert!(!PhilosopherState::Thinking.is_attempting());
        assert!(!PhilosopherState::WaitingForGate.is_attempting());
        assert!(PhilosopherState::WaitingForForks.is_attempting());
        assert!(PhilosopherState::Eating.is_attempting());
        assert!(!PhilosopherState::Done.is_attempting());
    }

    #[test_log::test]
    fn events_serialize_with_snake_case_tag() {
        let event = Event::PhilosopherStateChanged {
            id: 2,
            round: 1,
            state: PhilosopherState::WaitingForForks,
        };

        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"philosopher_state_changed","id":2,"round":1,"state":"waiting_for_forks"}"#
        );
    }

    #[test_log::test]
    fn display_uses_variant_name() {
        assert_eq!(PhilosopherState::WaitingForGate.to_string(), "WaitingForGate");
        assert_eq!(
            Event::ItemConsumed {
                item: 1,
                slot: 0,
                occupied: 0
            }
            .to_string(),
            "ItemConsumed"
        );
    }
}
