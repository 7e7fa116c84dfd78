use std::sync::Arc;

use clap::ValueEnum;
use classic_sync_models::{
    BarberState, CustomerState, Event, EventSink, PhilosopherState, ReaderState, WriterState,
};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[clap(rename_all = "kebab_case")]
pub enum Format {
    Text,
    Json,
}

/// Prints one line per event in the classic console format.
///
/// Transitions without a console line are logged at debug level instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl EventSink for ConsoleReporter {
    fn emit(&self, event: Event) {
        match format_event(&event) {
            Some(line) => println!("{line}"),
            None => log::debug!("{event:?}"),
        }
    }
}

/// Prints every event as a single JSON object per line.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReporter;

impl EventSink for JsonReporter {
    fn emit(&self, event: Event) {
        match serde_json::to_string(&event) {
            Ok(json) => println!("{json}"),
            Err(e) => log::error!("JsonReporter: failed to serialize {event:?}: {e:?}"),
        }
    }
}

#[must_use]
pub fn reporter(format: Format) -> Arc<dyn EventSink> {
    match format {
        Format::Text => Arc::new(ConsoleReporter),
        Format::Json => Arc::new(JsonReporter),
    }
}

#[must_use]
pub fn format_event(event: &Event) -> Option<String> {
    Some(match *event {
        Event::ItemProduced { item, slot, .. } => {
            format!("[Producer] Produced item {item} at pos {slot}")
        }
        Event::ItemConsumed { item, slot, .. } => {
            format!("  [Consumer] Consumed item {item} from pos {slot}")
        }
        Event::PhilosopherStateChanged { id, round, state } => match state {
            PhilosopherState::Thinking => format!("[Philosopher {id}] Thinking (round {round})"),
            PhilosopherState::Eating => format!("  [Philosopher {id}] Eating (round {round})"),
            PhilosopherState::Done => format!("[Philosopher {id}] Done"),
            PhilosopherState::WaitingForGate | PhilosopherState::WaitingForForks => return None,
        },
        Event::ReaderStateChanged {
            id,
            round,
            state: ReaderState::Reading,
            active_readers,
        } => format!(
            "[Reader {id}] is reading (round {round}). Readers active: {active_readers}"
        ),
        Event::WriterStateChanged {
            id,
            round,
            state: WriterState::Writing,
        } => format!("  [Writer {id}] is writing (round {round})."),
        Event::ReaderStateChanged { .. } | Event::WriterStateChanged { .. } => return None,
        Event::BarberStateChanged { state, haircuts } => match state {
            BarberState::Sleeping => return None,
            BarberState::Cutting => format!("[Barber] Cutting hair. Cuts done: {}", haircuts + 1),
            BarberState::Closed => format!("[Barber] Closing. Cuts done: {haircuts}"),
        },
        Event::CustomerStateChanged {
            id,
            state,
            free_chairs,
        } => match state {
            CustomerState::Arrived => format!("[Customer {id}] Arrived"),
            CustomerState::Seated => format!(
                "  [Customer {id}] Sitting. Free chairs left: {}",
                free_chairs.unwrap_or_default()
            ),
            CustomerState::Served => format!("    [Customer {id}] Got haircut and leaving."),
            CustomerState::TurnedAway => {
                format!("  [Customer {id}] No chairs available, leaving.")
            }
        },
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn buffer_events_use_the_classic_lines() {
        assert_eq!(
            format_event(&Event::ItemProduced {
                item: 3,
                slot: 2,
                occupied: 1
            })
            .as_deref(),
            Some("[Producer] Produced item 3 at pos 2")
        );
        assert_eq!(
            format_event(&Event::ItemConsumed {
                item: 3,
                slot: 2,
                occupied: 0
            })
            .as_deref(),
            Some("  [Consumer] Consumed item 3 from pos 2")
        );
    }

    #[test_log::test]
    fn philosophers_print_thinking_and_eating_only() {
        let event = |state| Event::PhilosopherStateChanged {
            id: 1,
            round: 2,
            state,
        };

        assert_eq!(
            format_event(&event(PhilosopherState::Eating)).as_deref(),
            Some("  [Philosopher 1] Eating (round 2)")
        );
        assert_eq!(
            format_event(&event(PhilosopherState::Thinking)).as_deref(),
            Some("[Philosopher 1] Thinking (round 2)")
        );
        assert_eq!(format_event(&event(PhilosopherState::WaitingForGate)), None);
        assert_eq!(format_event(&event(PhilosopherState::WaitingForForks)), None);
    }

    #[test_log::test]
    fn barber_counts_the_cut_in_progress() {
        assert_eq!(
            format_event(&Event::BarberStateChanged {
                state: BarberState::Cutting,
                haircuts: 0
            })
            .as_deref(),
            Some("[Barber] Cutting hair. Cuts done: 1")
        );
    }

    #[test_log::test]
    fn seated_customers_report_free_chairs() {
        assert_eq!(
            format_event(&Event::CustomerStateChanged {
                id: 4,
                state: CustomerState::Seated,
                free_chairs: Some(2)
            })
            .as_deref(),
            Some("  [Customer 4] Sitting. Free chairs left: 2")
        );
    }
}
