use std::{collections::BTreeMap, sync::Arc, time::Duration};

use classic_sync_config::{DelayRange, DiningConfig};
use classic_sync_models::{PhilosopherState, Recorded, RecordingSink};
use classic_sync_problems::{
    CancellationToken, Completion, DiningTable, Error, run_dining_philosophers_demo,
    dining::Timings,
};
use pretty_assertions::assert_eq;

fn config(seats: usize, rounds: usize) -> DiningConfig {
    DiningConfig {
        seats,
        rounds,
        think_delay: DelayRange::millis(0, 3),
        eat_delay: DelayRange::millis(1, 4),
        rest_delay: DelayRange::millis(0, 2),
        seed: Some(29),
    }
}

const fn adjacent(a: usize, b: usize, seats: usize) -> bool {
    (a + 1) % seats == b || (b + 1) % seats == a
}

/// Replays the transitions in order and checks both table invariants at every
/// step: fewer than `seats` seats attempting, and no two neighbours eating.
fn check_invariants(seats: usize, transitions: &[(usize, usize, PhilosopherState)]) {
    let mut states = BTreeMap::new();

    for (id, round, state) in transitions {
        states.insert(*id, *state);

        let attempting = states.values().filter(|x| x.is_attempting()).count();
        assert!(
            attempting < seats,
            "{attempting} seats attempting after seat {id} went {state} in round {round}"
        );

        let eating = states
            .iter()
            .filter(|(_, x)| **x == PhilosopherState::Eating)
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        for a in &eating {
            for b in &eating {
                assert!(
                    a == b || !adjacent(*a, *b, seats),
                    "neighbours {a} and {b} eating at once"
                );
            }
        }
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_table_invariants_hold_throughout_a_run() {
    for seats in [2, 3, 5, 8] {
        let sink = Arc::new(RecordingSink::new());

        let summary = run_dining_philosophers_demo(&config(seats, 6), sink.clone(), &CancellationToken::new())
            .await
            .unwrap()
            .finished()
            .unwrap();

        assert!(summary.max_attempting < seats);
        check_invariants(seats, &sink.philosopher_transitions());
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_every_seat_finishes_across_repeated_trials() {
    for seats in [2, 5, 8] {
        for trial in 0..10_u64 {
            let config = DiningConfig {
                seed: Some(trial),
                ..config(seats, 3)
            }
            .without_delays();
            let sink = Arc::new(RecordingSink::new());

            let completion = tokio::time::timeout(
                Duration::from_secs(10),
                run_dining_philosophers_demo(&config, sink.clone(), &CancellationToken::new()),
            )
            .await
            .unwrap_or_else(|_| panic!("{seats} seats deadlocked in trial {trial}"))
            .unwrap();

            let summary = completion.finished().unwrap();
            assert_eq!(summary.meals, vec![3; seats]);

            let done = sink
                .philosopher_transitions()
                .into_iter()
                .filter(|(_, _, state)| *state == PhilosopherState::Done)
                .count();
            assert_eq!(done, seats);
        }
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_five_seats_one_round_eat_exactly_five_times() {
    let sink = Arc::new(RecordingSink::new());

    run_dining_philosophers_demo(&config(5, 1), sink.clone(), &CancellationToken::new())
        .await
        .unwrap()
        .finished()
        .unwrap();

    let events = sink.events();
    let spans = eating_spans(&events);

    assert_eq!(spans.len(), 5);
    let mut ids = spans.iter().map(|(id, _, _)| *id).collect::<Vec<_>>();
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);

    for (a, start_a, end_a) in &spans {
        for (b, start_b, end_b) in &spans {
            if a != b && adjacent(*a, *b, 5) {
                assert!(
                    end_a <= start_b || end_b <= start_a,
                    "neighbours {a} and {b} ate at overlapping times"
                );
            }
        }
    }
}

/// `(seat, start, end)` for every meal, as positions in the event log.
fn eating_spans(events: &[Recorded]) -> Vec<(usize, usize, usize)> {
    let mut open = BTreeMap::new();
    let mut spans = vec![];

    for recorded in events {
        let classic_sync_models::Event::PhilosopherStateChanged { id, state, .. } = recorded.event
        else {
            continue;
        };

        if state == PhilosopherState::Eating {
            open.insert(id, recorded.sequence);
        } else if let Some(start) = open.remove(&id) {
            spans.push((id, start, recorded.sequence));
        }
    }

    assert!(open.is_empty(), "meals never finished: {open:?}");
    spans
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_shutdown_mid_run_returns_cancelled() {
    let token = CancellationToken::new();
    let config = DiningConfig {
        think_delay: DelayRange::millis(5, 20),
        eat_delay: DelayRange::millis(5, 20),
        ..config(5, 1_000)
    };

    let run = {
        let token = token.clone();
        tokio::spawn(async move {
            run_dining_philosophers_demo(&config, Arc::new(RecordingSink::new()), &token).await
        })
    };

    tokio::time::sleep(Duration::from_millis(60)).await;
    token.cancel();

    let completion = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("seats did not stop after shutdown")
        .unwrap()
        .unwrap();

    assert_eq!(completion, Completion::Cancelled);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_cancelled_seats_put_forks_and_permits_back() {
    let token = CancellationToken::new();
    let table = Arc::new(DiningTable::new(5).unwrap());
    let timings = Timings {
        think: DelayRange::ZERO,
        eat: DelayRange::millis(20, 40),
        rest: DelayRange::ZERO,
        seed: Some(8),
    };

    let seats = (0..5)
        .map(|seat| {
            let table = table.clone();
            let token = token.clone();
            tokio::spawn(async move {
                table
                    .dine(seat, 1_000, timings, &RecordingSink::new(), &token)
                    .await
            })
        })
        .collect::<Vec<_>>();

    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    for seat in seats {
        let result = tokio::time::timeout(Duration::from_secs(5), seat)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    assert_eq!(table.gate_available(), 4);
    for fork in 0..5 {
        assert!(!table.fork_is_held(fork), "fork {fork} still held");
    }
    assert!(table.max_attempting() <= 4);
}

#[test_log::test(tokio::test)]
async fn test_invalid_tables_are_rejected() {
    let result =
        run_dining_philosophers_demo(&config(1, 3), Arc::new(RecordingSink::new()), &CancellationToken::new())
            .await;

    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
}
