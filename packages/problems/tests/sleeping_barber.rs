use std::{sync::Arc, time::Duration};

use classic_sync_config::{DelayRange, SleepingBarberConfig};
use classic_sync_models::{BarberState, CustomerState, Event, RecordingSink};
use classic_sync_problems::{CancellationToken, Completion, run_sleeping_barber_demo};
use pretty_assertions::assert_eq;

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_slow_barber_turns_customers_away() {
    let sink = Arc::new(RecordingSink::new());
    let config = SleepingBarberConfig {
        customers: 8,
        chairs: 1,
        arrival_delay: DelayRange::ZERO,
        haircut_delay: DelayRange::millis(20, 30),
        seed: Some(6),
    };

    let summary = run_sleeping_barber_demo(&config, sink.clone(), &CancellationToken::new())
        .await
        .unwrap()
        .finished()
        .unwrap();

    assert_eq!(summary.customers, 8);
    assert_eq!(summary.served + summary.turned_away, 8);
    assert!(summary.turned_away > 0);
    assert_eq!(summary.haircuts, summary.served);

    let served = sink
        .events()
        .into_iter()
        .filter(|x| {
            matches!(
                x.event,
                Event::CustomerStateChanged {
                    state: CustomerState::Served,
                    ..
                }
            )
        })
        .count();
    assert_eq!(served, summary.served);

    let last = sink.events().into_iter().rev().find_map(|x| match x.event {
        Event::BarberStateChanged { state, haircuts } => Some((state, haircuts)),
        _ => None,
    });
    assert_eq!(last, Some((BarberState::Closed, summary.haircuts)));
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_waiting_room_never_goes_negative() {
    let sink = Arc::new(RecordingSink::new());
    let config = SleepingBarberConfig {
        customers: 20,
        chairs: 3,
        arrival_delay: DelayRange::millis(0, 3),
        haircut_delay: DelayRange::millis(1, 5),
        seed: Some(13),
    };

    run_sleeping_barber_demo(&config, sink.clone(), &CancellationToken::new())
        .await
        .unwrap()
        .finished()
        .unwrap();

    for recorded in sink.events() {
        if let Event::CustomerStateChanged {
            state: CustomerState::Seated,
            free_chairs: Some(free_chairs),
            ..
        } = recorded.event
        {
            assert!(free_chairs < 3);
        }
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_shutdown_mid_run_returns_cancelled() {
    let token = CancellationToken::new();
    let config = SleepingBarberConfig {
        customers: 1_000,
        chairs: 3,
        arrival_delay: DelayRange::millis(5, 10),
        haircut_delay: DelayRange::millis(5, 10),
        seed: Some(1),
    };

    let run = {
        let token = token.clone();
        tokio::spawn(async move {
            run_sleeping_barber_demo(&config, Arc::new(RecordingSink::new()), &token).await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    let completion = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("shop did not close after shutdown")
        .unwrap()
        .unwrap();

    assert_eq!(completion, Completion::Cancelled);
}
