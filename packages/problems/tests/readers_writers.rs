use std::{sync::Arc, time::Duration};

use classic_sync_config::{DelayRange, ReadersWritersConfig};
use classic_sync_models::{Event, ReaderState, RecordingSink, WriterState};
use classic_sync_problems::{CancellationToken, Completion, run_readers_writers_demo};
use pretty_assertions::assert_eq;

fn config(readers: usize, writers: usize, rounds: usize) -> ReadersWritersConfig {
    ReadersWritersConfig {
        readers,
        writers,
        rounds,
        read_delay: DelayRange::millis(1, 4),
        reader_rest: DelayRange::millis(0, 3),
        write_delay: DelayRange::millis(1, 4),
        writer_rest: DelayRange::millis(0, 3),
        seed: Some(4),
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_writers_never_share_the_room() {
    let sink = Arc::new(RecordingSink::new());

    let summary = run_readers_writers_demo(&config(4, 3, 6), sink.clone(), &CancellationToken::new())
        .await
        .unwrap()
        .finished()
        .unwrap();

    assert_eq!(summary.reads, 24);
    assert_eq!(summary.writes, 18);

    let mut readers = 0_usize;
    let mut writers = 0_usize;

    for recorded in sink.events() {
        match recorded.event {
            Event::ReaderStateChanged { state: ReaderState::Reading, .. } => readers += 1,
            Event::ReaderStateChanged { state: ReaderState::Idle, .. } => readers -= 1,
            Event::WriterStateChanged { state: WriterState::Writing, .. } => writers += 1,
            Event::WriterStateChanged { state: WriterState::Idle, .. } => writers -= 1,
            _ => {}
        }

        assert!(writers <= 1, "two writers at once");
        assert!(writers == 0 || readers == 0, "readers and a writer at once");
    }

    assert_eq!((readers, writers), (0, 0));
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_only_readers_may_overlap() {
    let config = ReadersWritersConfig {
        read_delay: DelayRange::millis(20, 30),
        reader_rest: DelayRange::ZERO,
        ..config(4, 0, 3)
    };

    let summary = run_readers_writers_demo(&config, Arc::new(RecordingSink::new()), &CancellationToken::new())
        .await
        .unwrap()
        .finished()
        .unwrap();

    assert_eq!(summary.writes, 0);
    assert!(summary.max_concurrent_readers > 1);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_shutdown_mid_run_returns_cancelled() {
    let token = CancellationToken::new();
    let config = ReadersWritersConfig {
        read_delay: DelayRange::millis(5, 20),
        write_delay: DelayRange::millis(5, 20),
        ..config(3, 2, 1_000)
    };

    let run = {
        let token = token.clone();
        tokio::spawn(async move {
            run_readers_writers_demo(&config, Arc::new(RecordingSink::new()), &token).await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    let completion = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("readers and writers did not stop after shutdown")
        .unwrap()
        .unwrap();

    assert_eq!(completion, Completion::Cancelled);
}
