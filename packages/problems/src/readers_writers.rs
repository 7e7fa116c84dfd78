//! Readers-writers, readers first.
//!
//! The first reader in locks writers out of the room and the last reader out
//! lets them back in. Writers take the room on their own. Readers keep
//! arriving ahead of a waiting writer, so writers can starve under a steady
//! stream of readers.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use classic_sync_config::ReadersWritersConfig;
use classic_sync_models::{Event, EventSink, ReaderState, WriterState};
use classic_sync_semaphore::{CancellationToken, Mutex, Permit, Semaphore};

use crate::{Completion, Error, delay::Pacer, join_actors, task};

/// Shared state of the readers-writers demo.
#[derive(Debug)]
pub struct ReadingRoom {
    room: Semaphore,
    readers: Mutex<usize>,
    reading: AtomicUsize,
    max_reading: AtomicUsize,
    writing: AtomicUsize,
}

impl Default for ReadingRoom {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadingRoom {
    #[must_use]
    pub fn new() -> Self {
        Self {
            room: Semaphore::new(1).with_name("room"),
            readers: Mutex::new(0).with_name("read_count"),
            reading: AtomicUsize::new(0),
            max_reading: AtomicUsize::new(0),
            writing: AtomicUsize::new(0),
        }
    }

    /// Readers currently inside.
    #[must_use]
    pub fn reading(&self) -> usize {
        self.reading.load(Ordering::SeqCst)
    }

    /// Most readers ever seen inside at once.
    #[must_use]
    pub fn max_reading(&self) -> usize {
        self.max_reading.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_writing(&self) -> bool {
        self.writing.load(Ordering::SeqCst) > 0
    }

    /// Whether nobody holds the room.
    #[must_use]
    pub fn is_vacant(&self) -> bool {
        self.room.available() == 1
    }

    /// Joins the readers, locking writers out if this is the first one.
    ///
    /// # Errors
    ///
    /// * [`Error::Cancelled`] if `token` fires before the reader got in
    pub async fn enter_read(self: &Arc<Self>, token: &CancellationToken) -> Result<ReadShare, Error> {
        let mut readers = self.readers.lock(token).await?;

        if *readers == 0 {
            self.room.acquire(token).await?.forget();
            log::trace!("enter_read: first reader locked writers out");
        }
        *readers += 1;

        let reading = self.reading.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_reading.fetch_max(reading, Ordering::SeqCst);
        classic_sync_assert::assert!(
            !self.is_writing(),
            "readers_writers: reader entered while a writer is inside"
        );

        let active_readers = *readers;
        drop(readers);

        Ok(ReadShare {
            room: Some(self.clone()),
            active_readers,
        })
    }

    async fn leave_read(&self) {
        let mut readers = self.readers.lock_uninterruptible().await;

        classic_sync_assert::assert!(*readers > 0, "readers_writers: reader left an empty room");
        *readers = readers.saturating_sub(1);
        self.reading.fetch_sub(1, Ordering::SeqCst);

        if *readers == 0 {
            self.room.release(1);
            log::trace!("leave_read: last reader let writers back in");
        }
    }

    /// Takes the room for a writer.
    ///
    /// # Errors
    ///
    /// * [`Error::Cancelled`] if `token` fires before the room is free
    pub async fn enter_write(&self, token: &CancellationToken) -> Result<WriteGuard<'_>, Error> {
        let permit = self.room.acquire(token).await?;

        let writing = self.writing.fetch_add(1, Ordering::SeqCst) + 1;
        classic_sync_assert::assert!(
            writing == 1 && self.reading() == 0,
            "readers_writers: writer entered with {writing} writer(s) and {} reader(s) inside",
            self.reading()
        );

        Ok(WriteGuard {
            room: self,
            _permit: permit,
        })
    }

    async fn read(
        self: Arc<Self>,
        id: usize,
        config: ReadersWritersConfig,
        sink: Arc<dyn EventSink>,
        token: CancellationToken,
    ) -> Result<usize, Error> {
        let mut pacer = Pacer::new(config.seed, id as u64);
        let emit = |round, state, active_readers| {
            sink.emit(Event::ReaderStateChanged {
                id,
                round,
                state,
                active_readers,
            });
        };

        for round in 1..=config.rounds {
            emit(round, ReaderState::Waiting, self.reading());
            let share = self.enter_read(&token).await?;

            emit(round, ReaderState::Reading, share.active_readers());
            let result = pacer.pause(config.read_delay, &token).await;

            emit(round, ReaderState::Idle, self.reading().saturating_sub(1));
            share.leave().await;
            result?;

            pacer.pause(config.reader_rest, &token).await?;
        }

        emit(config.rounds, ReaderState::Done, self.reading());

        Ok(config.rounds)
    }

    async fn write(
        self: Arc<Self>,
        id: usize,
        config: ReadersWritersConfig,
        sink: Arc<dyn EventSink>,
        token: CancellationToken,
    ) -> Result<usize, Error> {
        let mut pacer = Pacer::new(config.seed, (config.readers + id) as u64);
        let emit = |round, state| {
            sink.emit(Event::WriterStateChanged { id, round, state });
        };

        for round in 1..=config.rounds {
            emit(round, WriterState::Waiting);
            let guard = self.enter_write(&token).await?;

            emit(round, WriterState::Writing);
            pacer.pause(config.write_delay, &token).await?;

            emit(round, WriterState::Idle);
            drop(guard);

            pacer.pause(config.writer_rest, &token).await?;
        }

        emit(config.rounds, WriterState::Done);

        Ok(config.rounds)
    }
}

/// A reader's place in the room.
///
/// Call [`ReadShare::leave`] to go. Leaving needs the reader count lock, so a
/// share that is dropped instead leaves from a spawned task.
#[must_use = "a reader keeps writers out until it leaves"]
#[derive(Debug)]
pub struct ReadShare {
    room: Option<Arc<ReadingRoom>>,
    active_readers: usize,
}

impl ReadShare {
    /// Readers inside right after this one entered.
    #[must_use]
    pub const fn active_readers(&self) -> usize {
        self.active_readers
    }

    pub async fn leave(mut self) {
        if let Some(room) = self.room.take() {
            room.leave_read().await;
        }
    }
}

impl Drop for ReadShare {
    fn drop(&mut self) {
        let Some(room) = self.room.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { room.leave_read().await });
            }
            Err(e) => {
                log::error!("ReadShare: dropped outside of a runtime, reader never left: {e:?}");
            }
        }
    }
}

/// A writer's exclusive hold on the room. Dropping it lets others in.
#[must_use = "dropping a write guard releases the room"]
#[derive(Debug)]
pub struct WriteGuard<'a> {
    room: &'a ReadingRoom,
    _permit: Permit<'a>,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.room.writing.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Result of a finished readers-writers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadersWritersSummary {
    pub reads: usize,
    pub writes: usize,
    pub max_concurrent_readers: usize,
}

/// Runs `config.readers` readers and `config.writers` writers over one room,
/// each for `config.rounds` rounds.
///
/// # Errors
///
/// * [`Error::InvalidConfiguration`] if the configuration does not validate
/// * If an actor fails or panics
pub async fn run_readers_writers_demo(
    config: &ReadersWritersConfig,
    sink: Arc<dyn EventSink>,
    token: &CancellationToken,
) -> Result<Completion<ReadersWritersSummary>, Error> {
    config.validate()?;

    log::info!(
        "run_readers_writers_demo: readers={} writers={} rounds={}",
        config.readers,
        config.writers,
        config.rounds
    );

    let room = Arc::new(ReadingRoom::new());
    let token = token.child_token();

    let readers = (0..config.readers)
        .map(|id| {
            task::spawn(
                &format!("reader-{id}"),
                room.clone()
                    .read(id, config.clone(), sink.clone(), token.clone()),
            )
        })
        .collect();
    let writers = (0..config.writers)
        .map(|id| {
            task::spawn(
                &format!("writer-{id}"),
                room.clone()
                    .write(id, config.clone(), sink.clone(), token.clone()),
            )
        })
        .collect();

    let (readers, writers) = futures::future::join(
        join_actors(readers, &token),
        join_actors(writers, &token),
    )
    .await;
    let (readers, writers) = (readers?, writers?);

    classic_sync_assert::assert!(
        room.reading() == 0 && !room.is_writing(),
        "run_readers_writers_demo: room still occupied after the run"
    );

    let (Completion::Finished(reads), Completion::Finished(writes)) = (readers, writers) else {
        return Ok(Completion::Cancelled);
    };

    let summary = ReadersWritersSummary {
        reads: reads.iter().sum(),
        writes: writes.iter().sum(),
        max_concurrent_readers: room.max_reading(),
    };
    classic_sync_logging::debug_or_trace!(
        ("run_readers_writers_demo: finished"),
        ("run_readers_writers_demo: finished {summary:?}")
    );

    Ok(Completion::Finished(summary))
}
