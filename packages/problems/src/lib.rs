#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! The classic synchronization problems as cooperating async tasks.
//!
//! Each demo spawns its actors on the current runtime, reports every state
//! transition to an [`EventSink`](classic_sync_models::EventSink), and returns
//! once all actors finished or the caller's cancellation token fired.

use classic_sync_config::ConfigError;
use classic_sync_semaphore::SemaphoreError;
use thiserror::Error;

mod delay;
pub mod dining;
pub mod producer_consumer;
pub mod readers_writers;
pub mod sleeping_barber;
mod task;

pub use classic_sync_semaphore::CancellationToken;
pub use dining::{DiningSummary, DiningTable, run_dining_philosophers, run_dining_philosophers_demo};
pub use producer_consumer::{
    BoundedBufferChannel, ProducerConsumerSummary, run_producer_consumer,
    run_producer_consumer_demo,
};
pub use readers_writers::{ReadersWritersSummary, ReadingRoom, run_readers_writers_demo};
pub use sleeping_barber::{BarberShop, SleepingBarberSummary, run_sleeping_barber_demo};

#[derive(Debug, Error)]
pub enum Error {
    /// The cancellation token fired while the caller was suspended.
    #[error("Cancelled")]
    Cancelled,
    #[error(transparent)]
    InvalidConfiguration(#[from] ConfigError),
    #[error(transparent)]
    Semaphore(SemaphoreError),
    /// Shared state was found in a shape the protocol rules out.
    #[error("Invariant violated: {0}")]
    InvariantViolated(String),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

impl From<SemaphoreError> for Error {
    fn from(value: SemaphoreError) -> Self {
        match value {
            SemaphoreError::Cancelled => Self::Cancelled,
            other => Self::Semaphore(other),
        }
    }
}

/// How a demo run ended.
///
/// Cancellation is an ordinary outcome for a demo, so it is reported here
/// rather than as an [`Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion<T> {
    Finished(T),
    Cancelled,
}

impl<T> Completion<T> {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    #[must_use]
    pub fn finished(self) -> Option<T> {
        match self {
            Self::Finished(value) => Some(value),
            Self::Cancelled => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Completion<U> {
        match self {
            Self::Finished(value) => Completion::Finished(f(value)),
            Self::Cancelled => Completion::Cancelled,
        }
    }
}

/// Waits for every actor to stop.
///
/// The first real error cancels `token` so the remaining actors unwind
/// instead of waiting on a peer that is gone, and is returned once they all
/// stopped. Actors that stopped because of the token make the whole run
/// [`Completion::Cancelled`].
pub(crate) async fn join_actors<T>(
    handles: Vec<tokio::task::JoinHandle<Result<T, Error>>>,
    token: &CancellationToken,
) -> Result<Completion<Vec<T>>, Error> {
    let mut outputs = Vec::with_capacity(handles.len());
    let mut cancelled = false;
    let mut failure = None;

    for result in futures::future::join_all(handles.into_iter().map(|handle| {
        let token = token.clone();
        async move {
            let result = handle.await.map_err(Error::from).and_then(|x| x);
            if matches!(result, Err(ref e) if !matches!(e, Error::Cancelled)) {
                token.cancel();
            }
            result
        }
    }))
    .await
    {
        match result {
            Ok(output) => outputs.push(output),
            Err(Error::Cancelled) => cancelled = true,
            Err(e) => {
                log::error!("join_actors: actor failed: {e:?}");
                failure.get_or_insert(e);
            }
        }
    }

    if let Some(e) = failure {
        return Err(e);
    }

    Ok(if cancelled {
        Completion::Cancelled
    } else {
        Completion::Finished(outputs)
    })
}
