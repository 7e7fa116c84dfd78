//! Synchronization primitives used by the classic sync demos.
//!
//! * [`Semaphore`]: a counting semaphore with an explicit capacity. Acquiring
//!   returns a scoped [`Permit`] which hands its permits back when dropped.
//! * [`Mutex`]: a mutual-exclusion lock around a value that tracks how many
//!   tasks currently hold it.
//!
//! Every acquire that may suspend takes a [`CancellationToken`]. The token is
//! checked before the primitive is polled, and a cancelled acquire never leaves
//! a permit or the lock behind.
//!
//! # Example
//!
//! ```rust
//! use classic_sync_semaphore::{CancellationToken, Semaphore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), classic_sync_semaphore::SemaphoreError> {
//! let token = CancellationToken::new();
//! let empty = Semaphore::new(2).with_name("empty");
//! let full = Semaphore::with_capacity(0, 2)?.with_name("full");
//!
//! let permit = empty.acquire(&token).await?;
//! permit.transfer(&full);
//!
//! assert_eq!(empty.available(), 1);
//! assert_eq!(full.available(), 1);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

mod mutex;
mod semaphore;

pub use mutex::{Mutex, MutexGuard};
pub use semaphore::{Permit, Semaphore};
pub use tokio_util::sync::CancellationToken;

use thiserror::Error;

/// Errors returned by the synchronization primitives.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SemaphoreError {
    /// The cancellation token fired while the caller was waiting.
    #[error("Cancelled")]
    Cancelled,
    /// A non-blocking acquire found too few permits.
    #[error("Not enough permits available")]
    NoPermits,
    /// The underlying semaphore was closed.
    #[error("Semaphore closed")]
    Closed,
    /// The requested initial permit count is larger than the capacity.
    #[error("Initial permits {initial} exceed capacity {capacity}")]
    InitialExceedsCapacity { initial: usize, capacity: usize },
    /// The requested capacity is larger than the runtime supports.
    #[error("Capacity {0} exceeds the maximum supported permits")]
    CapacityTooLarge(usize),
}

impl From<tokio::sync::AcquireError> for SemaphoreError {
    fn from(_value: tokio::sync::AcquireError) -> Self {
        Self::Closed
    }
}

impl From<tokio::sync::TryAcquireError> for SemaphoreError {
    fn from(value: tokio::sync::TryAcquireError) -> Self {
        match value {
            tokio::sync::TryAcquireError::Closed => Self::Closed,
            tokio::sync::TryAcquireError::NoPermits => Self::NoPermits,
        }
    }
}

impl From<tokio::sync::TryLockError> for SemaphoreError {
    fn from(_value: tokio::sync::TryLockError) -> Self {
        Self::NoPermits
    }
}
