use std::{
    borrow::Cow,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicUsize, Ordering},
};

use tokio_util::sync::CancellationToken;

use crate::SemaphoreError;

/// A mutual-exclusion lock (a binary permit) around a value.
///
/// The lock counts its live guards so that tests can observe that no two
/// tasks ever hold it at once.
#[derive(Debug)]
pub struct Mutex<T> {
    name: Cow<'static, str>,
    inner: tokio::sync::Mutex<T>,
    holders: AtomicUsize,
    max_holders: AtomicUsize,
}

impl<T> Mutex<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            name: Cow::Borrowed("mutex"),
            inner: tokio::sync::Mutex::new(value),
            holders: AtomicUsize::new(0),
            max_holders: AtomicUsize::new(0),
        }
    }

    /// Names the lock in log output.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquires the lock, suspending until it is free.
    ///
    /// # Errors
    ///
    /// * [`SemaphoreError::Cancelled`] if `token` is cancelled before the lock
    ///   is granted
    pub async fn lock(&self, token: &CancellationToken) -> Result<MutexGuard<'_, T>, SemaphoreError> {
        log::trace!("{}: lock", self.name);

        tokio::select! {
            biased;
            () = token.cancelled() => {
                log::trace!("{}: lock cancelled", self.name);
                Err(SemaphoreError::Cancelled)
            }
            guard = self.inner.lock() => Ok(MutexGuard::new(self, guard)),
        }
    }

    /// Acquires the lock without observing cancellation.
    ///
    /// Only meant for exit paths that have to finish to restore an invariant.
    pub async fn lock_uninterruptible(&self) -> MutexGuard<'_, T> {
        log::trace!("{}: lock (uninterruptible)", self.name);
        MutexGuard::new(self, self.inner.lock().await)
    }

    /// Acquires the lock if it is free.
    ///
    /// # Errors
    ///
    /// * [`SemaphoreError::NoPermits`] if another task holds the lock
    pub fn try_lock(&self) -> Result<MutexGuard<'_, T>, SemaphoreError> {
        Ok(MutexGuard::new(self, self.inner.try_lock()?))
    }

    /// Whether some task currently holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.holders.load(Ordering::SeqCst) > 0
    }

    /// Number of live guards. Anything above one is a broken lock.
    #[must_use]
    pub fn holders(&self) -> usize {
        self.holders.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous guards ever observed.
    #[must_use]
    pub fn max_holders(&self) -> usize {
        self.max_holders.load(Ordering::SeqCst)
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

/// Exclusive access to the value inside a [`Mutex`]. Unlocks on drop.
#[must_use = "dropping a guard unlocks the mutex immediately"]
pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
    guard: tokio::sync::MutexGuard<'a, T>,
}

impl<'a, T> MutexGuard<'a, T> {
    fn new(mutex: &'a Mutex<T>, guard: tokio::sync::MutexGuard<'a, T>) -> Self {
        let previous = mutex.holders.fetch_add(1, Ordering::SeqCst);
        mutex.max_holders.fetch_max(previous + 1, Ordering::SeqCst);

        classic_sync_assert::assert!(
            previous == 0,
            "{}: acquired while {previous} other holder(s) exist",
            mutex.name
        );
        log::trace!("{}: locked", mutex.name);

        Self { mutex, guard }
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        // Runs before the inner guard unlocks, so the next holder never
        // observes this one.
        self.mutex.holders.fetch_sub(1, Ordering::SeqCst);
        log::trace!("{}: unlocked", self.mutex.name);
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutexGuard")
            .field("mutex", &self.mutex.name)
            .field("value", &*self.guard)
            .finish()
    }
}
