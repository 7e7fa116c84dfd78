use std::borrow::Cow;

use tokio_util::sync::CancellationToken;

use crate::SemaphoreError;

/// A counting semaphore with a fixed capacity.
///
/// `acquire` suspends until permits are available and `release` always
/// succeeds up to the capacity. Waiters are served in arrival order.
#[derive(Debug)]
pub struct Semaphore {
    name: Cow<'static, str>,
    inner: tokio::sync::Semaphore,
    capacity: usize,
}

impl Semaphore {
    /// Creates a semaphore holding `permits` permits, with a capacity equal to
    /// the initial count.
    ///
    /// # Panics
    ///
    /// * If `permits` exceeds [`tokio::sync::Semaphore::MAX_PERMITS`]
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self {
            name: Cow::Borrowed("semaphore"),
            inner: tokio::sync::Semaphore::new(permits),
            capacity: permits,
        }
    }

    /// Creates a semaphore that starts with `initial` permits out of
    /// `capacity`.
    ///
    /// # Errors
    ///
    /// * If `initial` is greater than `capacity`
    /// * If `capacity` exceeds [`tokio::sync::Semaphore::MAX_PERMITS`]
    pub fn with_capacity(initial: usize, capacity: usize) -> Result<Self, SemaphoreError> {
        if capacity > tokio::sync::Semaphore::MAX_PERMITS {
            return Err(SemaphoreError::CapacityTooLarge(capacity));
        }
        if initial > capacity {
            return Err(SemaphoreError::InitialExceedsCapacity { initial, capacity });
        }

        Ok(Self {
            name: Cow::Borrowed("semaphore"),
            inner: tokio::sync::Semaphore::new(initial),
            capacity,
        })
    }

    /// Names the semaphore in log output.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently available to be acquired.
    #[must_use]
    pub fn available(&self) -> usize {
        self.inner.available_permits()
    }

    /// Acquires a single permit, suspending until one is available.
    ///
    /// # Errors
    ///
    /// * [`SemaphoreError::Cancelled`] if `token` is cancelled before the
    ///   permit is granted
    pub async fn acquire(&self, token: &CancellationToken) -> Result<Permit<'_>, SemaphoreError> {
        self.acquire_many(1, token).await
    }

    /// Acquires `n` permits at once, suspending until all of them are
    /// available.
    ///
    /// Permits granted to a waiter that is cancelled part way are handed back
    /// to the semaphore.
    ///
    /// # Errors
    ///
    /// * [`SemaphoreError::Cancelled`] if `token` is cancelled before the
    ///   permits are granted
    /// * [`SemaphoreError::Closed`] if the underlying semaphore was closed
    pub async fn acquire_many(
        &self,
        n: u32,
        token: &CancellationToken,
    ) -> Result<Permit<'_>, SemaphoreError> {
        log::trace!(
            "{}: acquire n={n} available={}",
            self.name,
            self.available()
        );

        tokio::select! {
            biased;
            () = token.cancelled() => {
                log::trace!("{}: acquire cancelled", self.name);
                Err(SemaphoreError::Cancelled)
            }
            permit = self.inner.acquire_many(n) => {
                permit?.forget();
                log::trace!("{}: acquired n={n}", self.name);
                Ok(Permit::new(self, n as usize))
            }
        }
    }

    /// Acquires a single permit without observing cancellation.
    ///
    /// Only meant for exit paths that have to finish to restore an invariant.
    ///
    /// # Errors
    ///
    /// * [`SemaphoreError::Closed`] if the underlying semaphore was closed
    pub async fn acquire_uninterruptible(&self) -> Result<Permit<'_>, SemaphoreError> {
        self.inner.acquire().await?.forget();
        log::trace!("{}: acquired n=1 (uninterruptible)", self.name);
        Ok(Permit::new(self, 1))
    }

    /// Acquires a single permit if one is immediately available.
    ///
    /// # Errors
    ///
    /// * [`SemaphoreError::NoPermits`] if no permit is available
    pub fn try_acquire(&self) -> Result<Permit<'_>, SemaphoreError> {
        self.try_acquire_many(1)
    }

    /// Acquires `n` permits if they are all immediately available.
    ///
    /// # Errors
    ///
    /// * [`SemaphoreError::NoPermits`] if fewer than `n` permits are available
    pub fn try_acquire_many(&self, n: u32) -> Result<Permit<'_>, SemaphoreError> {
        self.inner.try_acquire_many(n)?.forget();
        Ok(Permit::new(self, n as usize))
    }

    /// Returns `n` permits to the semaphore, waking waiters.
    ///
    /// Releasing past the capacity is a programming defect. With assertions
    /// enabled it panics, otherwise the excess is logged and dropped.
    pub fn release(&self, n: usize) {
        let available = self.available();

        if available + n > self.capacity {
            classic_sync_assert::die_or_error!(
                "{}: releasing {n} permits exceeds capacity {} (available={available})",
                self.name,
                self.capacity
            );
            self.inner
                .add_permits(self.capacity.saturating_sub(available));
            return;
        }

        self.inner.add_permits(n);
        log::trace!("{}: released n={n} available={}", self.name, self.available());
    }
}

/// Permits held from a [`Semaphore`].
///
/// Dropping the permit releases it back to the semaphore it came from, which
/// makes every early return and cancellation path give its permits back.
#[must_use = "dropping a permit releases it immediately"]
#[derive(Debug)]
pub struct Permit<'a> {
    semaphore: &'a Semaphore,
    count: usize,
}

impl<'a> Permit<'a> {
    const fn new(semaphore: &'a Semaphore, count: usize) -> Self {
        Self { semaphore, count }
    }

    /// Number of permits held.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Keeps the permits out of the semaphore without releasing them.
    ///
    /// The owner becomes responsible for a later [`Semaphore::release`].
    pub fn forget(mut self) {
        log::trace!("{}: forget n={}", self.semaphore.name, self.count);
        self.count = 0;
    }

    /// Consumes the permits from their semaphore and releases the same
    /// number on `to`.
    ///
    /// This is the hand-off between complementary counters, e.g. an empty
    /// slot turning into a filled slot.
    pub fn transfer(mut self, to: &Semaphore) {
        let count = std::mem::take(&mut self.count);
        log::trace!(
            "{}: transfer n={count} to {}",
            self.semaphore.name,
            to.name
        );
        to.release(count);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.count > 0 {
            self.semaphore.release(self.count);
        }
    }
}
