use classic_sync_config::DelayRange;
use classic_sync_semaphore::CancellationToken;
use rand::{SeedableRng as _, rngs::StdRng};

use crate::Error;

/// Per-actor source of randomized pauses.
///
/// With a seed every actor gets its own generator seeded from
/// `seed + actor`, so a run replays the same delays regardless of how the
/// actors interleave.
#[derive(Debug)]
pub(crate) struct Pacer {
    rng: StdRng,
}

impl Pacer {
    pub fn new(seed: Option<u64>, actor: u64) -> Self {
        let rng = seed.map_or_else(StdRng::from_os_rng, |seed| {
            StdRng::seed_from_u64(seed.wrapping_add(actor))
        });
        Self { rng }
    }

    /// Sleeps for a delay sampled from `range`.
    ///
    /// A zero range still yields to the scheduler, so a delay-free run keeps
    /// interleaving its actors.
    ///
    /// # Errors
    ///
    /// * [`Error::Cancelled`] if `token` fires before or during the pause
    pub async fn pause(&mut self, range: DelayRange, token: &CancellationToken) -> Result<(), Error> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let delay = range.sample(&mut self.rng);

        if delay.is_zero() {
            tokio::task::yield_now().await;
            return if token.is_cancelled() {
                Err(Error::Cancelled)
            } else {
                Ok(())
            };
        }

        tokio::select! {
            biased;
            () = token.cancelled() => Err(Error::Cancelled),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
