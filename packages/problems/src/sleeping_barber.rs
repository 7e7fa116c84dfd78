//! The sleeping barber.
//!
//! Customers take a chair in the waiting room and wake the barber, or walk
//! out when every chair is taken. The barber sleeps until a customer is
//! waiting, frees that customer's chair, cuts, and signals the customer that
//! the cut is done.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use classic_sync_config::{ConfigError, DelayRange, SleepingBarberConfig};
use classic_sync_models::{BarberState, CustomerState, Event, EventSink};
use classic_sync_semaphore::{CancellationToken, Mutex, Semaphore, SemaphoreError};

use crate::{Completion, Error, delay::Pacer, join_actors, task};

/// How a customer's visit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Served,
    TurnedAway,
}

#[derive(Debug)]
pub struct BarberShop {
    free_chairs: Mutex<usize>,
    waiting_customers: Semaphore,
    barber_ready: Semaphore,
    haircuts: AtomicUsize,
}

impl BarberShop {
    /// # Errors
    ///
    /// * [`Error::InvalidConfiguration`] if there are no chairs
    pub fn new(chairs: usize) -> Result<Self, Error> {
        if chairs == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "barber shop needs at least 1 chair".to_string(),
            )
            .into());
        }

        Ok(Self {
            free_chairs: Mutex::new(chairs).with_name("chairs"),
            waiting_customers: Semaphore::with_capacity(0, chairs)?.with_name("customers"),
            // Cuts may finish before their customers start waiting on them,
            // so these signals can pile up past the number of chairs.
            barber_ready: Semaphore::with_capacity(0, tokio::sync::Semaphore::MAX_PERMITS)?
                .with_name("barber_ready"),
            haircuts: AtomicUsize::new(0),
        })
    }

    #[must_use]
    pub const fn chairs(&self) -> usize {
        self.waiting_customers.capacity()
    }

    #[must_use]
    pub fn haircuts(&self) -> usize {
        self.haircuts.load(Ordering::SeqCst)
    }

    /// Customers seated and not yet called by the barber.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.waiting_customers.available()
    }

    /// One customer's visit: sit down and wait for a haircut, or leave if
    /// the waiting room is full.
    ///
    /// The chairs lock is released before waiting on the barber.
    ///
    /// # Errors
    ///
    /// * [`Error::Cancelled`] if `token` fires during the visit
    pub async fn visit(
        &self,
        id: usize,
        sink: &dyn EventSink,
        token: &CancellationToken,
    ) -> Result<Visit, Error> {
        let emit = |state, free_chairs| {
            sink.emit(Event::CustomerStateChanged {
                id,
                state,
                free_chairs,
            });
        };

        emit(CustomerState::Arrived, None);

        let mut free_chairs = self.free_chairs.lock(token).await?;

        if *free_chairs == 0 {
            drop(free_chairs);
            emit(CustomerState::TurnedAway, Some(0));
            return Ok(Visit::TurnedAway);
        }

        *free_chairs -= 1;
        let left = *free_chairs;
        drop(free_chairs);

        emit(CustomerState::Seated, Some(left));
        self.waiting_customers.release(1);

        self.barber_ready.acquire(token).await?.forget();
        emit(CustomerState::Served, None);

        Ok(Visit::Served)
    }

    /// The barber's loop.
    ///
    /// Returns the number of haircuts once `closing` fires with nobody left
    /// waiting. `closing` is expected to be a child of `token`.
    ///
    /// # Errors
    ///
    /// * [`Error::Cancelled`] if `token` fires
    pub async fn work(
        &self,
        haircut: DelayRange,
        seed: Option<u64>,
        sink: &dyn EventSink,
        closing: &CancellationToken,
        token: &CancellationToken,
    ) -> Result<usize, Error> {
        let mut pacer = Pacer::new(seed, 0);
        let emit = |state, haircuts| {
            sink.emit(Event::BarberStateChanged { state, haircuts });
        };

        loop {
            if self.waiting() == 0 {
                emit(BarberState::Sleeping, self.haircuts());
            }

            match self.waiting_customers.acquire(closing).await {
                Ok(permit) => permit.forget(),
                Err(SemaphoreError::Cancelled) if !token.is_cancelled() => break,
                Err(e) => return Err(e.into()),
            }

            *self.free_chairs.lock(token).await? += 1;

            emit(BarberState::Cutting, self.haircuts());
            pacer.pause(haircut, token).await?;

            self.haircuts.fetch_add(1, Ordering::SeqCst);
            self.barber_ready.release(1);
        }

        let haircuts = self.haircuts();
        emit(BarberState::Closed, haircuts);

        Ok(haircuts)
    }
}

/// Result of a finished sleeping barber run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepingBarberSummary {
    pub customers: usize,
    pub served: usize,
    pub turned_away: usize,
    pub haircuts: usize,
}

/// Opens a shop with `config.chairs` waiting chairs and sends
/// `config.customers` customers in, one every `config.arrival_delay`.
///
/// The barber closes once every customer has been served or turned away.
///
/// # Errors
///
/// * [`Error::InvalidConfiguration`] if the configuration does not validate
/// * If an actor fails or panics
pub async fn run_sleeping_barber_demo(
    config: &SleepingBarberConfig,
    sink: Arc<dyn EventSink>,
    token: &CancellationToken,
) -> Result<Completion<SleepingBarberSummary>, Error> {
    config.validate()?;

    log::info!(
        "run_sleeping_barber_demo: customers={} chairs={}",
        config.customers,
        config.chairs
    );

    let shop = Arc::new(BarberShop::new(config.chairs)?);
    let token = token.child_token();
    let closing = token.child_token();

    let barber = {
        let shop = shop.clone();
        let sink = sink.clone();
        let closing = closing.clone();
        let token = token.clone();
        let haircut = config.haircut_delay;
        let seed = config.seed;
        task::spawn("barber", async move {
            shop.work(haircut, seed, sink.as_ref(), &closing, &token)
                .await
        })
    };

    let mut arrivals = Pacer::new(config.seed, 1);
    let mut customers = Vec::with_capacity(config.customers);

    for id in 1..=config.customers {
        let shop = shop.clone();
        let sink = sink.clone();
        let customer_token = token.clone();
        customers.push(task::spawn(&format!("customer-{id}"), async move {
            shop.visit(id, sink.as_ref(), &customer_token).await
        }));

        if id < config.customers && arrivals.pause(config.arrival_delay, &token).await.is_err() {
            log::debug!("run_sleeping_barber_demo: cancelled after {id} arrivals");
            break;
        }
    }

    let visits = join_actors(customers, &token).await;
    closing.cancel();
    let barber = join_actors(vec![barber], &token).await;
    let (visits, barber) = (visits?, barber?);

    let (Completion::Finished(visits), Completion::Finished(haircuts)) = (visits, barber) else {
        return Ok(Completion::Cancelled);
    };
    if token.is_cancelled() {
        return Ok(Completion::Cancelled);
    }

    let served = visits.iter().filter(|x| **x == Visit::Served).count();
    let summary = SleepingBarberSummary {
        customers: visits.len(),
        served,
        turned_away: visits.len() - served,
        haircuts: haircuts.into_iter().sum(),
    };

    classic_sync_assert::assert!(
        summary.served == summary.haircuts,
        "run_sleeping_barber_demo: served {} customers with {} haircuts",
        summary.served,
        summary.haircuts
    );
    classic_sync_logging::debug_or_trace!(
        ("run_sleeping_barber_demo: finished"),
        ("run_sleeping_barber_demo: finished {summary:?}")
    );

    Ok(Completion::Finished(summary))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use classic_sync_models::{NullSink, RecordingSink};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn a_shop_without_chairs_is_rejected() {
        assert!(matches!(
            BarberShop::new(0),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test_log::test(tokio::test)]
    async fn full_waiting_room_turns_customers_away() {
        let token = CancellationToken::new();
        let shop = Arc::new(BarberShop::new(1).unwrap());

        let seated = {
            let shop = shop.clone();
            let token = token.clone();
            tokio::spawn(async move { shop.visit(1, &NullSink, &token).await })
        };
        while shop.waiting() == 0 {
            tokio::task::yield_now().await;
        }

        let sink = RecordingSink::new();
        assert_eq!(shop.visit(2, &sink, &token).await.unwrap(), Visit::TurnedAway);
        assert_eq!(
            sink.events().into_iter().map(|x| x.event).collect::<Vec<_>>(),
            vec![
                Event::CustomerStateChanged {
                    id: 2,
                    state: CustomerState::Arrived,
                    free_chairs: None,
                },
                Event::CustomerStateChanged {
                    id: 2,
                    state: CustomerState::TurnedAway,
                    free_chairs: Some(0),
                },
            ]
        );

        token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), seated)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test_log::test(tokio::test)]
    async fn barber_closes_when_told_and_nobody_waits() {
        let token = CancellationToken::new();
        let closing = token.child_token();
        let shop = BarberShop::new(2).unwrap();
        let sink = RecordingSink::new();

        closing.cancel();
        let haircuts = shop
            .work(DelayRange::ZERO, None, &sink, &closing, &token)
            .await
            .unwrap();

        assert_eq!(haircuts, 0);
        assert_eq!(
            sink.events().into_iter().map(|x| x.event).collect::<Vec<_>>(),
            vec![
                Event::BarberStateChanged {
                    state: BarberState::Sleeping,
                    haircuts: 0,
                },
                Event::BarberStateChanged {
                    state: BarberState::Closed,
                    haircuts: 0,
                },
            ]
        );
    }

    #[test_log::test(tokio::test)]
    async fn barber_stops_on_shutdown() {
        let token = CancellationToken::new();
        let closing = token.child_token();
        let shop = BarberShop::new(2).unwrap();

        token.cancel();

        assert!(matches!(
            shop.work(DelayRange::ZERO, None, &NullSink, &closing, &token).await,
            Err(Error::Cancelled)
        ));
    }

    #[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
    async fn every_customer_is_served_or_turned_away() {
        let config = SleepingBarberConfig {
            customers: 12,
            chairs: 2,
            ..SleepingBarberConfig::default()
        }
        .without_delays()
        .with_seed(Some(3));

        let summary = run_sleeping_barber_demo(&config, Arc::new(NullSink), &CancellationToken::new())
            .await
            .unwrap()
            .finished()
            .unwrap();

        assert_eq!(summary.customers, 12);
        assert_eq!(summary.served + summary.turned_away, 12);
        assert_eq!(summary.haircuts, summary.served);
        assert!(summary.served >= 1);
    }
}
