//! Dining philosophers with an admission gate.
//!
//! Every seat picks up its left fork (`forks[id]`) before its right fork
//! (`forks[(id + 1) % N]`). On its own that ordering can deadlock with every
//! seat holding its left fork, so a seat first passes a gate that admits at
//! most `N - 1` seats at a time. At least one admitted seat then always finds
//! both of its forks free eventually.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use classic_sync_config::{ConfigError, DelayRange, DiningConfig};
use classic_sync_models::{Event, EventSink, PhilosopherState};
use classic_sync_semaphore::{CancellationToken, Mutex, MutexGuard, Permit, Semaphore};

use crate::{Completion, Error, delay::Pacer, join_actors, task};

/// A fork, shared by two neighbouring seats.
#[derive(Debug)]
pub struct Fork {
    pub id: usize,
    /// Meals eaten with this fork.
    pub uses: u64,
}

/// The shared resources of the table: forks and the admission gate.
#[derive(Debug)]
pub struct DiningTable {
    forks: Vec<Mutex<Fork>>,
    gate: Semaphore,
    attempting: AtomicUsize,
    max_attempting: AtomicUsize,
    eating: Vec<AtomicBool>,
}

impl DiningTable {
    /// # Errors
    ///
    /// * [`Error::InvalidConfiguration`] if there are fewer than 2 seats
    pub fn new(seats: usize) -> Result<Self, Error> {
        if seats < 2 {
            return Err(ConfigError::InvalidConfiguration(format!(
                "dining table needs at least 2 seats, got {seats}"
            ))
            .into());
        }

        Ok(Self {
            forks: (0..seats)
                .map(|id| Mutex::new(Fork { id, uses: 0 }).with_name(format!("fork-{id}")))
                .collect(),
            gate: Semaphore::with_capacity(seats - 1, seats - 1)?.with_name("gate"),
            attempting: AtomicUsize::new(0),
            max_attempting: AtomicUsize::new(0),
            eating: (0..seats).map(|_| AtomicBool::new(false)).collect(),
        })
    }

    #[must_use]
    pub fn seats(&self) -> usize {
        self.forks.len()
    }

    #[must_use]
    #[allow(clippy::unused_self)]
    pub const fn left_fork(&self, seat: usize) -> usize {
        seat
    }

    #[must_use]
    pub fn right_fork(&self, seat: usize) -> usize {
        (seat + 1) % self.seats()
    }

    /// Admission permits currently free.
    #[must_use]
    pub fn gate_available(&self) -> usize {
        self.gate.available()
    }

    /// Most seats ever seen past the gate at once.
    #[must_use]
    pub fn max_attempting(&self) -> usize {
        self.max_attempting.load(Ordering::SeqCst)
    }

    /// Whether some seat currently holds fork `id`.
    ///
    /// # Panics
    ///
    /// * If `id` is not a fork of this table
    #[must_use]
    pub fn fork_is_held(&self, id: usize) -> bool {
        self.forks[id].is_locked()
    }

    /// Meals eaten with each fork, or `None` while any fork is held.
    #[must_use]
    pub fn fork_uses(&self) -> Option<Vec<u64>> {
        self.forks
            .iter()
            .map(|fork| fork.try_lock().ok().map(|x| x.uses))
            .collect()
    }

    /// Waits for a seat at the gate.
    ///
    /// # Errors
    ///
    /// * [`Error::Cancelled`] if `token` fires first
    pub async fn admit(&self, token: &CancellationToken) -> Result<Admission<'_>, Error> {
        let permit = self.gate.acquire(token).await?;

        let attempting = self.attempting.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_attempting.fetch_max(attempting, Ordering::SeqCst);
        classic_sync_assert::assert!(
            attempting < self.seats(),
            "dining: {attempting} seats attempting at a table of {}",
            self.seats()
        );

        Ok(Admission {
            table: self,
            _permit: permit,
        })
    }

    /// Picks up both forks of `seat`, left first.
    ///
    /// A fork already in hand is put back if `token` fires while waiting on
    /// the other one.
    ///
    /// # Errors
    ///
    /// * [`Error::Cancelled`] if `token` fires first
    pub async fn pick_up_forks<'a>(
        &'a self,
        seat: usize,
        admission: Admission<'a>,
        token: &CancellationToken,
    ) -> Result<Meal<'a>, Error> {
        let left = self.forks[self.left_fork(seat)].lock(token).await?;
        let right = self.forks[self.right_fork(seat)].lock(token).await?;

        self.eating[seat].store(true, Ordering::SeqCst);

        let seats = self.seats();
        let before = (seat + seats - 1) % seats;
        let after = (seat + 1) % seats;
        classic_sync_assert::assert!(
            !self.eating[before].load(Ordering::SeqCst) && !self.eating[after].load(Ordering::SeqCst),
            "dining: seat {seat} eats next to an eating neighbour"
        );

        Ok(Meal {
            seat,
            right,
            left,
            admission,
        })
    }

    /// Runs one seat for `rounds` rounds, reporting each transition.
    ///
    /// The transition out of `Eating` is reported before the forks and the
    /// admission permit go back, so a recorded `Eating` span never overlaps a
    /// neighbour's.
    ///
    /// # Errors
    ///
    /// * [`Error::Cancelled`] if `token` fires, after giving back everything
    ///   the seat held
    pub async fn dine(
        &self,
        seat: usize,
        rounds: usize,
        timings: Timings,
        sink: &dyn EventSink,
        token: &CancellationToken,
    ) -> Result<usize, Error> {
        let mut pacer = Pacer::new(timings.seed, seat as u64);
        let emit = |round, state| {
            sink.emit(Event::PhilosopherStateChanged {
                id: seat,
                round,
                state,
            });
        };

        if rounds == 0 {
            emit(0, PhilosopherState::Done);
            return Ok(0);
        }

        emit(1, PhilosopherState::Thinking);

        for round in 1..=rounds {
            pacer.pause(timings.think, token).await?;

            emit(round, PhilosopherState::WaitingForGate);
            let admission = self.admit(token).await?;

            emit(round, PhilosopherState::WaitingForForks);
            let mut meal = self.pick_up_forks(seat, admission, token).await?;

            emit(round, PhilosopherState::Eating);
            pacer.pause(timings.eat, token).await?;
            meal.left.uses += 1;
            meal.right.uses += 1;

            if round == rounds {
                emit(round, PhilosopherState::Done);
            } else {
                emit(round + 1, PhilosopherState::Thinking);
            }
            drop(meal);

            if round < rounds {
                pacer.pause(timings.rest, token).await?;
            }
        }

        Ok(rounds)
    }
}

/// Delays used by a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub think: DelayRange,
    pub eat: DelayRange,
    /// Pause after the forks go back, before the next round's thinking.
    pub rest: DelayRange,
    pub seed: Option<u64>,
}

impl From<&DiningConfig> for Timings {
    fn from(value: &DiningConfig) -> Self {
        Self {
            think: value.think_delay,
            eat: value.eat_delay,
            rest: value.rest_delay,
            seed: value.seed,
        }
    }
}

/// An admission permit held by a seat that is attempting to eat.
#[must_use = "dropping an admission gives the gate permit back"]
#[derive(Debug)]
pub struct Admission<'a> {
    table: &'a DiningTable,
    _permit: Permit<'a>,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.table.attempting.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Both forks of a seat plus its admission.
///
/// Dropping the meal puts the right fork down, then the left one, then
/// leaves the gate.
#[must_use = "dropping a meal releases the forks"]
#[derive(Debug)]
pub struct Meal<'a> {
    seat: usize,
    right: MutexGuard<'a, Fork>,
    left: MutexGuard<'a, Fork>,
    admission: Admission<'a>,
}

impl Meal<'_> {
    #[must_use]
    pub const fn seat(&self) -> usize {
        self.seat
    }
}

impl Drop for Meal<'_> {
    fn drop(&mut self) {
        self.admission.table.eating[self.seat].store(false, Ordering::SeqCst);
    }
}

/// Result of a finished dining run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiningSummary {
    pub seats: usize,
    pub rounds: usize,
    /// Meals per seat, indexed by seat id.
    pub meals: Vec<usize>,
    /// Meals per fork, indexed by fork id.
    pub fork_uses: Vec<u64>,
    pub max_attempting: usize,
}

/// Seats `config.seats` philosophers and lets each eat `config.rounds`
/// times.
///
/// # Errors
///
/// * [`Error::InvalidConfiguration`] if the configuration does not validate
/// * If a seat fails or panics
pub async fn run_dining_philosophers_demo(
    config: &DiningConfig,
    sink: Arc<dyn EventSink>,
    token: &CancellationToken,
) -> Result<Completion<DiningSummary>, Error> {
    config.validate()?;

    log::info!(
        "run_dining_philosophers_demo: seats={} rounds={}",
        config.seats,
        config.rounds
    );

    let table = Arc::new(DiningTable::new(config.seats)?);
    let token = token.child_token();
    let timings = Timings::from(config);

    let handles = (0..config.seats)
        .map(|seat| {
            let table = table.clone();
            let sink = sink.clone();
            let token = token.clone();
            let rounds = config.rounds;
            task::spawn(&format!("philosopher-{seat}"), async move {
                table.dine(seat, rounds, timings, sink.as_ref(), &token).await
            })
        })
        .collect();

    let completion = join_actors(handles, &token).await?;

    classic_sync_assert::assert!(
        table.gate_available() == config.seats - 1,
        "run_dining_philosophers_demo: gate holds {} of {} permits after the run",
        table.gate_available(),
        config.seats - 1
    );

    let Some(fork_uses) = table.fork_uses() else {
        classic_sync_assert::die_or_error!("run_dining_philosophers_demo: fork still held after the run");
        return Err(Error::InvariantViolated(
            "fork still held after every seat stopped".to_string(),
        ));
    };

    Ok(completion.map(|meals| {
        let summary = DiningSummary {
            seats: config.seats,
            rounds: config.rounds,
            meals,
            fork_uses,
            max_attempting: table.max_attempting(),
        };
        classic_sync_logging::debug_or_trace!(
            ("run_dining_philosophers_demo: finished"),
            ("run_dining_philosophers_demo: finished {summary:?}")
        );
        summary
    }))
}

/// Runs the dining demo with the default timings.
///
/// # Errors
///
/// * See [`run_dining_philosophers_demo`]
pub async fn run_dining_philosophers(
    seat_count: usize,
    rounds: usize,
    sink: Arc<dyn EventSink>,
    token: &CancellationToken,
) -> Result<Completion<DiningSummary>, Error> {
    let config = DiningConfig {
        seats: seat_count,
        rounds,
        ..DiningConfig::default()
    };
    run_dining_philosophers_demo(&config, sink, token).await
}
