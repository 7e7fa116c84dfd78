//! Producer/consumer over a bounded ring buffer.
//!
//! `empty` counts free slots and `full` counts filled ones. A put takes an
//! `empty` permit, writes under the ring lock, and hands the permit over to
//! `full`. A take does the opposite.

use std::sync::Arc;

use classic_sync_config::{ConfigError, ProducerConsumerConfig};
use classic_sync_models::{Event, EventSink};
use classic_sync_semaphore::{CancellationToken, Mutex, Semaphore};

use crate::{Completion, Error, delay::Pacer, join_actors, task};

/// Where an item landed, observed inside the critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub slot: usize,
    /// Filled slots right after the operation.
    pub occupied: usize,
}

/// Available permits on the two buffer semaphores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermitCounts {
    pub empty: usize,
    pub full: usize,
    pub capacity: usize,
}

impl PermitCounts {
    /// Whether every slot is accounted for exactly once. Only meaningful
    /// while no put or take is in flight.
    #[must_use]
    pub const fn is_balanced(&self) -> bool {
        self.empty + self.full == self.capacity
    }
}

#[derive(Debug)]
struct Ring<T> {
    slots: Vec<Option<T>>,
    write_index: usize,
    read_index: usize,
    occupied: usize,
}

impl<T> Ring<T> {
    fn new(capacity: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
            write_index: 0,
            read_index: 0,
            occupied: 0,
        }
    }

    fn write(&mut self, item: T) -> Result<Placement, Error> {
        let slot = self.write_index;

        if self.slots[slot].is_some() {
            classic_sync_assert::die_or_error!("ring: write into filled slot {slot}");
            return Err(Error::InvariantViolated(format!(
                "write into filled slot {slot}"
            )));
        }

        self.slots[slot] = Some(item);
        self.write_index = (slot + 1) % self.slots.len();
        self.occupied += 1;

        classic_sync_assert::assert!(
            self.occupied <= self.slots.len(),
            "ring: occupied {} exceeds capacity {}",
            self.occupied,
            self.slots.len()
        );

        Ok(Placement {
            slot,
            occupied: self.occupied,
        })
    }

    fn read(&mut self) -> Result<(T, Placement), Error> {
        let slot = self.read_index;

        let Some(item) = self.slots[slot].take() else {
            classic_sync_assert::die_or_error!("ring: read from empty slot {slot}");
            return Err(Error::InvariantViolated(format!(
                "read from empty slot {slot}"
            )));
        };

        self.read_index = (slot + 1) % self.slots.len();
        self.occupied -= 1;

        Ok((
            item,
            Placement {
                slot,
                occupied: self.occupied,
            },
        ))
    }
}

/// A fixed-capacity FIFO shared between producers and consumers.
///
/// `put` suspends while the buffer is full and `take` suspends while it is
/// empty. Both stop waiting when their cancellation token fires, and a
/// cancelled call leaves the buffer and its counters untouched.
#[derive(Debug)]
pub struct BoundedBufferChannel<T> {
    ring: Mutex<Ring<T>>,
    empty: Semaphore,
    full: Semaphore,
}

impl<T> BoundedBufferChannel<T> {
    /// # Errors
    ///
    /// * [`Error::InvalidConfiguration`] if `capacity` is zero
    pub fn new(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "buffer capacity must be at least 1".to_string(),
            )
            .into());
        }

        Ok(Self {
            ring: Mutex::new(Ring::new(capacity)).with_name("ring"),
            empty: Semaphore::with_capacity(capacity, capacity)?.with_name("empty"),
            full: Semaphore::with_capacity(0, capacity)?.with_name("full"),
        })
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.empty.capacity()
    }

    #[must_use]
    pub fn counts(&self) -> PermitCounts {
        PermitCounts {
            empty: self.empty.available(),
            full: self.full.available(),
            capacity: self.capacity(),
        }
    }

    /// Most tasks ever seen holding the ring lock at once.
    #[must_use]
    pub fn max_lock_holders(&self) -> usize {
        self.ring.max_holders()
    }

    /// Whether a task currently holds the ring lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.ring.is_locked()
    }

    /// Appends `item`, suspending while the buffer is full.
    ///
    /// # Errors
    ///
    /// * [`Error::Cancelled`] if `token` fires before the item is placed
    pub async fn put(&self, item: T, token: &CancellationToken) -> Result<Placement, Error> {
        self.put_with(item, token, |_, _| {}).await
    }

    /// Like [`Self::put`], calling `on_placed` inside the critical section
    /// once the item is in its slot.
    ///
    /// `on_placed` runs while the ring lock is held, so calls observe the
    /// buffer in the same order the puts happened.
    ///
    /// # Errors
    ///
    /// * [`Error::Cancelled`] if `token` fires before the item is placed
    /// * [`Error::InvariantViolated`] if the write slot is already filled
    pub async fn put_with(
        &self,
        item: T,
        token: &CancellationToken,
        on_placed: impl FnOnce(&T, Placement),
    ) -> Result<Placement, Error> {
        let slot = self.empty.acquire(token).await?;
        let mut ring = self.ring.lock(token).await?;

        let placement = {
            let index = ring.write_index;
            let placement = ring.write(item)?;
            if let Some(item) = &ring.slots[index] {
                on_placed(item, placement);
            }
            placement
        };

        drop(ring);
        slot.transfer(&self.full);

        Ok(placement)
    }

    /// Removes the oldest item, suspending while the buffer is empty.
    ///
    /// # Errors
    ///
    /// * [`Error::Cancelled`] if `token` fires before an item is taken
    pub async fn take(&self, token: &CancellationToken) -> Result<T, Error> {
        self.take_with(token, |_, _| {}).await
    }

    /// Like [`Self::take`], calling `on_taken` inside the critical section
    /// once the item is out of its slot.
    ///
    /// # Errors
    ///
    /// * [`Error::Cancelled`] if `token` fires before an item is taken
    /// * [`Error::InvariantViolated`] if the read slot is empty
    pub async fn take_with(
        &self,
        token: &CancellationToken,
        on_taken: impl FnOnce(&T, Placement),
    ) -> Result<T, Error> {
        let filled = self.full.acquire(token).await?;
        let mut ring = self.ring.lock(token).await?;

        let (item, placement) = ring.read()?;
        on_taken(&item, placement);

        drop(ring);
        filled.transfer(&self.empty);

        Ok(item)
    }
}

/// Result of a finished producer/consumer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerConsumerSummary {
    pub produced: u64,
    pub consumed: u64,
    pub counts: PermitCounts,
    pub max_lock_holders: usize,
}

async fn produce(
    channel: Arc<BoundedBufferChannel<u64>>,
    config: ProducerConsumerConfig,
    sink: Arc<dyn EventSink>,
    token: CancellationToken,
) -> Result<u64, Error> {
    let mut pacer = Pacer::new(config.seed, 0);

    for item in 1..=config.item_count {
        channel
            .put_with(item, &token, |&item, placement| {
                sink.emit(Event::ItemProduced {
                    item,
                    slot: placement.slot,
                    occupied: placement.occupied,
                });
            })
            .await?;
        log::trace!("produce: put item={item}");

        pacer.pause(config.produce_delay, &token).await?;
    }

    Ok(config.item_count)
}

async fn consume(
    channel: Arc<BoundedBufferChannel<u64>>,
    config: ProducerConsumerConfig,
    sink: Arc<dyn EventSink>,
    token: CancellationToken,
) -> Result<u64, Error> {
    let mut pacer = Pacer::new(config.seed, 1);

    for _ in 0..config.item_count {
        let item = channel
            .take_with(&token, |&item, placement| {
                sink.emit(Event::ItemConsumed {
                    item,
                    slot: placement.slot,
                    occupied: placement.occupied,
                });
            })
            .await?;
        log::trace!("consume: took item={item}");

        pacer.pause(config.consume_delay, &token).await?;
    }

    Ok(config.item_count)
}

/// Runs one producer and one consumer over a buffer of `config.capacity`
/// slots, moving items `1..=config.item_count` through it.
///
/// # Errors
///
/// * [`Error::InvalidConfiguration`] if the configuration does not validate
/// * If an actor fails or panics
pub async fn run_producer_consumer_demo(
    config: &ProducerConsumerConfig,
    sink: Arc<dyn EventSink>,
    token: &CancellationToken,
) -> Result<Completion<ProducerConsumerSummary>, Error> {
    config.validate()?;

    log::info!(
        "run_producer_consumer_demo: items={} capacity={}",
        config.item_count,
        config.capacity
    );

    let channel = Arc::new(BoundedBufferChannel::new(config.capacity)?);
    let token = token.child_token();

    let producer = task::spawn(
        "producer",
        produce(channel.clone(), config.clone(), sink.clone(), token.clone()),
    );
    let consumer = task::spawn(
        "consumer",
        consume(channel.clone(), config.clone(), sink, token.clone()),
    );

    let completion = join_actors(vec![producer, consumer], &token).await?;

    let counts = channel.counts();
    classic_sync_assert::assert!(
        counts.is_balanced(),
        "run_producer_consumer_demo: permits out of balance after the run: {counts:?}"
    );

    Ok(completion.map(|counts_by_actor| {
        let summary = ProducerConsumerSummary {
            produced: counts_by_actor[0],
            consumed: counts_by_actor[1],
            counts,
            max_lock_holders: channel.max_lock_holders(),
        };
        classic_sync_logging::debug_or_trace!(
            ("run_producer_consumer_demo: finished"),
            ("run_producer_consumer_demo: finished {summary:?}")
        );
        summary
    }))
}

/// Runs the producer/consumer demo with the default timings and a buffer of
/// five slots.
///
/// # Errors
///
/// * See [`run_producer_consumer_demo`]
pub async fn run_producer_consumer(
    item_count: u64,
    sink: Arc<dyn EventSink>,
    token: &CancellationToken,
) -> Result<Completion<ProducerConsumerSummary>, Error> {
    let config = ProducerConsumerConfig {
        item_count,
        ..ProducerConsumerConfig::default()
    };
    run_producer_consumer_demo(&config, sink, token).await
}
