use serde::{Deserialize, Serialize};

use crate::{
    ConfigError, DelayRange,
    env::{EnvSource, ProcessEnv, default_env, option_env},
};

const SEED_ENV: &str = "CLASSIC_SYNC_SEED";

/// Bounded-buffer producer/consumer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerConsumerConfig {
    /// Items the producer puts and the consumer takes.
    pub item_count: u64,
    /// Slots in the ring buffer.
    pub capacity: usize,
    /// Pause after each put.
    pub produce_delay: DelayRange,
    /// Pause after each take.
    pub consume_delay: DelayRange,
    pub seed: Option<u64>,
}

impl Default for ProducerConsumerConfig {
    fn default() -> Self {
        Self {
            item_count: 12,
            capacity: 5,
            produce_delay: DelayRange::millis(200, 700),
            consume_delay: DelayRange::millis(300, 900),
            seed: None,
        }
    }
}

impl ProducerConsumerConfig {
    /// # Errors
    ///
    /// * If a `CLASSIC_SYNC_*` variable does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    /// # Errors
    ///
    /// * If a variable does not parse
    pub fn from_source(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            item_count: default_env(env, "CLASSIC_SYNC_ITEMS", defaults.item_count)?,
            capacity: default_env(env, "CLASSIC_SYNC_BUFFER_CAPACITY", defaults.capacity)?,
            produce_delay: default_env(env, "CLASSIC_SYNC_PRODUCE_DELAY_MS", defaults.produce_delay)?,
            consume_delay: default_env(env, "CLASSIC_SYNC_CONSUME_DELAY_MS", defaults.consume_delay)?,
            seed: option_env(env, SEED_ENV)?,
        })
    }

    #[must_use]
    pub const fn without_delays(mut self) -> Self {
        self.produce_delay = DelayRange::ZERO;
        self.consume_delay = DelayRange::ZERO;
        self
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// # Errors
    ///
    /// * If `capacity` is 0
    /// * If a delay range is inverted
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::invalid("buffer capacity must be greater than 0"));
        }
        self.produce_delay.validate("produce")?;
        self.consume_delay.validate("consume")?;
        Ok(())
    }
}

/// Dining philosophers settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiningConfig {
    /// Seats around the table, and therefore forks.
    pub seats: usize,
    /// Think/eat cycles each seat completes.
    pub rounds: usize,
    pub think_delay: DelayRange,
    pub eat_delay: DelayRange,
    /// Pause after putting the forks down, before the next round.
    pub rest_delay: DelayRange,
    pub seed: Option<u64>,
}

impl Default for DiningConfig {
    fn default() -> Self {
        Self {
            seats: 5,
            rounds: 3,
            think_delay: DelayRange::millis(200, 700),
            eat_delay: DelayRange::millis(300, 800),
            rest_delay: DelayRange::millis(200, 600),
            seed: None,
        }
    }
}

impl DiningConfig {
    /// # Errors
    ///
    /// * If a `CLASSIC_SYNC_*` variable does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    /// # Errors
    ///
    /// * If a variable does not parse
    pub fn from_source(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            seats: default_env(env, "CLASSIC_SYNC_SEATS", defaults.seats)?,
            rounds: default_env(env, "CLASSIC_SYNC_ROUNDS", defaults.rounds)?,
            think_delay: default_env(env, "CLASSIC_SYNC_THINK_DELAY_MS", defaults.think_delay)?,
            eat_delay: default_env(env, "CLASSIC_SYNC_EAT_DELAY_MS", defaults.eat_delay)?,
            rest_delay: default_env(env, "CLASSIC_SYNC_REST_DELAY_MS", defaults.rest_delay)?,
            seed: option_env(env, SEED_ENV)?,
        })
    }

    #[must_use]
    pub const fn without_delays(mut self) -> Self {
        self.think_delay = DelayRange::ZERO;
        self.eat_delay = DelayRange::ZERO;
        self.rest_delay = DelayRange::ZERO;
        self
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// # Errors
    ///
    /// * If there are fewer than 2 seats
    /// * If a delay range is inverted
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seats < 2 {
            return Err(ConfigError::invalid(format!(
                "dining table needs at least 2 seats, got {}",
                self.seats
            )));
        }
        self.think_delay.validate("think")?;
        self.eat_delay.validate("eat")?;
        self.rest_delay.validate("rest")?;
        Ok(())
    }
}

/// Readers-writers (readers preference) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadersWritersConfig {
    pub readers: usize,
    pub writers: usize,
    pub rounds: usize,
    pub read_delay: DelayRange,
    pub reader_rest: DelayRange,
    pub write_delay: DelayRange,
    pub writer_rest: DelayRange,
    pub seed: Option<u64>,
}

impl Default for ReadersWritersConfig {
    fn default() -> Self {
        Self {
            readers: 4,
            writers: 2,
            rounds: 4,
            read_delay: DelayRange::millis(200, 600),
            reader_rest: DelayRange::millis(300, 800),
            write_delay: DelayRange::millis(400, 900),
            writer_rest: DelayRange::millis(500, 900),
            seed: None,
        }
    }
}

impl ReadersWritersConfig {
    /// # Errors
    ///
    /// * If a `CLASSIC_SYNC_*` variable does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    /// # Errors
    ///
    /// * If a variable does not parse
    pub fn from_source(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            readers: default_env(env, "CLASSIC_SYNC_READERS", defaults.readers)?,
            writers: default_env(env, "CLASSIC_SYNC_WRITERS", defaults.writers)?,
            rounds: default_env(env, "CLASSIC_SYNC_RW_ROUNDS", defaults.rounds)?,
            read_delay: default_env(env, "CLASSIC_SYNC_READ_DELAY_MS", defaults.read_delay)?,
            reader_rest: default_env(env, "CLASSIC_SYNC_READER_REST_MS", defaults.reader_rest)?,
            write_delay: default_env(env, "CLASSIC_SYNC_WRITE_DELAY_MS", defaults.write_delay)?,
            writer_rest: default_env(env, "CLASSIC_SYNC_WRITER_REST_MS", defaults.writer_rest)?,
            seed: option_env(env, SEED_ENV)?,
        })
    }

    #[must_use]
    pub const fn without_delays(mut self) -> Self {
        self.read_delay = DelayRange::ZERO;
        self.reader_rest = DelayRange::ZERO;
        self.write_delay = DelayRange::ZERO;
        self.writer_rest = DelayRange::ZERO;
        self
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// # Errors
    ///
    /// * If a delay range is inverted
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.read_delay.validate("read")?;
        self.reader_rest.validate("reader rest")?;
        self.write_delay.validate("write")?;
        self.writer_rest.validate("writer rest")?;
        Ok(())
    }
}

/// Sleeping barber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepingBarberConfig {
    pub customers: usize,
    /// Waiting-room chairs. The barber's own chair is not counted.
    pub chairs: usize,
    /// Gap between consecutive customer arrivals.
    pub arrival_delay: DelayRange,
    pub haircut_delay: DelayRange,
    pub seed: Option<u64>,
}

impl Default for SleepingBarberConfig {
    fn default() -> Self {
        Self {
            customers: 10,
            chairs: 3,
            arrival_delay: DelayRange::millis(150, 400),
            haircut_delay: DelayRange::millis(300, 800),
            seed: None,
        }
    }
}

impl SleepingBarberConfig {
    /// # Errors
    ///
    /// * If a `CLASSIC_SYNC_*` variable does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    /// # Errors
    ///
    /// * If a variable does not parse
    pub fn from_source(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            customers: default_env(env, "CLASSIC_SYNC_CUSTOMERS", defaults.customers)?,
            chairs: default_env(env, "CLASSIC_SYNC_CHAIRS", defaults.chairs)?,
            arrival_delay: default_env(env, "CLASSIC_SYNC_ARRIVAL_DELAY_MS", defaults.arrival_delay)?,
            haircut_delay: default_env(env, "CLASSIC_SYNC_HAIRCUT_DELAY_MS", defaults.haircut_delay)?,
            seed: option_env(env, SEED_ENV)?,
        })
    }

    #[must_use]
    pub const fn without_delays(mut self) -> Self {
        self.arrival_delay = DelayRange::ZERO;
        self.haircut_delay = DelayRange::ZERO;
        self
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// # Errors
    ///
    /// * If there are no waiting-room chairs
    /// * If a delay range is inverted
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chairs == 0 {
            return Err(ConfigError::invalid("barber shop needs at least 1 chair"));
        }
        self.arrival_delay.validate("arrival")?;
        self.haircut_delay.validate("haircut")?;
        Ok(())
    }
}

/// Settings for the runtime the demos are driven on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Worker threads for the multi-threaded scheduler. `None` uses one per
    /// core.
    pub worker_threads: Option<usize>,
}

impl RuntimeConfig {
    /// # Errors
    ///
    /// * If `CLASSIC_SYNC_WORKER_THREADS` does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    /// # Errors
    ///
    /// * If a variable does not parse
    pub fn from_source(env: &impl EnvSource) -> Result<Self, ConfigError> {
        Ok(Self {
            worker_threads: option_env(env, "CLASSIC_SYNC_WORKER_THREADS")?,
        })
    }

    /// # Errors
    ///
    /// * If `worker_threads` is `Some(0)`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == Some(0) {
            return Err(ConfigError::invalid("worker threads must be greater than 0"));
        }
        Ok(())
    }
}
