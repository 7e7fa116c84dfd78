#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Configuration for the classic sync demos.
//!
//! Every demo has a config struct whose [`Default`] matches the values the
//! demos were designed around. `from_env` layers `CLASSIC_SYNC_*` environment
//! variables on top, and `validate` rejects configurations the demos cannot
//! run with.
//!
//! ```rust
//! use classic_sync_config::{DiningConfig, DelayRange};
//!
//! let config = DiningConfig {
//!     seats: 8,
//!     ..DiningConfig::default()
//! }
//! .without_delays();
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.eat_delay, DelayRange::ZERO);
//! ```

use thiserror::Error;

mod delay;
mod demos;
pub mod env;

pub use delay::DelayRange;
pub use demos::{
    DiningConfig, ProducerConsumerConfig, ReadersWritersConfig, RuntimeConfig,
    SleepingBarberConfig,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration can never be run, e.g. a zero-capacity buffer.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// An environment variable was set to something that does not parse.
    #[error("Invalid value for environment variable {name}: {value:?}")]
    InvalidEnv { name: String, value: String },
    #[error("Invalid delay range {0:?}, expected MIN..MAX or a single value in milliseconds")]
    InvalidDelayRange(String),
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }
}
