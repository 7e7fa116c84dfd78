#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error;

#[cfg(feature = "macros")]
mod macros;

#[cfg(feature = "macros")]
pub use macros::*;

#[cfg(not(feature = "macros"))]
pub use log;

/// Environment variable consulted first for the log filter.
pub const LOG_ENV: &str = "CLASSIC_SYNC_LOG";

#[cfg(debug_assertions)]
pub const DEFAULT_LOG_LEVEL: &str = "classic_sync=trace";
#[cfg(not(debug_assertions))]
pub const DEFAULT_LOG_LEVEL: &str = "classic_sync=info";

#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    SetLogger(#[from] log::SetLoggerError),
}

/// Picks the filter directive: `CLASSIC_SYNC_LOG`, then `RUST_LOG`, then
/// [`DEFAULT_LOG_LEVEL`].
#[must_use]
pub fn filter_from(classic_sync_log: Option<String>, rust_log: Option<String>) -> String {
    classic_sync_log
        .filter(|x| !x.trim().is_empty())
        .or_else(|| rust_log.filter(|x| !x.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// Installs the global logger.
///
/// # Errors
///
/// * If a global logger was already installed
pub fn init() -> Result<(), InitError> {
    let filter = filter_from(std::env::var(LOG_ENV).ok(), std::env::var("RUST_LOG").ok());

    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&filter)
        .try_init()?;

    log::debug!("init: logging initialized with filter {filter:?}");

    Ok(())
}
