//! Invariant assertions for the synchronization primitives and demos.
//!
//! A failed invariant is a programming defect, never a runtime condition to
//! recover from. The macros here are active in debug builds (and therefore in
//! every test run) and in release builds started with
//! `CLASSIC_SYNC_ENABLE_ASSERT=1`. When active, a failure prints the message
//! with a captured backtrace and panics, which tears down the offending task
//! and surfaces as a join error in the demo driver.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::{fmt::Arguments, sync::LazyLock};

use colored::Colorize as _;

pub use log;

/// Environment variable that enables assertions in release builds.
pub const ENABLE_ASSERT_ENV: &str = "CLASSIC_SYNC_ENABLE_ASSERT";

static ENABLED: LazyLock<bool> = LazyLock::new(|| {
    cfg!(debug_assertions) || std::env::var(ENABLE_ASSERT_ENV).is_ok_and(|x| x == "1")
});

/// Whether invariant assertions are checked in this process.
#[must_use]
pub fn enabled() -> bool {
    *ENABLED
}

/// Reports a failed invariant and panics.
///
/// # Panics
///
/// * Always
#[doc(hidden)]
#[cold]
#[track_caller]
pub fn fail(args: Arguments<'_>) -> ! {
    let message = args.to_string();

    eprintln!(
        "{}: \"{}\"\n{}",
        "assert failed".red().bold(),
        message,
        std::backtrace::Backtrace::force_capture()
    );
    log::error!("assert failed: {message}");

    panic!("assert failed: {message}");
}

#[macro_export]
macro_rules! assert {
    ($evaluate:expr $(,)?) => {
        if $crate::enabled() && !($evaluate) {
            $crate::fail(format_args!("{}", stringify!($evaluate)));
        }
    };
    ($evaluate:expr, $($message:tt)+) => {
        if $crate::enabled() && !($evaluate) {
            $crate::fail(format_args!($($message)+));
        }
    };
}

/// Panics through [`fail`] when assertions are enabled, otherwise logs the
/// message at error level and lets the caller continue.
#[macro_export]
macro_rules! die_or_error {
    ($($message:tt)+) => {
        if $crate::enabled() {
            $crate::fail(format_args!($($message)+));
        } else {
            $crate::log::error!($($message)+);
        }
    };
}
