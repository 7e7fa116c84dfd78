use std::{str::FromStr, time::Duration};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// An inclusive range of delays, in milliseconds, sampled uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    /// No delay at all. Actors still yield at the point the delay would be.
    pub const ZERO: Self = Self::millis(0, 0);

    #[must_use]
    pub const fn millis(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.max_ms == 0
    }

    /// # Errors
    ///
    /// * If `min_ms` is greater than `max_ms`
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.min_ms > self.max_ms {
            return Err(ConfigError::invalid(format!(
                "{name} delay minimum {}ms is greater than maximum {}ms",
                self.min_ms, self.max_ms
            )));
        }
        Ok(())
    }

    /// Picks a delay from the range. An inverted range is treated as its
    /// maximum.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min_ms >= self.max_ms {
            return Duration::from_millis(self.max_ms);
        }
        Duration::from_millis(rng.random_range(self.min_ms..=self.max_ms))
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self::ZERO
    }
}

impl std::fmt::Display for DelayRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.min_ms, self.max_ms)
    }
}

impl FromStr for DelayRange {
    type Err = ConfigError;

    /// Accepts `MIN..=MAX`, `MIN-MAX` or a single value, all inclusive.
    ///
    /// `MIN..MAX` is rejected since it reads as exclusive of `MAX`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidDelayRange(s.to_string());
        let trimmed = s.trim();

        let (min, max) = if let Some((min, max)) = trimmed.split_once("..=") {
            (min, max)
        } else if trimmed.contains("..") {
            return Err(invalid());
        } else if let Some((min, max)) = trimmed.split_once('-') {
            (min, max)
        } else {
            (trimmed, trimmed)
        };

        let min = min.trim().parse::<u64>().map_err(|_| invalid())?;
        let max = max.trim().parse::<u64>().map_err(|_| invalid())?;

        if min > max {
            return Err(invalid());
        }

        Ok(Self::millis(min, max))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rand::{SeedableRng as _, rngs::StdRng};

    use super::*;

    #[test_log::test]
    fn parses_supported_forms() {
        assert_eq!("200..=700".parse::<DelayRange>(), Ok(DelayRange::millis(200, 700)));
        assert_eq!(" 54-133 ".parse::<DelayRange>(), Ok(DelayRange::millis(54, 133)));
        assert_eq!("0".parse::<DelayRange>(), Ok(DelayRange::ZERO));
    }

    #[test_log::test]
    fn rejects_garbage_and_inverted_ranges() {
        assert_eq!(
            "fast".parse::<DelayRange>(),
            Err(ConfigError::InvalidDelayRange("fast".to_string()))
        );
        assert!("700..=200".parse::<DelayRange>().is_err());
        assert!("..200".parse::<DelayRange>().is_err());
    }

    #[test_log::test]
    fn half_open_form_is_rejected() {
        assert_eq!(
            "200..700".parse::<DelayRange>(),
            Err(ConfigError::InvalidDelayRange("200..700".to_string()))
        );
    }

    #[test_log::test]
    fn display_uses_the_inclusive_form_it_parses() {
        let range = DelayRange::millis(200, 700);

        assert_eq!(range.to_string(), "200..=700");
        assert_eq!(range.to_string().parse::<DelayRange>(), Ok(range));
    }

    #[test_log::test]
    fn samples_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let range = DelayRange::millis(300, 900);

        for _ in 0..1000 {
            let delay = range.sample(&mut rng);
            assert!(delay >= Duration::from_millis(300));
            assert!(delay <= Duration::from_millis(900));
        }
    }

    #[test_log::test]
    fn zero_range_samples_zero() {
        let mut rng = StdRng::seed_from_u64(7);

        assert!(DelayRange::ZERO.is_zero());
        assert_eq!(DelayRange::ZERO.sample(&mut rng), Duration::ZERO);
    }

    #[test_log::test]
    fn validate_names_the_offending_range() {
        let err = DelayRange::millis(5, 1).validate("think").unwrap_err();

        assert_eq!(
            err.to_string(),
            "Invalid configuration: think delay minimum 5ms is greater than maximum 1ms"
        );
    }
}
