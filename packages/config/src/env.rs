//! Environment variable lookups with typed defaults.

use std::{collections::HashMap, str::FromStr};

use crate::ConfigError;

/// Where configuration variables come from.
pub trait EnvSource {
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl<S: std::hash::BuildHasher> EnvSource for HashMap<&str, &str, S> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).map(ToString::to_string)
    }
}

impl<S: std::hash::BuildHasher> EnvSource for HashMap<String, String, S> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Parses `name` if it is set, otherwise returns `None`.
///
/// Empty values count as unset.
///
/// # Errors
///
/// * If the variable is set but does not parse as `T`
pub fn option_env<T: FromStr>(env: &impl EnvSource, name: &str) -> Result<Option<T>, ConfigError> {
    match env.var(name) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                name: name.to_string(),
                value,
            }),
        _ => Ok(None),
    }
}

/// Parses `name` if it is set, otherwise returns `default`.
///
/// # Errors
///
/// * If the variable is set but does not parse as `T`
pub fn default_env<T: FromStr>(env: &impl EnvSource, name: &str, default: T) -> Result<T, ConfigError> {
    let value = option_env(env, name)?;
    if value.is_some() {
        log::debug!("default_env: using {name} from environment");
    }
    Ok(value.unwrap_or(default))
}
