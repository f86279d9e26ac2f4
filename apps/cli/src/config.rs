//! Environment configuration.

use std::str::FromStr;

use bookdeck_core::{
    dedup::DEFAULT_SIMILARITY_THRESHOLD,
    estimate::{DEFAULT_INPUT_PRICE_PER_1M, DEFAULT_OUTPUT_PRICE_PER_1M},
    Density, KeepStrategy,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings read from `BOOKDECK_*` variables. Command-line flags take
/// precedence over these.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub density: Density,
    pub similarity_threshold: f64,
    pub keep_strategy: KeepStrategy,
    pub input_price_per_1m: f64,
    pub output_price_per_1m: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            density: Density::default(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            keep_strategy: KeepStrategy::default(),
            input_price_per_1m: DEFAULT_INPUT_PRICE_PER_1M,
            output_price_per_1m: DEFAULT_OUTPUT_PRICE_PER_1M,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let similarity_threshold = read(&lookup, "BOOKDECK_SIMILARITY_THRESHOLD", defaults.similarity_threshold)?;
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(ConfigError::Invalid {
                var: "BOOKDECK_SIMILARITY_THRESHOLD",
                value: similarity_threshold.to_string(),
                reason: "must be between 0 and 1".to_string(),
            });
        }

        Ok(Self {
            density: read(&lookup, "BOOKDECK_DENSITY", defaults.density)?,
            similarity_threshold,
            keep_strategy: read(&lookup, "BOOKDECK_KEEP_STRATEGY", defaults.keep_strategy)?,
            input_price_per_1m: read(&lookup, "BOOKDECK_INPUT_PRICE_PER_1M", defaults.input_price_per_1m)?,
            output_price_per_1m: read(&lookup, "BOOKDECK_OUTPUT_PRICE_PER_1M", defaults.output_price_per_1m)?,
        })
    }
}

fn read<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                value: value.clone(),
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}
