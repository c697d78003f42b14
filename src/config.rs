//! Configuration loading
//!
//! One recognized variable: `IDLE_MINUTES`, a floating-point number of
//! minutes (default 5) converted to the idle threshold at startup.
//! There is no hot-reload.

use std::time::Duration;

const IDLE_MINUTES_VAR: &str = "IDLE_MINUTES";
const DEFAULT_IDLE_MINUTES: f64 = 5.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IDLE_MINUTES is not a number: {0:?}")]
    Parse(String),

    #[error("IDLE_MINUTES must be a positive number of minutes, got {0}")]
    OutOfRange(f64),
}

/// Immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Allowed idleness before muting, in minutes, as configured.
    pub idle_minutes: f64,
    /// The same threshold as a duration.
    pub idle_threshold: Duration,
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_minutes(std::env::var(IDLE_MINUTES_VAR).ok().as_deref())
    }

    fn from_minutes(raw: Option<&str>) -> Result<Self, ConfigError> {
        let idle_minutes = match raw {
            Some(value) => value
                .trim()
                .parse::<f64>()
                .map_err(|_| ConfigError::Parse(value.to_string()))?,
            None => DEFAULT_IDLE_MINUTES,
        };
        if !idle_minutes.is_finite() || idle_minutes <= 0.0 {
            return Err(ConfigError::OutOfRange(idle_minutes));
        }

        Ok(Self {
            idle_minutes,
            idle_threshold: Duration::from_secs_f64(idle_minutes * 60.0),
        })
    }
}
