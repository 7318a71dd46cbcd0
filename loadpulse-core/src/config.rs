use crate::{Threshold, DEFAULT_GRACEFUL_STOP};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

/// How a scenario is run: how many virtual users, for how long, and the thresholds the run is
/// judged against. Either `duration` or `iterations` must be set.
///
/// ```
/// use loadpulse_core::ScenarioConfig;
/// use std::time::Duration;
///
/// let config = ScenarioConfig {
///     vus: 20,
///     duration: Some(Duration::from_secs(30)),
///     ..ScenarioConfig::new("inventory")
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioConfig {
    pub name: String,
    pub vus: usize,
    pub duration: Option<Duration>,
    /// Total iterations shared by all virtual users.
    pub iterations: Option<u64>,
    pub graceful_stop: Duration,
    pub max_rps: Option<NonZeroU32>,
    pub thresholds: Vec<Threshold>,
}

impl ScenarioConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vus: 1,
            duration: None,
            iterations: None,
            graceful_stop: DEFAULT_GRACEFUL_STOP,
            max_rps: None,
            thresholds: vec![],
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vus == 0 {
            return Err(ConfigError::NoVirtualUsers);
        }

        match (self.duration, self.iterations) {
            (None, None) => return Err(ConfigError::Unbounded),
            (Some(duration), _) if duration.is_zero() => return Err(ConfigError::ZeroDuration),
            (_, Some(0)) => return Err(ConfigError::ZeroIterations),
            _ => {}
        }

        for threshold in &self.thresholds {
            threshold.validate()?;
        }

        Ok(())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("a scenario needs at least one virtual user")]
    NoVirtualUsers,

    #[error("a scenario needs a duration or an iteration count")]
    Unbounded,

    #[error("scenario duration must be greater than zero")]
    ZeroDuration,

    #[error("scenario iteration count must be greater than zero")]
    ZeroIterations,

    #[error("invalid threshold: {0}")]
    Threshold(#[from] crate::ThresholdParseError),
}
