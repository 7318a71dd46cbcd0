use loadpulse::{ScenarioConfig, Threshold, ThresholdParseError};
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

pub const SCENARIO_NAME: &str = "inventory";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const SKU: &str = "SKU1";
pub const STORES: [&str; 4] = ["A", "B", "C", "D"];
pub const MIN_DELTA: i32 = -2;
pub const MAX_DELTA: i32 = 2;

pub const DEFAULT_VUS: usize = 20;
pub const DEFAULT_DURATION: Duration = Duration::from_secs(30);

/// Pause between the adjust command and the global query, giving the projection time to catch up.
pub const DELIVERY_PAUSE: Duration = Duration::from_millis(50);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub const THRESHOLDS: [&str; 2] = [
    "http_req_failed: rate<0.01",
    "http_req_duration: p(95)<400",
];

/// Exit code when the run completed but a threshold was crossed.
pub const THRESHOLDS_FAILED_EXIT_CODE: u8 = 99;

/// The system under test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    base_url: String,
}

impl Target {
    pub fn new(base_url: &str) -> Result<Self, TargetError> {
        let parsed = Url::parse(base_url).map_err(|err| TargetError::InvalidUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TargetError::UnsupportedScheme(parsed.scheme().to_string()));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn adjust_url(&self) -> String {
        format!("{}/api/commands/inventory/adjust", self.base_url)
    }

    pub fn global_url(&self, sku: &str) -> String {
        format!("{}/api/query/inventory/global/{sku}", self.base_url)
    }
}

impl Default for Target {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TargetError {
    #[error("invalid base URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported URL scheme `{0}`, expected http or https")]
    UnsupportedScheme(String),
}

pub fn thresholds() -> Result<Vec<Threshold>, ThresholdParseError> {
    THRESHOLDS.iter().map(|t| t.parse()).collect()
}

pub fn scenario_config(vus: usize, duration: Duration) -> Result<ScenarioConfig, ThresholdParseError> {
    Ok(ScenarioConfig {
        vus,
        duration: Some(duration),
        thresholds: thresholds()?,
        ..ScenarioConfig::new(SCENARIO_NAME)
    })
}
