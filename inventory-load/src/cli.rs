use crate::config::{
    scenario_config, Target, TargetError, DEFAULT_BASE_URL, DEFAULT_DURATION, DEFAULT_VUS,
};
use clap::Parser;
use loadpulse::{ScenarioConfig, ThresholdParseError};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LOG_FILTER: &str = "inventory_load=info,loadpulse=info";

#[derive(Parser, Debug)]
#[command(version, about = "Drive adjust/query traffic against the inventory service")]
pub struct Args {
    /// Base URL of the inventory service
    #[arg(long, env = "BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Number of concurrent virtual users
    #[arg(long, default_value_t = DEFAULT_VUS)]
    pub vus: usize,

    /// How long to run, e.g. `30s` or `2m`
    #[arg(long, default_value_t = DEFAULT_DURATION.into())]
    pub duration: humantime::Duration,

    /// Write the end-of-test summary as JSON to this file
    #[arg(long)]
    pub summary_export: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is not set
    #[arg(long, default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,
}

impl Args {
    /// A blank base URL (e.g. `BASE_URL=`) falls back to the default target.
    pub fn target(&self) -> Result<Target, TargetError> {
        match self.base_url.trim() {
            "" => Ok(Target::default()),
            base_url => Target::new(base_url),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration.into()
    }

    pub fn scenario_config(&self) -> Result<ScenarioConfig, ThresholdParseError> {
        scenario_config(self.vus, self.duration())
    }
}
