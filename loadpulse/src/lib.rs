#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

// Lets the proc macros refer to `::loadpulse` from inside this crate's own tests.
extern crate self as loadpulse;

pub mod check;
pub mod scenario;
#[doc(hidden)]
pub mod transaction;

pub(crate) mod measurement;
pub(crate) mod runner;

pub use check::check;
pub use loadpulse_core as core;
pub use loadpulse_core::{
    ConfigError, RunStatistics, ScenarioConfig, Threshold, ThresholdParseError,
    TransactionOutcome,
};
pub use loadpulse_macros::{scenario, transaction};
pub use scenario::Scenario;

pub mod prelude {
    pub use crate::check::check;
    pub use crate::scenario::{ConfigurableScenario, Scenario};
    pub use loadpulse_core::{RunStatistics, Threshold, TransactionOutcome};
    pub use loadpulse_macros::{scenario, transaction};
}
