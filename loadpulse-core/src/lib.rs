mod config;
mod constants;
mod metrics;
mod stats;
mod threshold;
mod transaction;

pub use config::*;
pub use constants::*;
pub use metrics::*;
pub use stats::*;
pub use threshold::*;
pub use transaction::*;
