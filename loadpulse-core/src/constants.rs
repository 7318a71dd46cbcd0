use std::time::Duration;

/// Time in-flight iterations get to finish once the run duration is over.
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

/// Interval between progress reports while a scenario is running.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

pub const METRIC_HTTP_REQ_FAILED: &str = "http_req_failed";
pub const METRIC_HTTP_REQ_DURATION: &str = "http_req_duration";
pub const METRIC_CHECKS: &str = "checks";
