use crate::{Aggregation, Threshold};
use serde::Serialize;
use serde_with::{serde_as, DurationMilliSecondsWithFrac};
use std::fmt;
use std::time::Duration;

/// Run Statistics for a given Scenario
///
/// Everything the end-of-test summary shows, plus the outcome of each threshold.
#[serde_as]
#[derive(Clone, Debug, Serialize)]
pub struct RunStatistics {
    pub name: String,
    pub vus: usize,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub elapsed: Duration,
    pub iterations: u64,
    /// Iterations cut short once the graceful stop window ran out.
    pub interrupted: u64,
    pub requests: u64,
    pub failed_requests: u64,
    pub error_rate: f64,
    pub rps: f64,
    pub latency: LatencySummary,
    pub checks: Vec<CheckSummary>,
    pub thresholds: Vec<ThresholdResult>,
}

impl RunStatistics {
    /// True when every threshold held.
    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }

    pub fn check(&self, name: &str) -> Option<&CheckSummary> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn check_passes(&self) -> u64 {
        self.checks.iter().map(|c| c.passes).sum()
    }

    pub fn check_fails(&self) -> u64 {
        self.checks.iter().map(|c| c.fails).sum()
    }

    pub fn check_rate(&self) -> f64 {
        rate(self.check_passes(), self.check_passes() + self.check_fails())
    }
}

#[serde_as]
#[derive(Clone, Debug, Default, Serialize)]
pub struct LatencySummary {
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub avg: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub min: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub med: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub max: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub p90: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub p95: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub p99: Duration,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckSummary {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

impl CheckSummary {
    pub fn pass_rate(&self) -> f64 {
        rate(self.passes, self.passes + self.fails)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThresholdResult {
    pub threshold: Threshold,
    pub observed: f64,
    pub passed: bool,
}

fn rate(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.
    } else {
        part as f64 / total as f64
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1e3
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.elapsed.as_secs_f64().max(f64::EPSILON);

        writeln!(
            f,
            "scenario {}: {} VUs, {:.2?}",
            self.name, self.vus, self.elapsed
        )?;

        for check in &self.checks {
            let mark = if check.fails == 0 { '✓' } else { '✗' };
            writeln!(f, "  {mark} {}", check.name)?;
            if check.fails > 0 {
                writeln!(
                    f,
                    "    ↳ {:.0}% ✓ {} / ✗ {}",
                    check.pass_rate() * 100.,
                    check.passes,
                    check.fails
                )?;
            }
        }

        writeln!(
            f,
            "  checks............: {:.2}% ✓ {} ✗ {}",
            self.check_rate() * 100.,
            self.check_passes(),
            self.check_fails()
        )?;

        let l = &self.latency;
        writeln!(
            f,
            "  http_req_duration.: avg={:.2?} min={:.2?} med={:.2?} max={:.2?} p(90)={:.2?} p(95)={:.2?} p(99)={:.2?}",
            l.avg, l.min, l.med, l.max, l.p90, l.p95, l.p99
        )?;
        writeln!(
            f,
            "  http_req_failed...: {:.2}% ✓ {} ✗ {}",
            self.error_rate * 100.,
            self.failed_requests,
            self.requests.saturating_sub(self.failed_requests)
        )?;
        writeln!(
            f,
            "  http_reqs.........: {} {:.2}/s",
            self.requests, self.rps
        )?;
        write!(
            f,
            "  iterations........: {} {:.2}/s",
            self.iterations,
            self.iterations as f64 / secs
        )?;
        if self.interrupted > 0 {
            write!(f, " ({} interrupted)", self.interrupted)?;
        }

        for result in &self.thresholds {
            let mark = if result.passed { '✓' } else { '✗' };
            write!(f, "\n  {mark} {} (observed {:.4})", result.threshold, result.observed)?;
        }

        Ok(())
    }
}

impl LatencySummary {
    /// Value in milliseconds for one of the fixed aggregations. Arbitrary percentiles need the full
    /// distribution and return `None`.
    pub fn millis(&self, aggregation: Aggregation) -> Option<f64> {
        let value = match aggregation {
            Aggregation::Avg => self.avg,
            Aggregation::Min => self.min,
            Aggregation::Med => self.med,
            Aggregation::Max => self.max,
            Aggregation::Percentile(p) if p == 50. => self.med,
            Aggregation::Percentile(p) if p == 90. => self.p90,
            Aggregation::Percentile(p) if p == 95. => self.p95,
            Aggregation::Percentile(p) if p == 99. => self.p99,
            _ => return None,
        };
        Some(ms(value))
    }
}
