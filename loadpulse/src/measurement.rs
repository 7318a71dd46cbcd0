use loadpulse_core::{
    Aggregation, CheckSummary, LatencySummary, Metric, RunStatistics, ScenarioConfig, Threshold,
    ThresholdResult,
};
use pdatastructs::tdigest::{TDigest, K1};
use std::time::Duration;
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub(crate) struct Measurement {
    pub success: u64,
    pub error: u64,
    pub iterations: u64,
    pub elapsed: Duration,
    latency: TDigest<K1>,
    latency_count: u64,
    latency_sum: Duration,
    latency_min: Option<Duration>,
    latency_max: Duration,
}

impl Measurement {
    pub fn new(success: u64, error: u64, iterations: u64, elapsed: Duration) -> Self {
        Self {
            success,
            error,
            iterations,
            elapsed,
            latency: default_tdigest(),
            latency_count: 0,
            latency_sum: Duration::ZERO,
            latency_min: None,
            latency_max: Duration::ZERO,
        }
    }

    pub fn populate_latencies(&mut self, dur: &[Duration]) {
        for latency in dur {
            self.latency.insert(latency.as_secs_f64());
            self.latency_count += 1;
            self.latency_sum += *latency;
            self.latency_min = Some(self.latency_min.map_or(*latency, |m| m.min(*latency)));
            self.latency_max = self.latency_max.max(*latency);
        }
    }

    pub fn requests(&self) -> u64 {
        self.success + self.error
    }

    pub fn error_rate(&self) -> f64 {
        if self.requests() == 0 {
            0.
        } else {
            self.error as f64 / self.requests() as f64
        }
    }

    pub fn tps(&self) -> f64 {
        self.requests() as f64 / self.elapsed.as_secs_f64().max(f64::EPSILON)
    }

    pub fn latency(&self, quantile: f64) -> Duration {
        if self.latency_count == 0 {
            return Duration::ZERO;
        }

        let secs = self.latency.quantile(quantile);

        // TDigest can hand back NaN for degenerate inputs.
        let secs = if secs.is_finite() {
            secs.max(0.)
        } else {
            error!("NaN latency calculation, reporting 0.");
            0.
        };

        Duration::from_secs_f64(secs)
    }

    pub fn latency_summary(&self) -> LatencySummary {
        let avg = match u32::try_from(self.latency_count) {
            Ok(0) => Duration::ZERO,
            Ok(count) => self.latency_sum / count,
            Err(_) => Duration::from_secs_f64(
                self.latency_sum.as_secs_f64() / self.latency_count as f64,
            ),
        };

        LatencySummary {
            avg,
            min: self.latency_min.unwrap_or_default(),
            med: self.latency(0.5),
            max: self.latency_max,
            p90: self.latency(0.90),
            p95: self.latency(0.95),
            p99: self.latency(0.99),
        }
    }

    /// The value a threshold is compared against. Rates are fractions, latencies milliseconds.
    pub fn observe(&self, threshold: &Threshold, checks: &[CheckSummary]) -> f64 {
        match (threshold.metric, threshold.aggregation) {
            (Metric::HttpReqFailed, _) => self.error_rate(),
            (Metric::Checks, _) => {
                let passes: u64 = checks.iter().map(|c| c.passes).sum();
                let total: u64 = checks.iter().map(|c| c.passes + c.fails).sum();
                if total == 0 {
                    0.
                } else {
                    passes as f64 / total as f64
                }
            }
            (Metric::HttpReqDuration, Aggregation::Percentile(p)) => {
                self.latency(p / 100.).as_secs_f64() * 1e3
            }
            (Metric::HttpReqDuration, aggregation) => self
                .latency_summary()
                .millis(aggregation)
                .unwrap_or_default(),
        }
    }

    pub fn into_statistics(
        self,
        config: &ScenarioConfig,
        checks: Vec<CheckSummary>,
        interrupted: u64,
    ) -> RunStatistics {
        let thresholds = config
            .thresholds
            .iter()
            .map(|threshold| {
                let observed = self.observe(threshold, &checks);
                ThresholdResult {
                    threshold: threshold.clone(),
                    observed,
                    passed: threshold.check(observed),
                }
            })
            .collect();

        RunStatistics {
            name: config.name.clone(),
            vus: config.vus,
            elapsed: self.elapsed,
            iterations: self.iterations,
            interrupted,
            requests: self.requests(),
            failed_requests: self.error,
            error_rate: self.error_rate(),
            rps: self.tps(),
            latency: self.latency_summary(),
            checks,
            thresholds,
        }
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}
