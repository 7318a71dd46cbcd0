use crate::check::CheckRegistry;
use crate::measurement::Measurement;
use crate::transaction::{TransactionData, TRANSACTION_HOOK};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use loadpulse_core::{ScenarioConfig, PROGRESS_INTERVAL};
use metrics_util::AtomicBucket;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{error, info, trace, warn};

/// Counters shared by every virtual user of one run.
#[derive(Default)]
pub(crate) struct TaskAtomics {
    pub success: AtomicU64,
    pub error: AtomicU64,
    pub iterations: AtomicU64,
    pub latency: AtomicBucket<Duration>,
    pub checks: CheckRegistry,
}

impl TaskAtomics {
    pub fn requests(&self) -> u64 {
        self.success.load(Ordering::Relaxed) + self.error.load(Ordering::Relaxed)
    }
}

pub(crate) struct Runner<T> {
    scenario: T,
    tasks: Vec<JoinHandle<()>>,
    atomics: Arc<TaskAtomics>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    budget: Option<Arc<AtomicU64>>,
}

impl<T, F> Runner<T>
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send,
{
    pub fn new(scenario: T, config: &ScenarioConfig) -> Self {
        Self {
            scenario,
            tasks: vec![],
            atomics: Arc::new(TaskAtomics::default()),
            limiter: config.max_rps.map(|rps| Arc::new(rate_limiter(rps))),
            budget: config.iterations.map(|n| Arc::new(AtomicU64::new(n))),
        }
    }

    /// Spawn one task per virtual user. Each loops the scenario until `deadline` passes or the
    /// shared iteration budget runs out.
    pub fn spawn_vus(&mut self, vus: usize, deadline: Option<Instant>) {
        while self.tasks.len() < vus {
            let vu = self.tasks.len() + 1;
            let scenario = self.scenario.clone();
            let atomics = self.atomics.clone();
            let budget = self.budget.clone();
            let transaction_data = TransactionData {
                limiter: self.limiter.clone(),
                atomics: self.atomics.clone(),
            };

            self.tasks.push(tokio::spawn(TRANSACTION_HOOK.scope(
                transaction_data,
                async move {
                    trace!(vu, "Virtual user started");
                    loop {
                        if deadline.is_some_and(|d| Instant::now() >= d) {
                            break;
                        }

                        if let Some(budget) = &budget {
                            let claimed = budget
                                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                                    n.checked_sub(1)
                                })
                                .is_ok();
                            if !claimed {
                                break;
                            }
                        }

                        scenario().await;
                        atomics.iterations.fetch_add(1, Ordering::Relaxed);
                    }
                    trace!(vu, "Virtual user finished");
                },
            )));
        }
    }

    /// Log progress until the deadline passes.
    pub async fn wait_for_deadline(&self, start: Instant, deadline: Instant) {
        let mut next_report = start + PROGRESS_INTERVAL;
        while next_report < deadline {
            sleep_until(next_report).await;
            info!(
                elapsed = %humantime::format_duration(Duration::from_secs(start.elapsed().as_secs())),
                iterations = self.atomics.iterations.load(Ordering::Relaxed),
                requests = self.atomics.requests(),
                "Running"
            );
            next_report += PROGRESS_INTERVAL;
        }
        sleep_until(deadline).await;
    }

    /// Wait for every VU to finish its current iteration. Whatever is still running at
    /// `hard_stop` gets aborted; returns how many VUs were cut short.
    pub async fn shutdown(self, hard_stop: Option<Instant>) -> (Arc<TaskAtomics>, u64) {
        let mut interrupted = 0;
        for mut handle in self.tasks {
            let joined = match hard_stop {
                Some(at) => timeout_at(at, &mut handle).await.ok(),
                None => Some((&mut handle).await),
            };

            match joined {
                Some(Ok(())) => {}
                Some(Err(err)) if err.is_panic() => error!("Virtual user panicked: {err}"),
                Some(Err(_)) => {}
                None => {
                    handle.abort();
                    interrupted += 1;
                }
            }
        }

        if interrupted > 0 {
            warn!("{interrupted} virtual users did not finish within the graceful stop window");
        }

        (self.atomics, interrupted)
    }
}

/// Collect everything the VUs recorded into a single measurement.
pub(crate) fn collect(atomics: &TaskAtomics, elapsed: Duration) -> Measurement {
    let mut measurement = Measurement::new(
        atomics.success.load(Ordering::Relaxed),
        atomics.error.load(Ordering::Relaxed),
        atomics.iterations.load(Ordering::Relaxed),
        elapsed,
    );
    atomics
        .latency
        .clear_with(|dur| measurement.populate_latencies(dur));
    measurement
}

fn rate_limiter(rps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(rps))
}
