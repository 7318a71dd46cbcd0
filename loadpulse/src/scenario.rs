//! Scenario logic and constants
use crate::runner::{collect, Runner};
use loadpulse_core::{ConfigError, RunStatistics, ScenarioConfig, Threshold};
use std::{
    future::Future,
    num::NonZeroU32,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

type RunnerFuture = Pin<Box<dyn Future<Output = Result<RunStatistics, ConfigError>> + Send>>;

/// Load test scenario structure
///
/// Handler for running scenarios. Usually created through the [`#[scenario]`](loadpulse_macros::scenario)
/// macro; closures that capture their own state can use [`Scenario::new`] directly.
#[pin_project::pin_project]
pub struct Scenario<T> {
    func: T,
    runner_fut: Option<RunnerFuture>,
    config: ScenarioConfig,
}

impl<T> Scenario<T> {
    pub fn new(name: &str, func: T) -> Self {
        Self {
            func,
            runner_fut: None,
            config: ScenarioConfig::new(name),
        }
    }
}

impl<T, F> Future for Scenario<T>
where
    T: Fn() -> F + Send + 'static + Clone + Sync,
    F: Future<Output = ()> + Send,
{
    type Output = Result<RunStatistics, ConfigError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.runner_fut.is_none() {
            let func = self.func.clone();
            let config = self.config.clone();
            self.runner_fut = Some(Box::pin(async move {
                config.validate()?;
                Ok(run_scenario(func, config).await)
            }));
        }

        match &mut self.runner_fut {
            Some(runner) => runner.as_mut().poll(cx),
            None => unreachable!(),
        }
    }
}

pub trait ConfigurableScenario:
    Future<Output = Result<RunStatistics, ConfigError>> + Sized + Send
{
    fn vus(self, vus: usize) -> Self;
    fn duration(self, duration: Duration) -> Self;
    fn iterations(self, iterations: u64) -> Self;
    fn graceful_stop(self, graceful_stop: Duration) -> Self;
    fn rps(self, rps: NonZeroU32) -> Self;
    fn threshold(self, threshold: Threshold) -> Self;
    fn config(self, config: ScenarioConfig) -> Self;
}

impl<T, F> ConfigurableScenario for Scenario<T>
where
    T: Fn() -> F + Send + 'static + Clone + Sync,
    F: Future<Output = ()> + Send,
{
    /// Number of virtual users running the scenario concurrently.
    ///
    /// # Example
    /// ```no_run
    /// use loadpulse::prelude::*;
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     my_scenario()
    ///         .vus(20)
    ///         .duration(Duration::from_secs(30))
    ///         .await
    ///         .unwrap();
    /// }
    ///
    /// #[scenario]
    /// async fn my_scenario() {
    /// }
    /// ```
    fn vus(mut self, vus: usize) -> Self {
        self.config.vus = vus;
        self
    }

    /// Stop starting new iterations once the duration has passed.
    ///
    /// NOTE: Must supply either `.duration()` or `.iterations()`
    fn duration(mut self, duration: Duration) -> Self {
        self.config.duration = Some(duration);
        self
    }

    /// Total number of iterations, shared between all virtual users.
    ///
    /// # Example
    /// ```no_run
    /// use loadpulse::prelude::*;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let stats = my_scenario().vus(4).iterations(100).await.unwrap();
    ///     assert_eq!(stats.iterations, 100);
    /// }
    ///
    /// #[scenario]
    /// async fn my_scenario() {
    /// }
    /// ```
    fn iterations(mut self, iterations: u64) -> Self {
        self.config.iterations = Some(iterations);
        self
    }

    /// How long in-flight iterations may keep running after the duration is over before they are
    /// aborted. Defaults to 30 seconds.
    fn graceful_stop(mut self, graceful_stop: Duration) -> Self {
        self.config.graceful_stop = graceful_stop;
        self
    }

    /// Cap the number of transactions per second across all virtual users.
    fn rps(mut self, rps: NonZeroU32) -> Self {
        self.config.max_rps = Some(rps);
        self
    }

    /// Add a threshold which is evaluated at the end of the run.
    ///
    /// # Example
    /// ```no_run
    /// use loadpulse::prelude::*;
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let stats = my_scenario()
    ///         .duration(Duration::from_secs(30))
    ///         .threshold("http_req_duration: p(95)<400".parse().unwrap())
    ///         .await
    ///         .unwrap();
    ///
    ///     if !stats.passed() {
    ///         std::process::exit(99);
    ///     }
    /// }
    ///
    /// #[scenario]
    /// async fn my_scenario() {
    /// }
    /// ```
    fn threshold(mut self, threshold: Threshold) -> Self {
        self.config.thresholds.push(threshold);
        self
    }

    /// Replace the whole configuration. The scenario keeps its name.
    fn config(mut self, config: ScenarioConfig) -> Self {
        self.config = ScenarioConfig {
            name: self.config.name,
            ..config
        };
        self
    }
}

#[instrument(name = "scenario", skip_all, fields(name = %config.name))]
pub(crate) async fn run_scenario<T, F>(scenario: T, config: ScenarioConfig) -> RunStatistics
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send,
{
    info!("Running {} with config {:?}", config.name, &config);

    let start = Instant::now();
    let deadline = config.duration.map(|d| start + d);

    let mut runner = Runner::new(scenario, &config);
    runner.spawn_vus(config.vus, deadline);

    if let Some(deadline) = deadline {
        runner.wait_for_deadline(start, deadline).await;
        debug!(
            "Duration reached, waiting up to {} for iterations to finish",
            humantime::format_duration(config.graceful_stop)
        );
    }

    let hard_stop = deadline.map(|d| d + config.graceful_stop);
    let (atomics, interrupted) = runner.shutdown(hard_stop).await;

    let measurement = collect(&atomics, start.elapsed());
    let stats = measurement.into_statistics(&config, atomics.checks.summarize(), interrupted);

    for result in stats.thresholds.iter().filter(|t| !t.passed) {
        warn!(
            "Threshold crossed: {} (observed {:.4})",
            result.threshold, result.observed
        );
    }

    info!("Scenario complete");
    stats
}
