use crate::runner::TaskAtomics;
use governor::DefaultDirectRateLimiter;
use loadpulse_core::{TransactionLabels, TransactionOutcome};
use std::future::Future;
use std::sync::{atomic::Ordering, Arc};
use std::time::Instant;

/// Transaction hook used by the `#[transaction]` macro. Not intended to be used manually.
pub async fn transaction_hook<T, R, E>(labels: TransactionLabels, func: T) -> T::Output
where
    T: Future<Output = Result<R, E>>,
    R: TransactionOutcome,
{
    if let Ok(hook) = TRANSACTION_HOOK.try_with(|v| v.clone()) {
        if let Some(limiter) = &hook.limiter {
            limiter.until_ready().await;
        }

        let start = Instant::now();
        let res = func.await;
        let elapsed = start.elapsed();

        hook.atomics.latency.push(elapsed);

        #[cfg(feature = "metrics")]
        metrics::histogram!(labels.latency).record(elapsed.as_secs_f64());

        if res.is_failure() {
            hook.atomics.error.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "metrics")]
            metrics::counter!(labels.error).increment(1);
        } else {
            hook.atomics.success.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "metrics")]
            metrics::counter!(labels.success).increment(1);
        }

        res
    } else {
        tracing::warn!(transaction = labels.latency, "No hook available.");
        func.await
    }
}

#[derive(Clone)]
pub(crate) struct TransactionData {
    pub limiter: Option<Arc<DefaultDirectRateLimiter>>,
    pub atomics: Arc<TaskAtomics>,
}

tokio::task_local! {
    pub(crate) static TRANSACTION_HOOK: TransactionData;
}
