//! Named boolean assertions recorded for the end-of-run summary.
use crate::transaction::TRANSACTION_HOOK;
use loadpulse_core::CheckSummary;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, PoisonError, RwLock,
};

/// Record the outcome of a named check and hand the value back.
///
/// A failed check never aborts the iteration; it only shows up in the check statistics (and in a
/// `checks` threshold, if one is configured). Outside of a running scenario the result is only
/// logged.
///
/// # Example
/// ```ignore
/// let res = my_transaction().await;
/// check("status is 200", matches!(res, Ok(s) if s == 200));
/// ```
pub fn check(name: &str, passed: bool) -> bool {
    if TRANSACTION_HOOK
        .try_with(|hook| hook.atomics.checks.record(name, passed))
        .is_err()
    {
        tracing::warn!(check = name, passed, "No hook available.");
    }

    #[cfg(feature = "metrics")]
    metrics::counter!(
        loadpulse_core::METRIC_CHECKS,
        "check" => name.to_string(),
        "result" => if passed { "pass" } else { "fail" }
    )
    .increment(1);

    passed
}

#[derive(Debug)]
struct CheckCounter {
    name: String,
    passes: AtomicU64,
    fails: AtomicU64,
}

/// Per-check counters, kept in the order the checks were first seen.
#[derive(Debug, Default)]
pub(crate) struct CheckRegistry {
    counters: RwLock<Vec<Arc<CheckCounter>>>,
}

impl CheckRegistry {
    pub fn record(&self, name: &str, passed: bool) {
        let counter = self.counter(name);
        if passed {
            counter.passes.fetch_add(1, Ordering::Relaxed);
        } else {
            counter.fails.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn summarize(&self) -> Vec<CheckSummary> {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| CheckSummary {
                name: c.name.clone(),
                passes: c.passes.load(Ordering::Relaxed),
                fails: c.fails.load(Ordering::Relaxed),
            })
            .collect()
    }

    fn counter(&self, name: &str) -> Arc<CheckCounter> {
        {
            let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(counter) = counters.iter().find(|c| c.name == name) {
                return counter.clone();
            }
        }

        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        // Another VU may have registered it between the two locks.
        if let Some(counter) = counters.iter().find(|c| c.name == name) {
            return counter.clone();
        }

        let counter = Arc::new(CheckCounter {
            name: name.to_string(),
            passes: AtomicU64::new(0),
            fails: AtomicU64::new(0),
        });
        counters.push(counter.clone());
        counter
    }
}
