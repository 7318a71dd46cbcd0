mod utils;
use utils::*;

use inventory_load::config::{scenario_config, SKU, STORES};
use inventory_load::driver::{ADJUST_CHECK, GLOBAL_CHECK};
use loadpulse::core::Metric;
use loadpulse::prelude::*;
use mock_service::{MockConfig, StatusCode};
use std::time::Duration;

#[tokio::test]
#[ntest::timeout(30_000)]
async fn healthy_backend_passes_every_check() -> anyhow::Result<()> {
    let (_server, driver) = backend(MockConfig::default()).await?;

    let stats = driver
        .scenario()
        .config(scenario_config(4, Duration::from_secs(1))?)
        .await?;

    assert!(stats.iterations > 0);
    assert_eq!(stats.requests, stats.iterations * 2);
    assert_eq!(stats.failed_requests, 0);
    assert_eq!(stats.check(ADJUST_CHECK).unwrap().fails, 0);
    assert_eq!(stats.check(GLOBAL_CHECK).unwrap().fails, 0);
    assert_eq!(stats.check(ADJUST_CHECK).unwrap().passes, stats.iterations);
    assert!(stats.passed(), "{stats}");
    Ok(())
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn failing_adjust_only_fails_adjust_check() -> anyhow::Result<()> {
    let (_server, driver) = backend(MockConfig {
        adjust_status: Some(StatusCode::INTERNAL_SERVER_ERROR),
        ..Default::default()
    })
    .await?;

    let stats = driver
        .scenario()
        .config(scenario_config(2, Duration::from_secs(1))?)
        .await?;

    let adjust = stats.check(ADJUST_CHECK).unwrap();
    let global = stats.check(GLOBAL_CHECK).unwrap();
    assert_eq!(adjust.passes, 0);
    assert_eq!(adjust.fails, stats.iterations);
    assert_eq!(global.fails, 0);

    // Every 5xx adjust is a failed request, queries are not.
    assert_eq!(stats.failed_requests, stats.iterations);
    assert!((stats.error_rate - 0.5).abs() < f64::EPSILON);

    let failed_rate = stats
        .thresholds
        .iter()
        .find(|t| t.threshold.metric == Metric::HttpReqFailed)
        .unwrap();
    assert!(!failed_rate.passed);
    assert!(!stats.passed());
    Ok(())
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn failing_query_only_fails_global_check() -> anyhow::Result<()> {
    let (_server, driver) = backend(MockConfig {
        query_status: Some(StatusCode::SERVICE_UNAVAILABLE),
        ..Default::default()
    })
    .await?;

    let stats = driver.scenario().vus(2).iterations(10).await?;

    assert_eq!(stats.iterations, 10);
    assert_eq!(stats.check(ADJUST_CHECK).unwrap().passes, 10);
    assert_eq!(stats.check(GLOBAL_CHECK).unwrap().fails, 10);
    assert_eq!(stats.failed_requests, 10);
    Ok(())
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn iterations_adjust_then_query_after_pause() -> anyhow::Result<()> {
    let (server, driver) = backend(MockConfig::default()).await?;

    let stats = driver.scenario().vus(1).iterations(5).await?;
    assert_eq!(stats.iterations, 5);

    let requests = server.requests();
    assert_eq!(requests.len(), 10);

    for pair in requests.chunks(2) {
        let (adjust, query) = (&pair[0], &pair[1]);

        assert_eq!(adjust.method.as_str(), "POST");
        assert_eq!(adjust.path, "/api/commands/inventory/adjust");
        let body: serde_json::Value = serde_json::from_slice(&adjust.body)?;
        assert_eq!(body["sku"], SKU);
        let store = body["storeId"].as_str().unwrap();
        assert!(STORES.iter().any(|s| *s == store), "unknown store {store}");
        assert!((-2..=2).contains(&body["delta"].as_i64().unwrap()));

        assert_eq!(query.method.as_str(), "GET");
        assert_eq!(query.path, "/api/query/inventory/global/SKU1");
        assert!(query.received_at - adjust.received_at >= Duration::from_millis(50));
    }
    Ok(())
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn slow_backend_crosses_latency_threshold() -> anyhow::Result<()> {
    let (_server, driver) = backend(MockConfig {
        delay: Duration::from_millis(450),
        ..Default::default()
    })
    .await?;

    let stats = driver
        .scenario()
        .config(scenario_config(2, Duration::from_secs(1))?)
        .await?;

    assert_eq!(stats.failed_requests, 0);
    assert!(stats.latency.p95 >= Duration::from_millis(400));

    let duration = stats
        .thresholds
        .iter()
        .find(|t| t.threshold.metric == Metric::HttpReqDuration)
        .unwrap();
    assert!(!duration.passed);
    assert!(duration.observed >= 400.0);
    assert!(!stats.passed());
    Ok(())
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn projection_matches_store_totals_after_run() -> anyhow::Result<()> {
    let (server, driver) = backend(MockConfig::default()).await?;

    driver.scenario().vus(4).iterations(40).await?;

    let expected: i32 = STORES
        .iter()
        .filter_map(|store| server.store().get(store, SKU))
        .map(|record| record.quantity)
        .sum();

    // The projection is eventually consistent.
    for _ in 0..100 {
        if server.projection().global_quantity(SKU) == expected {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    anyhow::bail!(
        "projection stuck at {}, expected {expected}",
        server.projection().global_quantity(SKU)
    )
}
