mod utils;
use utils::*;

use mock_service::{MockConfig, MockServer};
use reqwest::{header, Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

async fn start() -> anyhow::Result<(MockServer, Client)> {
    init();
    Ok((MockServer::start(MockConfig::default()).await?, Client::new()))
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn adjust_never_goes_negative() -> anyhow::Result<()> {
    let (server, client) = start().await?;
    let url = format!("{}/api/commands/inventory/adjust", server.base_url());

    let res = client
        .post(&url)
        .json(&json!({"storeId": "A", "sku": "SKU1", "delta": -2}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::ETAG], "\"1\"");

    let record: Value = res.json().await?;
    assert_eq!(record["quantity"], 0);
    assert_eq!(record["version"], 1);
    let updated_at = record["updatedAt"].as_str().unwrap();
    assert!(updated_at.contains('T') && updated_at.ends_with('Z'), "{updated_at}");
    Ok(())
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn conditional_write_with_stale_version_is_rejected() -> anyhow::Result<()> {
    let (server, client) = start().await?;
    let base = server.base_url();

    let res = client
        .post(format!("{base}/api/commands/inventory/replace"))
        .json(&json!({"storeId": "S2", "sku": "VAL-2", "quantity": 1}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let adjust = || {
        client
            .post(format!("{base}/api/commands/inventory/adjust"))
            .json(&json!({"storeId": "S2", "sku": "VAL-2", "delta": 1}))
    };

    let res = adjust().header(header::IF_MATCH, "\"999\"").send().await?;
    assert_eq!(res.status(), StatusCode::PRECONDITION_FAILED);

    let res = adjust().header(header::IF_MATCH, "\"1\"").send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::ETAG], "\"2\"");
    Ok(())
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn negative_replace_is_bad_request() -> anyhow::Result<()> {
    let (server, client) = start().await?;

    let res = client
        .post(format!("{}/api/commands/inventory/replace", server.base_url()))
        .json(&json!({"storeId": "S1", "sku": "VAL-1", "quantity": -1}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn queries_converge_on_writes() -> anyhow::Result<()> {
    let (server, client) = start().await?;
    let base = server.base_url();

    for (store, quantity) in [("A", 5), ("B", 3)] {
        client
            .post(format!("{base}/api/commands/inventory/replace"))
            .json(&json!({"storeId": store, "sku": "SKU1", "quantity": quantity}))
            .send()
            .await?
            .error_for_status()?;
    }
    client
        .post(format!("{base}/api/commands/inventory/adjust"))
        .json(&json!({"storeId": "A", "sku": "SKU1", "delta": -1}))
        .send()
        .await?
        .error_for_status()?;

    let mut global = Value::Null;
    for _ in 0..100 {
        global = client
            .get(format!("{base}/api/query/inventory/global/SKU1"))
            .send()
            .await?
            .json()
            .await?;
        if global["quantity"] == 7 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(global, json!({"sku": "SKU1", "quantity": 7}));

    let store: Value = client
        .get(format!("{base}/api/query/inventory/store/A/SKU1"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(store, json!({"storeId": "A", "sku": "SKU1", "quantity": 4}));
    Ok(())
}
