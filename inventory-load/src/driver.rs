use crate::config::{Target, DELIVERY_PAUSE, MAX_DELTA, MIN_DELTA, SCENARIO_NAME, SKU, STORES};
use loadpulse::prelude::*;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::trace;

pub const ADJUST_CHECK: &str = "adjust 2xx";
pub const GLOBAL_CHECK: &str = "global 2xx";

/// Body of the adjust command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustRequest {
    pub store_id: &'static str,
    pub sku: &'static str,
    pub delta: i32,
}

impl AdjustRequest {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            store_id: pick_store(rng),
            sku: SKU,
            delta: pick_delta(rng),
        }
    }
}

pub fn pick_store<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    STORES[rng.gen_range(0..STORES.len())]
}

pub fn pick_delta<R: Rng + ?Sized>(rng: &mut R) -> i32 {
    rng.gen_range(MIN_DELTA..=MAX_DELTA)
}

/// Status of a completed HTTP exchange. Anything outside 2xx/3xx counts as a failed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HttpStatus(pub StatusCode);

impl TransactionOutcome for HttpStatus {
    fn is_failure(&self) -> bool {
        !(self.0.is_success() || self.0.is_redirection())
    }
}

fn status_is(res: &Result<HttpStatus, reqwest::Error>, expected: StatusCode) -> bool {
    matches!(res, Ok(HttpStatus(status)) if *status == expected)
}

/// One virtual user's worth of work: adjust, pause, query.
#[derive(Clone, Debug)]
pub struct Driver {
    client: Client,
    target: Target,
    pause: Duration,
}

impl Driver {
    pub fn new(client: Client, target: Target) -> Self {
        Self {
            client,
            target,
            pause: DELIVERY_PAUSE,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Run a single iteration. Never fails: transport errors and unexpected statuses only show up
    /// as failed requests and failed checks.
    pub async fn iteration(&self) {
        let request = AdjustRequest::random(&mut rand::thread_rng());
        trace!(store = request.store_id, delta = request.delta, "Adjusting stock");

        let adjusted = adjust_stock(&self.client, &self.target.adjust_url(), &request).await;
        check(ADJUST_CHECK, status_is(&adjusted, StatusCode::OK));

        tokio::time::sleep(self.pause).await;

        let global = global_inventory(&self.client, &self.target.global_url(SKU)).await;
        check(GLOBAL_CHECK, status_is(&global, StatusCode::OK));
    }

    /// The load test scenario, each virtual user running [`Driver::iteration`] in a loop.
    pub fn scenario(self) -> impl ConfigurableScenario {
        Scenario::new(SCENARIO_NAME, move || {
            let driver = self.clone();
            async move { driver.iteration().await }
        })
    }
}

#[transaction]
async fn adjust_stock(
    client: &Client,
    url: &str,
    request: &AdjustRequest,
) -> Result<HttpStatus, reqwest::Error> {
    let res = client.post(url).json(request).send().await?;
    let status = res.status();
    res.bytes().await?;
    Ok(HttpStatus(status))
}

#[transaction]
async fn global_inventory(client: &Client, url: &str) -> Result<HttpStatus, reqwest::Error> {
    let res = client.get(url).send().await?;
    let status = res.status();
    res.bytes().await?;
    Ok(HttpStatus(status))
}
