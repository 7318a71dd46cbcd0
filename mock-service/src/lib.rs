//! In-process stand-in for the inventory service: store-level command
//! endpoints, an asynchronous projection behind the global query, and knobs
//! for forcing failures and latency from tests.
pub mod error;
pub mod projection;
pub mod store;

use axum::{
    body::{Body, Bytes},
    extract::{Path, Request, State},
    http::{header, HeaderMap},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use error::ApiError;
use projection::{EventBus, Projection};
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};
use store::StoreInventory;
use tokio::{net::TcpListener, task::JoinHandle};
use tower_http::trace::TraceLayer;
use tracing::error;

pub use axum::http::{Method, StatusCode};
pub use store::InventoryRecord;

const ADJUST_PATH: &str = "/api/commands/inventory/adjust";
const QUERY_PREFIX: &str = "/api/query/";

/// Failure and latency injection. `adjust_status` applies to the adjust
/// command only, `query_status` to every query route. `None` statuses let
/// requests through to the real handlers.
#[derive(Clone, Debug, Default)]
pub struct MockConfig {
    pub adjust_status: Option<StatusCode>,
    pub query_status: Option<StatusCode>,
    pub delay: Duration,
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Bytes,
    pub received_at: Instant,
}

#[derive(Clone)]
pub struct AppState {
    store: Arc<StoreInventory>,
    projection: Projection,
    config: Arc<MockConfig>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl AppState {
    /// Must be called within a tokio runtime; spawns the projection task.
    pub fn new(config: MockConfig) -> Self {
        let (bus, rx) = EventBus::channel();
        let projection = Projection::default();
        projection.spawn(rx);

        Self {
            store: Arc::new(StoreInventory::new(bus)),
            projection,
            config: Arc::new(config),
            requests: Arc::default(),
        }
    }

    fn record(&self, request: RecordedRequest) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(ADJUST_PATH, post(adjust))
        .route("/api/commands/inventory/replace", post(replace))
        .route("/api/query/inventory/global/:sku", get(global))
        .route("/api/query/inventory/store/:store_id/:sku", get(per_store))
        .layer(middleware::from_fn_with_state(state.clone(), control))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn control(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let received_at = Instant::now();
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(body) => body,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };

    let path = parts.uri.path().to_string();
    state.record(RecordedRequest {
        method: parts.method.clone(),
        path: path.clone(),
        body: body.clone(),
        received_at,
    });

    if !state.config.delay.is_zero() {
        tokio::time::sleep(state.config.delay).await;
    }

    let forced = if path == ADJUST_PATH {
        state.config.adjust_status
    } else if path.starts_with(QUERY_PREFIX) {
        state.config.query_status
    } else {
        None
    };
    if let Some(status) = forced {
        return status.into_response();
    }

    next.run(Request::from_parts(parts, Body::from(body))).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdjustStockRequest {
    store_id: String,
    sku: String,
    delta: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplaceStockRequest {
    store_id: String,
    sku: String,
    quantity: i32,
}

#[derive(Debug, Serialize)]
struct GlobalQuantity {
    sku: String,
    quantity: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreQuantity {
    store_id: String,
    sku: String,
    quantity: i32,
}

async fn adjust(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AdjustStockRequest>,
) -> Result<Response, ApiError> {
    let record = state
        .store
        .adjust(&req.store_id, &req.sku, req.delta, if_match(&headers)?)?;
    metrics::counter!("inventory_commands_total", "command" => "adjust").increment(1);
    Ok(versioned(record))
}

async fn replace(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ReplaceStockRequest>,
) -> Result<Response, ApiError> {
    let record = state
        .store
        .replace(&req.store_id, &req.sku, req.quantity, if_match(&headers)?)?;
    metrics::counter!("inventory_commands_total", "command" => "replace").increment(1);
    Ok(versioned(record))
}

async fn global(State(state): State<AppState>, Path(sku): Path<String>) -> Json<GlobalQuantity> {
    let quantity = state.projection.global_quantity(&sku);
    Json(GlobalQuantity { sku, quantity })
}

async fn per_store(
    State(state): State<AppState>,
    Path((store_id, sku)): Path<(String, String)>,
) -> Json<StoreQuantity> {
    let quantity = state
        .projection
        .store_quantity(&store_id, &sku)
        .unwrap_or(0);
    Json(StoreQuantity {
        store_id,
        sku,
        quantity,
    })
}

/// Accepts both `"3"` and `3`.
fn if_match(headers: &HeaderMap) -> Result<Option<u64>, ApiError> {
    let Some(value) = headers.get(header::IF_MATCH) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .map(|v| v.trim().trim_matches('"'))
        .and_then(|v| v.parse().ok())
        .map(Some)
        .ok_or(ApiError::InvalidPrecondition)
}

fn versioned(record: InventoryRecord) -> Response {
    let etag = format!("\"{}\"", record.version);
    ([(header::ETAG, etag)], Json(record)).into_response()
}

/// A running service on an ephemeral localhost port. The server task is
/// aborted on drop.
pub struct MockServer {
    addr: SocketAddr,
    state: AppState,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(config: MockConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = AppState::new(config);
        let app = router(state.clone());

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                error!("Mock service failed: {err}");
            }
        });

        Ok(Self {
            addr,
            state,
            handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn projection(&self) -> &Projection {
        &self.state.projection
    }

    pub fn store(&self) -> &StoreInventory {
        &self.state.store
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn adjust_returns_versioned_record() {
        let app = router(AppState::new(MockConfig::default()));

        let response = app
            .oneshot(post_json(
                "/api/commands/inventory/adjust",
                json!({"storeId": "A", "sku": "SKU1", "delta": 2}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ETAG], "\"1\"");
        let body = json_body(response).await;
        assert_eq!(body["storeId"], "A");
        assert_eq!(body["quantity"], 2);
        assert_eq!(body["version"], 1);
    }

    #[tokio::test]
    async fn mismatched_if_match_is_412() {
        let state = AppState::new(MockConfig::default());
        let app = router(state.clone());
        state.store.replace("S2", "VAL-2", 1, None).unwrap();

        let mut request = post_json(
            "/api/commands/inventory/adjust",
            json!({"storeId": "S2", "sku": "VAL-2", "delta": 1}),
        );
        request
            .headers_mut()
            .insert(header::IF_MATCH, "\"999\"".parse().unwrap());

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
    }

    #[tokio::test]
    async fn negative_replace_is_400() {
        let app = router(AppState::new(MockConfig::default()));

        let response = app
            .oneshot(post_json(
                "/api/commands/inventory/replace",
                json!({"storeId": "S1", "sku": "VAL-1", "quantity": -1}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn forced_status_skips_handler() {
        let state = AppState::new(MockConfig {
            adjust_status: Some(StatusCode::INTERNAL_SERVER_ERROR),
            ..Default::default()
        });
        let app = router(state.clone());

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/commands/inventory/adjust",
                json!({"storeId": "A", "sku": "SKU1", "delta": 1}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(state.store.get("A", "SKU1").is_none());

        let response = app
            .oneshot(
                Request::get("/api/query/inventory/global/SKU1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"sku": "SKU1", "quantity": 0}));

        let requests = state.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[1].path, "/api/query/inventory/global/SKU1");
    }

    #[tokio::test]
    async fn forced_adjust_status_leaves_replace_alone() {
        let state = AppState::new(MockConfig {
            adjust_status: Some(StatusCode::INTERNAL_SERVER_ERROR),
            ..Default::default()
        });
        let app = router(state.clone());

        let response = app
            .oneshot(post_json(
                "/api/commands/inventory/replace",
                json!({"storeId": "A", "sku": "SKU1", "quantity": 3}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.store.get("A", "SKU1").unwrap().quantity, 3);
    }

    #[tokio::test]
    async fn unknown_store_reads_zero() {
        let app = router(AppState::new(MockConfig::default()));

        let response = app
            .oneshot(
                Request::get("/api/query/inventory/store/Z/SKU1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            json_body(response).await,
            json!({"storeId": "Z", "sku": "SKU1", "quantity": 0})
        );
    }
}
