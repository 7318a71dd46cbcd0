use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use mock_service::{router, AppState, MockConfig};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?,
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let addr: SocketAddr = env_or("MOCK_ADDR", DEFAULT_ADDR).parse()?;
    let metrics_addr: SocketAddr = env_or("MOCK_METRICS_ADDR", DEFAULT_METRICS_ADDR).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("installing prometheus exporter")?;

    let listener = TcpListener::bind(addr).await?;
    info!("Inventory mock listening on {addr}, metrics on {metrics_addr}");

    axum::serve(listener, router(AppState::new(MockConfig::default()))).await?;
    Ok(())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
