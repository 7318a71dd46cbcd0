use inventory_load::{Driver, Target};
use mock_service::{MockConfig, MockServer};
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let _ = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::new(
                "loadpulse=debug,inventory_load=debug,mock_service=debug,axum::rejection=trace",
            ))
            .with_test_writer()
            .try_init();
    });
}

/// Start a mock backend and a driver pointed at it.
#[allow(unused)]
pub async fn backend(config: MockConfig) -> anyhow::Result<(MockServer, Driver)> {
    init();

    let server = MockServer::start(config).await?;
    let client = Client::builder().timeout(Duration::from_secs(5)).build()?;
    let driver = Driver::new(client, Target::new(&server.base_url())?);
    Ok((server, driver))
}
