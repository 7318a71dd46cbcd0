use anyhow::{Context, Result};
use clap::Parser;
use inventory_load::cli::Args;
use inventory_load::config::{REQUEST_TIMEOUT, THRESHOLDS_FAILED_EXIT_CODE};
use inventory_load::Driver;
use loadpulse::prelude::*;
use reqwest::Client;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&args.log_filter))?;
    FmtSubscriber::builder().with_env_filter(filter).init();

    let target = args.target()?;
    let config = args.scenario_config()?;
    let client = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;

    info!(
        "Targeting {} with {} VUs for {}",
        target.base_url(),
        config.vus,
        humantime::format_duration(args.duration())
    );

    let stats = Driver::new(client, target).scenario().config(config).await?;

    println!("{stats}");

    if let Some(path) = &args.summary_export {
        let json = serde_json::to_vec_pretty(&stats)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write summary to {}", path.display()))?;
        info!("Summary written to {}", path.display());
    }

    if stats.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(THRESHOLDS_FAILED_EXIT_CODE))
    }
}
