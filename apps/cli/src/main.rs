use std::fs::File;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shared_config::ClinicConfig;
use shared_gateway::GraphQlClient;
use snapshot_cell::models::DateWindow;
use snapshot_cell::services::aggregator::SnapshotAggregator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic snapshot pull");

    let config = ClinicConfig::from_env();
    if !config.is_configured() {
        anyhow::bail!("GRAPHQL_ENDPOINT must be set");
    }

    let gateway = Arc::new(GraphQlClient::new(&config));
    let aggregator = SnapshotAggregator::new(gateway).with_concurrency(config.fetch_concurrency);
    let window = DateWindow::starting_now(config.availability_window_days);

    let snapshot = aggregator.build_snapshot(window).await?;

    let file = File::create(&config.snapshot_path)
        .with_context(|| format!("creating {}", config.snapshot_path))?;
    serde_json::to_writer_pretty(file, &snapshot).context("serializing snapshot")?;

    info!("Snapshot written to {}", config.snapshot_path);
    Ok(())
}
