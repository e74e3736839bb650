use anyhow::{Context, Result};
use clap::Parser;
use market_summary_exporter::{
    logging::init_logging, Cli, CollectorLoop, CollectorMetrics, CryptowatchProvider,
    MetricRegistry, MetricsServer,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json)?;

    let config = cli.resolve().context("Invalid configuration")?;
    tracing::info!(
        exchanges = ?config.exchanges,
        pairs = ?config.pairs,
        refresh_interval_secs = config.refresh_interval.as_secs(),
        "Configuration resolved"
    );

    let registry = Arc::new(
        MetricRegistry::new(config.track_last_update).context("Failed to create metric registry")?,
    );
    let metrics = Arc::new(
        CollectorMetrics::new(registry.registry()).context("Failed to register exporter metrics")?,
    );
    let source = Arc::new(
        CryptowatchProvider::new(&config.api_url, config.request_timeout)
            .context("Failed to create market data client")?,
    );

    let collector = CollectorLoop::new(&config, source, registry.clone(), metrics);
    let server = MetricsServer::new(
        config.listen_address,
        &config.telemetry_path,
        registry,
        collector.health(),
    );
    let listener = server.bind().await?;

    let handle = collector.spawn();

    tokio::select! {
        result = server.serve(listener) => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutdown requested");
        }
    }

    let cycles = handle.shutdown().await?;
    tracing::info!(cycles, "Exporter stopped");

    Ok(())
}
