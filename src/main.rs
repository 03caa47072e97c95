use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use vacancy_harvester::harvest::HarvestPipeline;
use vacancy_harvester::{HarvestConfig, HttpFetcher};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = HarvestConfig::default();
    let fetcher = Arc::new(HttpFetcher::new(config.request_timeout)?);
    let pipeline = HarvestPipeline::new(config, fetcher)?;

    let report = pipeline.run().await?;

    info!(
        discovered = report.discovered,
        already_seen = report.already_seen,
        written = report.records_written,
        failed = report.failures.len(),
        "Harvest run finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
