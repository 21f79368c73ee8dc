use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use credit_core::OverridePolicy;
use credit_orchestrator::CreditPipeline;
use market_data_client::MarketDataClient;
use scoring_engine::CreditClassifier;

mod config;

use config::ScorerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    let config = ScorerConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  Model path: {}", config.model_path);
    tracing::info!("  Tracked companies: {}", config.tracked_companies.join(", "));
    tracing::info!("  Override threshold: {}", config.override_tally_threshold);
    tracing::info!("  Ingest timeout: {}s", config.ingest_timeout_seconds);

    // A missing or corrupt model stops the process here; scoring never
    // starts against a half-loaded artifact.
    let classifier = CreditClassifier::load(&config.model_path)
        .with_context(|| format!("cannot load scoring model from {}", config.model_path))?;
    tracing::info!(
        "Scoring model loaded ({} features, trained {})",
        classifier.artifact().feature_names.len(),
        classifier.artifact().trained_at
    );

    let client = Arc::new(MarketDataClient::new(config.market_data_api_key.clone()));
    let pipeline = CreditPipeline::new(Arc::new(classifier), client.clone(), client)
        .with_policy(OverridePolicy::new(config.override_tally_threshold))
        .with_ingest_timeout(Duration::from_secs(config.ingest_timeout_seconds))
        .with_news_limit(config.news_limit);

    let records = pipeline.score_companies(&config.tracked_companies).await;
    tracing::info!(
        "Scored {}/{} companies",
        records.len(),
        config.tracked_companies.len()
    );

    let output = serde_json::to_string_pretty(&records)?;
    match &config.output_path {
        Some(path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("cannot write results to {path}"))?;
            tracing::info!("Results written to {}", path);
        }
        None => println!("{output}"),
    }

    Ok(())
}
