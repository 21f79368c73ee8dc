//! Offline model trainer: reads a labeled ratio dataset, fits the tree,
//! reports training accuracy, and writes the artifact consumed by `scorer`.

use anyhow::{Context, Result};
use feature_composer::{
    FEATURE_CURRENT_RATIO, FEATURE_DEBT_TO_EQUITY, FEATURE_OPERATING_MARGIN,
    FEATURE_RETURN_ON_ASSETS,
};
use scoring_engine::{CreditClassifier, TreeConfig};
use serde::Deserialize;

/// One labeled training example. Missing or non-finite ratios count as 0,
/// matching how the live composer degrades missing fields.
#[derive(Debug, Deserialize)]
struct TrainingExample {
    #[serde(default)]
    debt_to_equity: Option<f64>,
    #[serde(default)]
    current_ratio: Option<f64>,
    #[serde(default)]
    operating_margin: Option<f64>,
    #[serde(default)]
    return_on_assets: Option<f64>,
    label: u8,
}

impl TrainingExample {
    fn row(&self) -> Vec<f64> {
        [
            self.debt_to_equity,
            self.current_ratio,
            self.operating_margin,
            self.return_on_assets,
        ]
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()).unwrap_or(0.0))
        .collect()
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let dataset_path = args
        .next()
        .or_else(|| std::env::var("TRAINING_DATA").ok())
        .context("usage: trainer <dataset.json> [model_out.json]")?;
    let model_path = args
        .next()
        .or_else(|| std::env::var("MODEL_PATH").ok())
        .unwrap_or_else(|| "models/credit_model.json".to_string());

    let raw = std::fs::read_to_string(&dataset_path)
        .with_context(|| format!("cannot read training dataset {dataset_path}"))?;
    let examples: Vec<TrainingExample> =
        serde_json::from_str(&raw).context("training dataset is not valid labeled JSON")?;
    anyhow::ensure!(!examples.is_empty(), "training dataset is empty");

    tracing::info!("Loaded {} labeled examples from {}", examples.len(), dataset_path);

    let rows: Vec<Vec<f64>> = examples.iter().map(TrainingExample::row).collect();
    let labels: Vec<u8> = examples.iter().map(|e| e.label).collect();

    let feature_names = vec![
        FEATURE_DEBT_TO_EQUITY.to_string(),
        FEATURE_CURRENT_RATIO.to_string(),
        FEATURE_OPERATING_MARGIN.to_string(),
        FEATURE_RETURN_ON_ASSETS.to_string(),
    ];

    let classifier = CreditClassifier::train(TreeConfig::default(), feature_names, &rows, &labels)?;

    let accuracy = classifier.accuracy(&rows, &labels);
    tracing::info!("Training accuracy: {:.3}", accuracy);

    if let Some(dir) = std::path::Path::new(&model_path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create model directory {}", dir.display()))?;
        }
    }
    classifier.save(&model_path)?;
    tracing::info!("Model artifact written to {}", model_path);

    Ok(())
}
