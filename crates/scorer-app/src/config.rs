use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct ScorerConfig {
    pub market_data_api_key: String,
    pub model_path: String,
    pub tracked_companies: Vec<String>,
    pub override_tally_threshold: i64,
    pub ingest_timeout_seconds: u64,
    pub news_limit: u32,
    /// Where to write the JSON batch output; stdout when unset.
    pub output_path: Option<String>,
}

impl ScorerConfig {
    pub fn from_env() -> Result<Self> {
        let market_data_api_key =
            env::var("MARKET_DATA_API_KEY").context("MARKET_DATA_API_KEY must be set")?;

        let tracked_companies: Vec<String> = env::var("TRACKED_COMPANIES")
            .unwrap_or_else(|_| "AAPL,MSFT,TSLA,F,GE".to_string())
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        anyhow::ensure!(
            !tracked_companies.is_empty(),
            "TRACKED_COMPANIES must name at least one symbol"
        );

        Ok(Self {
            market_data_api_key,
            model_path: env::var("MODEL_PATH")
                .unwrap_or_else(|_| "models/credit_model.json".to_string()),
            tracked_companies,
            override_tally_threshold: env::var("OVERRIDE_TALLY_THRESHOLD")
                .unwrap_or_else(|_| "-3".to_string())
                .parse()
                .context("OVERRIDE_TALLY_THRESHOLD must be an integer")?,
            ingest_timeout_seconds: env::var("INGEST_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("INGEST_TIMEOUT_SECONDS must be a positive integer")?,
            news_limit: env::var("NEWS_LIMIT")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .context("NEWS_LIMIT must be a positive integer")?,
            output_path: env::var("OUTPUT_PATH").ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        // Serialize access to process env across tests in this module
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("MARKET_DATA_API_KEY", "test-key");
        env::remove_var("TRACKED_COMPANIES");
        env::remove_var("OVERRIDE_TALLY_THRESHOLD");
        env::remove_var("OUTPUT_PATH");

        let config = ScorerConfig::from_env().unwrap();
        assert_eq!(config.override_tally_threshold, -3);
        assert_eq!(config.news_limit, 50);
        assert_eq!(config.tracked_companies.len(), 5);
        assert!(config.output_path.is_none());
    }

    #[test]
    fn tracked_companies_are_trimmed_and_uppercased() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("MARKET_DATA_API_KEY", "test-key");
        env::set_var("TRACKED_COMPANIES", " aapl, msft ,,tsla ");

        let config = ScorerConfig::from_env().unwrap();
        assert_eq!(config.tracked_companies, vec!["AAPL", "MSFT", "TSLA"]);
        env::remove_var("TRACKED_COMPANIES");
    }

    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
}
