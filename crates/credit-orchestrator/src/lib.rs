//! Staged scoring pipeline: ingest, compose, score, override, explain,
//! assemble. One run per company is all-or-nothing; in a batch, a failed
//! company is logged and omitted without touching its siblings.

use attribution_engine::AttributionGenerator;
use chrono::{DateTime, Utc};
use credit_core::{
    FinancialSnapshot, FinancialsProvider, MarketEvent, NewsProvider, OverridePolicy,
    PipelineError, ResultRecord, ScoreResult, ScoringModel,
};
use dashmap::DashMap;
use feature_composer::FeatureComposer;
use std::sync::Arc;
use std::time::Duration;

const CACHE_TTL_SECS: i64 = 300; // 5 minutes
const DEFAULT_INGEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_NEWS_LIMIT: u32 = 50;

/// Internal cache entry with timestamp
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

impl<T: Clone> CacheEntry<T> {
    fn fresh(&self) -> Option<T> {
        let age = (Utc::now() - self.cached_at).num_seconds();
        (age < CACHE_TTL_SECS).then(|| self.data.clone())
    }
}

pub struct CreditPipeline {
    model: Arc<dyn ScoringModel>,
    financials: Arc<dyn FinancialsProvider>,
    news: Arc<dyn NewsProvider>,
    composer: FeatureComposer,
    attribution: AttributionGenerator,
    policy: OverridePolicy,
    ingest_timeout: Duration,
    news_limit: u32,
    /// Cache latest snapshot per symbol (5-min TTL)
    snapshot_cache: DashMap<String, CacheEntry<Option<FinancialSnapshot>>>,
    /// Cache classified events per symbol (5-min TTL)
    events_cache: DashMap<String, CacheEntry<Vec<MarketEvent>>>,
}

impl CreditPipeline {
    /// Build a pipeline around an already-loaded model. Loading the model is
    /// the caller's job: a missing artifact should stop the process before
    /// any scoring is attempted, not surface per-company.
    pub fn new(
        model: Arc<dyn ScoringModel>,
        financials: Arc<dyn FinancialsProvider>,
        news: Arc<dyn NewsProvider>,
    ) -> Self {
        Self {
            model,
            financials,
            news,
            composer: FeatureComposer::new(),
            attribution: AttributionGenerator::new(),
            policy: OverridePolicy::default(),
            ingest_timeout: Duration::from_secs(DEFAULT_INGEST_TIMEOUT_SECS),
            news_limit: DEFAULT_NEWS_LIMIT,
            snapshot_cache: DashMap::new(),
            events_cache: DashMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: OverridePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_ingest_timeout(mut self, timeout: Duration) -> Self {
        self.ingest_timeout = timeout;
        self
    }

    pub fn with_news_limit(mut self, limit: u32) -> Self {
        self.news_limit = limit;
        self
    }

    /// Get the latest snapshot (cached, 5-min TTL).
    async fn get_snapshot(
        &self,
        symbol: &str,
    ) -> Result<Option<FinancialSnapshot>, PipelineError> {
        let cache_key = symbol.to_uppercase();
        if let Some(entry) = self.snapshot_cache.get(&cache_key) {
            if let Some(data) = entry.fresh() {
                return Ok(data);
            }
        }

        let snapshot = tokio::time::timeout(
            self.ingest_timeout,
            self.financials.latest_snapshot(symbol),
        )
        .await
        .map_err(|_| PipelineError::Ingestion(format!("financials fetch timed out for {symbol}")))??;

        self.snapshot_cache.insert(
            cache_key,
            CacheEntry {
                data: snapshot.clone(),
                cached_at: Utc::now(),
            },
        );
        Ok(snapshot)
    }

    /// Get classified recent events (cached, 5-min TTL).
    async fn get_events(&self, symbol: &str) -> Result<Vec<MarketEvent>, PipelineError> {
        let cache_key = symbol.to_uppercase();
        if let Some(entry) = self.events_cache.get(&cache_key) {
            if let Some(data) = entry.fresh() {
                return Ok(data);
            }
        }

        let events = tokio::time::timeout(
            self.ingest_timeout,
            self.news.recent_events(symbol, self.news_limit),
        )
        .await
        .map_err(|_| PipelineError::Ingestion(format!("news fetch timed out for {symbol}")))??;

        self.events_cache.insert(
            cache_key,
            CacheEntry {
                data: events.clone(),
                cached_at: Utc::now(),
            },
        );
        Ok(events)
    }

    /// Score one company end to end. Any stage failure fails the whole run;
    /// no partial record is ever produced.
    pub async fn score_company(&self, symbol: &str) -> Result<ResultRecord, PipelineError> {
        tracing::info!(symbol, "starting scoring run");

        let (snapshot, events) =
            tokio::try_join!(self.get_snapshot(symbol), self.get_events(symbol))?;

        let (features, tally) = self.composer.compose(snapshot.as_ref(), &events)?;
        tracing::debug!(symbol, tally, "features composed");

        let base_score = self.model.predict(&features)?;
        let (final_score, reason) = self.policy.apply(base_score, tally);
        let score = ScoreResult {
            base_score,
            final_score,
            override_reason: reason.to_string(),
        };
        if score.final_score != score.base_score {
            tracing::info!(symbol, base_score, final_score, tally, "sentiment override applied");
        }

        let mut explanation = self.attribution.explain(self.model.as_ref(), &features, &events)?;
        explanation.sentiment_adjustment = score.override_reason.clone();

        tracing::info!(symbol, base_score, final_score, "scoring run complete");

        Ok(ResultRecord {
            timestamp: Utc::now(),
            company: symbol.to_string(),
            base_score_financials: score.base_score,
            final_score_with_sentiment: score.final_score,
            explanation,
            raw_features: features,
            sentiment_score: tally,
            events,
        })
    }

    /// Score a batch of companies sequentially. Failures are logged and
    /// omitted from the output; sibling companies are unaffected.
    pub async fn score_companies(&self, symbols: &[String]) -> Vec<ResultRecord> {
        let mut records = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            match self.score_company(symbol).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::error!(symbol = %symbol, error = %e, "scoring run failed, skipping");
                }
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use credit_core::{Sentiment, REASON_DOWNGRADED, REASON_NO_IMPACT};
    use scoring_engine::{CreditClassifier, TreeConfig};

    struct StubFinancials {
        snapshot: Option<FinancialSnapshot>,
    }

    #[async_trait]
    impl FinancialsProvider for StubFinancials {
        async fn latest_snapshot(
            &self,
            _symbol: &str,
        ) -> Result<Option<FinancialSnapshot>, PipelineError> {
            Ok(self.snapshot.clone())
        }
    }

    struct StubNews {
        events: Vec<MarketEvent>,
    }

    #[async_trait]
    impl NewsProvider for StubNews {
        async fn recent_events(
            &self,
            _symbol: &str,
            _limit: u32,
        ) -> Result<Vec<MarketEvent>, PipelineError> {
            Ok(self.events.clone())
        }
    }

    fn trained_model() -> Arc<CreditClassifier> {
        let names = vec![
            "debt_to_equity".to_string(),
            "current_ratio".to_string(),
            "operating_margin".to_string(),
            "return_on_assets".to_string(),
        ];
        let rows = vec![
            vec![0.4, 1.9, 0.15, 0.08],
            vec![0.5, 1.8, 0.12, 0.06],
            vec![0.3, 2.2, 0.20, 0.10],
            vec![0.6, 1.6, 0.10, 0.05],
            vec![2.5, 0.8, -0.05, -0.02],
            vec![3.0, 0.7, -0.10, -0.04],
            vec![2.2, 0.9, 0.01, 0.00],
            vec![2.8, 0.6, -0.08, -0.03],
        ];
        let labels = vec![1, 1, 1, 1, 0, 0, 0, 0];
        Arc::new(CreditClassifier::train(TreeConfig::default(), names, &rows, &labels).unwrap())
    }

    fn healthy_snapshot() -> FinancialSnapshot {
        FinancialSnapshot {
            symbol: "ACME".to_string(),
            fiscal_period: "FY".to_string(),
            fiscal_year: 2025,
            revenue: Some(100.0),
            operating_income: Some(12.0),
            net_income: Some(8.0),
            total_assets: Some(200.0),
            current_assets: Some(180.0),
            current_liabilities: Some(100.0),
            total_debt: Some(50.0),
            stockholder_equity: Some(100.0),
        }
    }

    fn event(sentiment: Sentiment) -> MarketEvent {
        MarketEvent {
            headline: "headline".to_string(),
            sentiment,
            magnitude: None,
            entities: vec![],
            event_type: "financial_event".to_string(),
            published_utc: None,
        }
    }

    fn pipeline(
        snapshot: Option<FinancialSnapshot>,
        events: Vec<MarketEvent>,
    ) -> CreditPipeline {
        CreditPipeline::new(
            trained_model(),
            Arc::new(StubFinancials { snapshot }),
            Arc::new(StubNews { events }),
        )
    }

    #[tokio::test]
    async fn healthy_company_keeps_base_score() {
        let pipe = pipeline(Some(healthy_snapshot()), vec![event(Sentiment::Positive)]);
        let record = pipe.score_company("ACME").await.unwrap();

        assert_eq!(record.base_score_financials, 1);
        assert_eq!(record.final_score_with_sentiment, 1);
        assert_eq!(record.sentiment_score, 1);
        assert_eq!(record.explanation.sentiment_adjustment, REASON_NO_IMPACT);
        assert_eq!(record.company, "ACME");
        assert_eq!(record.raw_features.len(), 4);
    }

    #[tokio::test]
    async fn strongly_negative_news_forces_zero() {
        let events = vec![
            event(Sentiment::Negative),
            event(Sentiment::Negative),
            event(Sentiment::Negative),
            event(Sentiment::Negative),
            event(Sentiment::Neutral),
        ];
        let pipe = pipeline(Some(healthy_snapshot()), events);
        let record = pipe.score_company("ACME").await.unwrap();

        assert_eq!(record.sentiment_score, -4);
        assert_eq!(record.base_score_financials, 1);
        assert_eq!(record.final_score_with_sentiment, 0);
        assert_eq!(record.explanation.sentiment_adjustment, REASON_DOWNGRADED);
    }

    #[tokio::test]
    async fn missing_snapshot_fails_the_run() {
        let pipe = pipeline(None, vec![]);
        let err = pipe.score_company("GHOST").await.unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData(_)));
    }

    #[tokio::test]
    async fn batch_omits_failed_companies() {
        struct SelectiveFinancials;

        #[async_trait]
        impl FinancialsProvider for SelectiveFinancials {
            async fn latest_snapshot(
                &self,
                symbol: &str,
            ) -> Result<Option<FinancialSnapshot>, PipelineError> {
                if symbol == "GHOST" {
                    Ok(None)
                } else {
                    Ok(Some(healthy_snapshot()))
                }
            }
        }

        let pipe = CreditPipeline::new(
            trained_model(),
            Arc::new(SelectiveFinancials),
            Arc::new(StubNews { events: vec![] }),
        );
        let symbols = vec![
            "ACME".to_string(),
            "GHOST".to_string(),
            "BETA".to_string(),
        ];
        let records = pipe.score_companies(&symbols).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].company, "ACME");
        assert_eq!(records[1].company, "BETA");
    }

    #[tokio::test]
    async fn hung_fetch_is_an_ingestion_failure() {
        struct HangingFinancials;

        #[async_trait]
        impl FinancialsProvider for HangingFinancials {
            async fn latest_snapshot(
                &self,
                _symbol: &str,
            ) -> Result<Option<FinancialSnapshot>, PipelineError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Some(healthy_snapshot()))
            }
        }

        let pipe = CreditPipeline::new(
            trained_model(),
            Arc::new(HangingFinancials),
            Arc::new(StubNews { events: vec![] }),
        )
        .with_ingest_timeout(Duration::from_millis(50));

        let err = pipe.score_company("ACME").await.unwrap_err();
        assert!(matches!(err, PipelineError::Ingestion(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn hung_fetch_fails_only_that_entity_in_a_batch() {
        struct SlowForGhost;

        #[async_trait]
        impl FinancialsProvider for SlowForGhost {
            async fn latest_snapshot(
                &self,
                symbol: &str,
            ) -> Result<Option<FinancialSnapshot>, PipelineError> {
                if symbol == "GHOST" {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok(Some(healthy_snapshot()))
            }
        }

        let pipe = CreditPipeline::new(
            trained_model(),
            Arc::new(SlowForGhost),
            Arc::new(StubNews { events: vec![] }),
        )
        .with_ingest_timeout(Duration::from_millis(50));

        let symbols = vec![
            "ACME".to_string(),
            "GHOST".to_string(),
            "BETA".to_string(),
        ];
        let records = pipe.score_companies(&symbols).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].company, "ACME");
        assert_eq!(records[1].company, "BETA");
    }

    #[tokio::test]
    async fn repeat_runs_are_identical_modulo_timestamp() {
        let pipe = pipeline(Some(healthy_snapshot()), vec![event(Sentiment::Negative)]);
        let first = pipe.score_company("ACME").await.unwrap();
        let second = pipe.score_company("ACME").await.unwrap();

        assert_eq!(
            first.base_score_financials,
            second.base_score_financials
        );
        assert_eq!(
            first.final_score_with_sentiment,
            second.final_score_with_sentiment
        );
        assert_eq!(first.raw_features, second.raw_features);
        assert_eq!(
            first.explanation.feature_contributions,
            second.explanation.feature_contributions
        );
        assert_eq!(first.explanation.narrative, second.explanation.narrative);
    }

    #[tokio::test]
    async fn custom_threshold_changes_override_point() {
        let pipe = pipeline(Some(healthy_snapshot()), vec![event(Sentiment::Negative)])
            .with_policy(OverridePolicy::new(-1));
        let record = pipe.score_company("ACME").await.unwrap();

        assert_eq!(record.sentiment_score, -1);
        assert_eq!(record.final_score_with_sentiment, 0);
        assert_eq!(record.explanation.sentiment_adjustment, REASON_DOWNGRADED);
    }
}
