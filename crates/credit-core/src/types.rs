use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One reporting period of structured financial data for a company.
/// Fields may be missing in the upstream filing; downstream ratio math
/// degrades per-field instead of failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub symbol: String,
    pub fiscal_period: String,
    pub fiscal_year: i32,
    pub revenue: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: Option<f64>,
    pub total_assets: Option<f64>,
    pub current_assets: Option<f64>,
    pub current_liabilities: Option<f64>,
    pub total_debt: Option<f64>,
    pub stockholder_equity: Option<f64>,
}

/// Sentiment label attached to a classified news event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

/// One classified news item, ordered by publication in the feed.
/// Classification is produced upstream and trusted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEvent {
    pub headline: String,
    pub sentiment: Sentiment,
    #[serde(default)]
    pub magnitude: Option<f64>,
    #[serde(default)]
    pub entities: Vec<String>,
    pub event_type: String,
    #[serde(default)]
    pub published_utc: Option<DateTime<Utc>>,
}

/// Net count of positive minus negative events over one scoring run.
pub type SentimentTally = i64;

/// Named numeric features fed to the classifier. Values are guaranteed
/// finite: non-finite inputs are normalized to 0 at insertion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    values: BTreeMap<String, f64>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a feature value, replacing NaN/infinity with 0.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let v = if value.is_finite() { value } else { 0.0 };
        self.values.insert(name.into(), v);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// Project this vector onto an explicit feature ordering.
    /// Returns None if any requested name is missing.
    pub fn ordered_values(&self, ordering: &[String]) -> Option<Vec<f64>> {
        ordering
            .iter()
            .map(|name| self.values.get(name).copied())
            .collect()
    }
}

impl FromIterator<(String, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut fv = FeatureVector::new();
        for (k, v) in iter {
            fv.insert(k, v);
        }
        fv
    }
}

/// Two-stage scoring outcome: raw classifier output plus the value after
/// the sentiment override policy ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    pub base_score: u8,
    pub final_score: u8,
    pub override_reason: String,
}

/// Per-event entry in the explanation's qualitative summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventImpact {
    pub headline: String,
    pub impact: String,
    pub reason: String,
}

/// Human-facing explanation tied to one FeatureVector and one ScoreResult.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub feature_contributions: BTreeMap<String, f64>,
    pub main_driver: String,
    /// True when contributions come from the engine's global importance
    /// ranking instead of exact per-prediction attribution.
    pub approximate: bool,
    pub event_summary: Vec<EventImpact>,
    pub narrative: String,
    pub sentiment_adjustment: String,
}

/// Externally visible output of one pipeline run. Created once, immutable,
/// serialized for downstream display or storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub timestamp: DateTime<Utc>,
    pub company: String,
    pub base_score_financials: u8,
    pub final_score_with_sentiment: u8,
    pub explanation: Explanation,
    pub raw_features: FeatureVector,
    pub sentiment_score: SentimentTally,
    pub events: Vec<MarketEvent>,
}
