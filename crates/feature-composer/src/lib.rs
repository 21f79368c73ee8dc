//! Turns one financial snapshot plus a list of classified news events into
//! the numeric feature vector and sentiment tally consumed by the scoring
//! engine.

use credit_core::{
    FeatureVector, FinancialSnapshot, MarketEvent, PipelineError, Sentiment, SentimentTally,
};

pub const FEATURE_DEBT_TO_EQUITY: &str = "debt_to_equity";
pub const FEATURE_CURRENT_RATIO: &str = "current_ratio";
pub const FEATURE_OPERATING_MARGIN: &str = "operating_margin";
pub const FEATURE_RETURN_ON_ASSETS: &str = "return_on_assets";

pub struct FeatureComposer;

impl FeatureComposer {
    pub fn new() -> Self {
        Self
    }

    /// Ratio with the substitution rule: a missing numerator counts as 0,
    /// a missing or zero denominator counts as 1. Division never fails and
    /// never produces a non-finite value downstream.
    fn ratio(&self, numerator: Option<f64>, denominator: Option<f64>) -> f64 {
        let num = numerator.unwrap_or(0.0);
        let den = match denominator {
            Some(d) if d != 0.0 => d,
            _ => 1.0,
        };
        num / den
    }

    /// Compose the feature vector for the most recent period.
    ///
    /// Missing individual fields degrade via the substitution rule; only a
    /// snapshot that is unusable as a whole is an error.
    pub fn compose(
        &self,
        snapshot: Option<&FinancialSnapshot>,
        events: &[MarketEvent],
    ) -> Result<(FeatureVector, SentimentTally), PipelineError> {
        let snapshot = snapshot.ok_or_else(|| {
            PipelineError::InsufficientData("no usable financial period".to_string())
        })?;

        let mut features = FeatureVector::new();
        features.insert(
            FEATURE_DEBT_TO_EQUITY,
            self.ratio(snapshot.total_debt, snapshot.stockholder_equity),
        );
        features.insert(
            FEATURE_CURRENT_RATIO,
            self.ratio(snapshot.current_assets, snapshot.current_liabilities),
        );
        features.insert(
            FEATURE_OPERATING_MARGIN,
            self.ratio(snapshot.operating_income, snapshot.revenue),
        );
        features.insert(
            FEATURE_RETURN_ON_ASSETS,
            self.ratio(snapshot.net_income, snapshot.total_assets),
        );

        let tally = sentiment_tally(events);
        tracing::debug!(
            symbol = %snapshot.symbol,
            tally,
            "composed feature vector from {} events",
            events.len()
        );

        Ok((features, tally))
    }
}

impl Default for FeatureComposer {
    fn default() -> Self {
        Self::new()
    }
}

/// Net positive-minus-negative count over the event list. Neutral events
/// are ignored here; the explanation layer still reports them.
pub fn sentiment_tally(events: &[MarketEvent]) -> SentimentTally {
    events
        .iter()
        .map(|e| match e.sentiment {
            Sentiment::Positive => 1,
            Sentiment::Negative => -1,
            Sentiment::Neutral => 0,
        })
        .sum()
}
