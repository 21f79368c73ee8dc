use crate::{FeatureVector, FinancialSnapshot, MarketEvent, PipelineError};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Source of structured financial statements.
/// `Ok(None)` means the company has no usable filing — a valid outcome,
/// distinct from a fetch error.
#[async_trait]
pub trait FinancialsProvider: Send + Sync {
    async fn latest_snapshot(
        &self,
        symbol: &str,
    ) -> Result<Option<FinancialSnapshot>, PipelineError>;
}

/// Source of classified news events, most recent first.
/// An empty list is a valid outcome.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn recent_events(
        &self,
        symbol: &str,
        limit: u32,
    ) -> Result<Vec<MarketEvent>, PipelineError>;
}

/// Inference surface of a trained binary classifier. Any concrete algorithm
/// is substitutable behind this trait without changing the pipeline contract;
/// training and persistence stay on the concrete type since loading returns
/// an instance.
pub trait ScoringModel: Send + Sync {
    /// The feature ordering fixed at training time.
    fn feature_names(&self) -> &[String];

    /// Binary label for one feature vector. The vector's key set must match
    /// the trained feature names exactly; values are reordered internally.
    fn predict(&self, features: &FeatureVector) -> Result<u8, PipelineError>;

    /// Continuous decision value (probability of label 1) for values already
    /// laid out in the trained ordering. `None` if the underlying algorithm
    /// exposes no continuous output.
    fn decision_function(&self, values: &[f64]) -> Option<f64>;

    /// Engine-global feature ranking, `None` if the algorithm exposes no
    /// importance signal.
    fn feature_importance(&self) -> Option<BTreeMap<String, f64>>;

    /// Reference input used as the attribution baseline, in the trained
    /// ordering. Defaults to all zeros.
    fn baseline(&self) -> Vec<f64> {
        vec![0.0; self.feature_names().len()]
    }
}
