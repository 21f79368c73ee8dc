//! Persisted unit of a trained classifier: the tree, its fixed feature
//! ordering, and the training baseline used for attribution. Created by the
//! offline trainer, loaded once at process start, read-only afterwards.

use crate::tree::{DecisionTree, TreeConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringArtifact {
    pub format_version: u32,
    pub trained_at: DateTime<Utc>,
    /// Column ordering of the training matrix. Every subsequent predict call
    /// is reindexed against this list.
    pub feature_names: Vec<String>,
    /// Per-feature training means, the attribution baseline.
    pub baseline: Vec<f64>,
    pub config: TreeConfig,
    pub tree: DecisionTree,
}

impl ScoringArtifact {
    /// Structural checks applied after deserialization, before the artifact
    /// is handed to the pipeline.
    pub fn validate(&self) -> Result<(), String> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(format!(
                "unsupported artifact format version {} (expected {})",
                self.format_version, ARTIFACT_FORMAT_VERSION
            ));
        }
        if self.feature_names.is_empty() {
            return Err("artifact has no feature names".to_string());
        }
        if self.baseline.len() != self.feature_names.len() {
            return Err(format!(
                "baseline length {} does not match {} feature names",
                self.baseline.len(),
                self.feature_names.len()
            ));
        }
        if !self.tree.is_fitted() {
            return Err("artifact tree is not fitted".to_string());
        }
        Ok(())
    }
}
