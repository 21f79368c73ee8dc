//! Trained binary classifier behind the pipeline's scoring stage.
//!
//! The concrete algorithm is a CART decision tree; everything the pipeline
//! touches goes through the `ScoringModel` trait, so any substitute
//! classifier with the same capability set drops in without contract changes.

mod artifact;
mod tree;

pub use artifact::{ScoringArtifact, ARTIFACT_FORMAT_VERSION};
pub use tree::{DecisionTree, TreeConfig, TreeNode};

use chrono::Utc;
use credit_core::{FeatureVector, PipelineError, ScoringModel};
use std::collections::BTreeMap;
use std::path::Path;

/// Decision threshold on the tree's positive-class probability.
const POSITIVE_LABEL_THRESHOLD: f64 = 0.5;

/// A trained credit classifier plus its persisted state. Training and
/// persistence live here; inference goes through `ScoringModel`.
#[derive(Debug, Clone)]
pub struct CreditClassifier {
    artifact: ScoringArtifact,
}

impl CreditClassifier {
    /// Train a new classifier. The column ordering of `rows` (named by
    /// `feature_names`) becomes the artifact's fixed feature ordering.
    /// Non-finite training values are normalized to 0 before fitting.
    pub fn train(
        config: TreeConfig,
        feature_names: Vec<String>,
        rows: &[Vec<f64>],
        labels: &[u8],
    ) -> Result<Self, PipelineError> {
        if feature_names.is_empty() {
            return Err(PipelineError::Model(
                "training requires at least one feature".to_string(),
            ));
        }
        if rows.is_empty() {
            return Err(PipelineError::Model(
                "training requires at least one sample".to_string(),
            ));
        }
        if rows.len() != labels.len() {
            return Err(PipelineError::Model(format!(
                "{} samples but {} labels",
                rows.len(),
                labels.len()
            )));
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != feature_names.len()) {
            return Err(PipelineError::Model(format!(
                "sample width {} does not match {} feature names",
                bad.len(),
                feature_names.len()
            )));
        }
        if let Some(&bad) = labels.iter().find(|&&l| l > 1) {
            return Err(PipelineError::Model(format!(
                "labels must be 0 or 1, got {bad}"
            )));
        }

        let clean: Vec<Vec<f64>> = rows
            .iter()
            .map(|r| {
                r.iter()
                    .map(|&v| if v.is_finite() { v } else { 0.0 })
                    .collect()
            })
            .collect();

        let baseline = column_means(&clean, feature_names.len());

        let mut tree = DecisionTree::new(config.clone());
        tree.fit(&clean, labels);

        tracing::info!(
            samples = rows.len(),
            features = feature_names.len(),
            "trained credit classifier"
        );

        Ok(Self {
            artifact: ScoringArtifact {
                format_version: ARTIFACT_FORMAT_VERSION,
                trained_at: Utc::now(),
                feature_names,
                baseline,
                config,
                tree,
            },
        })
    }

    /// Persist the artifact as a single JSON document.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.artifact)
            .map_err(|e| PipelineError::Model(format!("artifact serialization: {e}")))?;
        std::fs::write(path, json)
            .map_err(|e| PipelineError::Model(format!("write {}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "saved scoring artifact");
        Ok(())
    }

    /// Load a persisted artifact. A missing file is `ArtifactNotFound`,
    /// which callers must treat as fatal: no scoring without a model.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::ArtifactNotFound(path.display().to_string()));
        }
        let json = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Model(format!("read {}: {e}", path.display())))?;
        let artifact: ScoringArtifact = serde_json::from_str(&json)
            .map_err(|e| PipelineError::Model(format!("artifact parse: {e}")))?;
        artifact.validate().map_err(PipelineError::Model)?;
        tracing::info!(
            path = %path.display(),
            features = artifact.feature_names.len(),
            "loaded scoring artifact"
        );
        Ok(Self { artifact })
    }

    pub fn from_artifact(artifact: ScoringArtifact) -> Result<Self, PipelineError> {
        artifact.validate().map_err(PipelineError::Model)?;
        Ok(Self { artifact })
    }

    pub fn artifact(&self) -> &ScoringArtifact {
        &self.artifact
    }

    /// Training accuracy over an already-ordered sample matrix.
    pub fn accuracy(&self, rows: &[Vec<f64>], labels: &[u8]) -> f64 {
        if rows.is_empty() {
            return 0.0;
        }
        let correct = rows
            .iter()
            .zip(labels)
            .filter(|(row, &label)| {
                let proba = self.artifact.tree.predict_proba(row);
                let predicted = (proba >= POSITIVE_LABEL_THRESHOLD) as u8;
                predicted == label
            })
            .count();
        correct as f64 / rows.len() as f64
    }
}

impl ScoringModel for CreditClassifier {
    fn feature_names(&self) -> &[String] {
        &self.artifact.feature_names
    }

    fn predict(&self, features: &FeatureVector) -> Result<u8, PipelineError> {
        if features.len() != self.artifact.feature_names.len() {
            return Err(PipelineError::Model(format!(
                "feature vector has {} keys, model expects {}",
                features.len(),
                self.artifact.feature_names.len()
            )));
        }
        let ordered = features
            .ordered_values(&self.artifact.feature_names)
            .ok_or_else(|| {
                PipelineError::Model(format!(
                    "feature vector keys do not match trained features [{}]",
                    self.artifact.feature_names.join(", ")
                ))
            })?;

        let proba = self.artifact.tree.predict_proba(&ordered);
        Ok((proba >= POSITIVE_LABEL_THRESHOLD) as u8)
    }

    fn decision_function(&self, values: &[f64]) -> Option<f64> {
        Some(self.artifact.tree.predict_proba(values))
    }

    fn feature_importance(&self) -> Option<BTreeMap<String, f64>> {
        let importances = self.artifact.tree.feature_importances();
        if importances.len() != self.artifact.feature_names.len() {
            return None;
        }
        Some(
            self.artifact
                .feature_names
                .iter()
                .cloned()
                .zip(importances.iter().copied())
                .collect(),
        )
    }

    fn baseline(&self) -> Vec<f64> {
        self.artifact.baseline.clone()
    }
}

fn column_means(rows: &[Vec<f64>], n_features: usize) -> Vec<f64> {
    let mut means = vec![0.0; n_features];
    if rows.is_empty() {
        return means;
    }
    for row in rows {
        for (m, &v) in means.iter_mut().zip(row) {
            *m += v;
        }
    }
    for m in &mut means {
        *m /= rows.len() as f64;
    }
    means
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained() -> CreditClassifier {
        let names = vec![
            "debt_to_equity".to_string(),
            "current_ratio".to_string(),
            "operating_margin".to_string(),
            "return_on_assets".to_string(),
        ];
        // Healthy companies (label 1): low leverage, liquid, profitable
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
        CreditClassifier::train(TreeConfig::default(), names, &rows, &labels).unwrap()
    }

    fn vector(values: [f64; 4]) -> FeatureVector {
        let mut fv = FeatureVector::new();
        fv.insert("debt_to_equity", values[0]);
        fv.insert("current_ratio", values[1]);
        fv.insert("operating_margin", values[2]);
        fv.insert("return_on_assets", values[3]);
        fv
    }

    #[test]
    fn predicts_learned_classes() {
        let model = trained();
        assert_eq!(model.predict(&vector([0.5, 1.8, 0.12, 0.06])).unwrap(), 1);
        assert_eq!(model.predict(&vector([2.9, 0.7, -0.09, -0.03])).unwrap(), 0);
    }

    #[test]
    fn predict_rejects_mismatched_keys() {
        let model = trained();
        let mut fv = FeatureVector::new();
        fv.insert("debt_to_equity", 0.5);
        fv.insert("current_ratio", 1.8);
        fv.insert("operating_margin", 0.12);
        fv.insert("unknown_feature", 1.0);
        assert!(matches!(
            model.predict(&fv),
            Err(PipelineError::Model(_))
        ));

        let mut short = FeatureVector::new();
        short.insert("debt_to_equity", 0.5);
        assert!(matches!(
            model.predict(&short),
            Err(PipelineError::Model(_))
        ));
    }

    #[test]
    fn predict_is_deterministic() {
        let model = trained();
        let fv = vector([1.1, 1.2, 0.04, 0.01]);
        let first = model.predict(&fv).unwrap();
        for _ in 0..10 {
            assert_eq!(model.predict(&fv).unwrap(), first);
        }
    }

    #[test]
    fn importance_covers_trained_features() {
        let model = trained();
        let imps = model.feature_importance().unwrap();
        assert_eq!(imps.len(), 4);
        for name in model.feature_names() {
            assert!(imps.contains_key(name));
        }
        assert!((imps.values().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn save_load_round_trip_preserves_outputs() {
        let model = trained();
        let mut path = std::env::temp_dir();
        path.push(format!("credit-artifact-{}.json", std::process::id()));

        model.save(&path).unwrap();
        let reloaded = CreditClassifier::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let probes = [
            [0.5, 1.8, 0.12, 0.06],
            [2.9, 0.7, -0.09, -0.03],
            [1.5, 1.2, 0.03, 0.01],
        ];
        for probe in probes {
            let fv = vector(probe);
            assert_eq!(
                model.predict(&fv).unwrap(),
                reloaded.predict(&fv).unwrap()
            );
            assert_eq!(
                model.decision_function(&probe),
                reloaded.decision_function(&probe)
            );
        }
        assert_eq!(model.feature_importance(), reloaded.feature_importance());
        assert_eq!(model.baseline(), reloaded.baseline());
    }

    #[test]
    fn load_missing_artifact_is_not_found() {
        let err = CreditClassifier::load("/nonexistent/model.json").unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactNotFound(_)));
    }

    #[test]
    fn train_normalizes_non_finite_values() {
        let names = vec!["a".to_string(), "b".to_string()];
        let rows = vec![
            vec![f64::NAN, 1.0],
            vec![f64::INFINITY, 2.0],
            vec![1.0, 3.0],
            vec![1.0, 4.0],
        ];
        let labels = vec![0, 0, 1, 1];
        let model = CreditClassifier::train(TreeConfig::default(), names, &rows, &labels).unwrap();
        for v in model.baseline() {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn train_rejects_bad_shapes() {
        let names = vec!["a".to_string()];
        assert!(CreditClassifier::train(TreeConfig::default(), names.clone(), &[], &[]).is_err());
        assert!(CreditClassifier::train(
            TreeConfig::default(),
            names.clone(),
            &[vec![1.0, 2.0]],
            &[1]
        )
        .is_err());
        assert!(CreditClassifier::train(
            TreeConfig::default(),
            names,
            &[vec![1.0]],
            &[2]
        )
        .is_err());
    }
}
