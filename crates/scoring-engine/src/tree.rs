//! CART-style binary classification tree: Gini impurity, midpoint threshold
//! candidates, gain-weighted feature importances.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Fitting hyperparameters. The seed makes split-candidate ordering
/// reproducible; inference never touches randomness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Maximum features to consider per split (None = all).
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_split: 4,
            min_samples_leaf: 2,
            max_features: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    /// Split feature index; None for leaves.
    pub feature_idx: Option<usize>,
    pub threshold: Option<f64>,
    /// Fraction of positive-label samples that reached this node.
    pub positive_prob: f64,
    pub n_samples: usize,
    pub impurity: f64,
    pub left: Option<Box<TreeNode>>,
    pub right: Option<Box<TreeNode>>,
}

impl TreeNode {
    fn leaf(positive_prob: f64, n_samples: usize, impurity: f64) -> Self {
        Self {
            feature_idx: None,
            threshold: None,
            positive_prob,
            n_samples,
            impurity,
            left: None,
            right: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    config: TreeConfig,
    root: Option<TreeNode>,
    feature_importances: Vec<f64>,
}

impl DecisionTree {
    pub fn new(config: TreeConfig) -> Self {
        Self {
            config,
            root: None,
            feature_importances: Vec::new(),
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    /// Fit on a dense sample matrix. `rows` are samples in the fixed feature
    /// ordering, `labels` are 0/1.
    pub fn fit(&mut self, rows: &[Vec<f64>], labels: &[u8]) {
        let n_features = rows.first().map(|r| r.len()).unwrap_or(0);
        self.feature_importances = vec![0.0; n_features];

        let indices: Vec<usize> = (0..rows.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.root = Some(self.build(rows, labels, &indices, 0, &mut rng));

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }
    }

    fn build(
        &mut self,
        rows: &[Vec<f64>],
        labels: &[u8],
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n = indices.len();
        let positive_prob = positive_fraction(labels, indices);
        let impurity = gini(positive_prob);

        if depth >= self.config.max_depth || n < self.config.min_samples_split || impurity < 1e-10
        {
            return TreeNode::leaf(positive_prob, n, impurity);
        }

        match self.find_best_split(rows, labels, indices, impurity, rng) {
            Some(split) => {
                if split.left.len() < self.config.min_samples_leaf
                    || split.right.len() < self.config.min_samples_leaf
                {
                    return TreeNode::leaf(positive_prob, n, impurity);
                }

                self.feature_importances[split.feature_idx] += split.importance;

                let left = self.build(rows, labels, &split.left, depth + 1, rng);
                let right = self.build(rows, labels, &split.right, depth + 1, rng);

                TreeNode {
                    feature_idx: Some(split.feature_idx),
                    threshold: Some(split.threshold),
                    positive_prob,
                    n_samples: n,
                    impurity,
                    left: Some(Box::new(left)),
                    right: Some(Box::new(right)),
                }
            }
            None => TreeNode::leaf(positive_prob, n, impurity),
        }
    }

    fn find_best_split(
        &self,
        rows: &[Vec<f64>],
        labels: &[u8],
        indices: &[usize],
        parent_impurity: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<Split> {
        let n_features = rows.first().map(|r| r.len()).unwrap_or(0);
        let max_features = self.config.max_features.unwrap_or(n_features);

        let mut feature_indices: Vec<usize> = (0..n_features).collect();
        feature_indices.shuffle(rng);
        feature_indices.truncate(max_features);
        // Deterministic tie-breaking across runs regardless of shuffle order
        feature_indices.sort_unstable();

        let mut best_gain = 0.0;
        let mut best: Option<Split> = None;

        for &feature_idx in &feature_indices {
            let mut values: Vec<f64> = indices.iter().map(|&i| rows[i][feature_idx]).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            values.dedup();

            for window in values.windows(2) {
                let threshold = (window[0] + window[1]) / 2.0;

                let (left, right): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| rows[i][feature_idx] <= threshold);

                if left.is_empty() || right.is_empty() {
                    continue;
                }

                let left_impurity = gini(positive_fraction(labels, &left));
                let right_impurity = gini(positive_fraction(labels, &right));

                let n_left = left.len() as f64;
                let n_right = right.len() as f64;
                let weighted = (n_left * left_impurity + n_right * right_impurity)
                    / (n_left + n_right);
                let gain = parent_impurity - weighted;

                if gain > best_gain {
                    best_gain = gain;
                    best = Some(Split {
                        feature_idx,
                        threshold,
                        importance: gain * indices.len() as f64,
                        left,
                        right,
                    });
                }
            }
        }

        best
    }

    /// Probability of label 1 for one sample in the trained ordering.
    /// NaN comparisons fall to the left branch, the conservative side.
    pub fn predict_proba(&self, values: &[f64]) -> f64 {
        let mut node = match &self.root {
            Some(root) => root,
            None => return 0.0,
        };

        loop {
            if node.is_leaf() {
                return node.positive_prob;
            }
            let feature_idx = node.feature_idx.unwrap_or(0);
            let threshold = node.threshold.unwrap_or(0.0);
            let value = values.get(feature_idx).copied().unwrap_or(f64::NAN);

            let next = if value.is_nan() || value <= threshold {
                node.left.as_deref()
            } else {
                node.right.as_deref()
            };
            match next {
                Some(child) => node = child,
                None => return node.positive_prob,
            }
        }
    }

    /// Normalized total Gini gain per feature, in the trained ordering.
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

struct Split {
    feature_idx: usize,
    threshold: f64,
    importance: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

fn positive_fraction(labels: &[u8], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    let positives = indices.iter().filter(|&&i| labels[i] == 1).count();
    positives as f64 / indices.len() as f64
}

fn gini(p: f64) -> f64 {
    2.0 * p * (1.0 - p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_data() -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..50 {
            let x = i as f64 / 10.0;
            rows.push(vec![x, 1.0]);
            labels.push(if x > 2.5 { 1 } else { 0 });
        }
        (rows, labels)
    }

    #[test]
    fn fits_separable_data() {
        let (rows, labels) = separable_data();
        let mut tree = DecisionTree::new(TreeConfig::default());
        tree.fit(&rows, &labels);

        assert!(tree.is_fitted());
        assert!(tree.predict_proba(&[4.0, 1.0]) > 0.5);
        assert!(tree.predict_proba(&[1.0, 1.0]) < 0.5);
    }

    #[test]
    fn importances_normalize_and_favor_split_feature() {
        let (rows, labels) = separable_data();
        let mut tree = DecisionTree::new(TreeConfig::default());
        tree.fit(&rows, &labels);

        let imps = tree.feature_importances();
        assert_eq!(imps.len(), 2);
        let total: f64 = imps.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        // The constant second feature carries no gain
        assert!(imps[0] > imps[1]);
        assert_eq!(imps[1], 0.0);
    }

    #[test]
    fn deterministic_across_refits() {
        let (rows, labels) = separable_data();
        let mut a = DecisionTree::new(TreeConfig::default());
        let mut b = DecisionTree::new(TreeConfig::default());
        a.fit(&rows, &labels);
        b.fit(&rows, &labels);

        for x in [0.0, 1.3, 2.5, 3.7, 4.9] {
            assert_eq!(a.predict_proba(&[x, 1.0]), b.predict_proba(&[x, 1.0]));
        }
    }

    #[test]
    fn nan_input_falls_left() {
        let (rows, labels) = separable_data();
        let mut tree = DecisionTree::new(TreeConfig::default());
        tree.fit(&rows, &labels);

        // Left branch holds the low-x (label 0) samples
        assert!(tree.predict_proba(&[f64::NAN, 1.0]) < 0.5);
    }

    #[test]
    fn unfitted_tree_returns_zero() {
        let tree = DecisionTree::new(TreeConfig::default());
        assert_eq!(tree.predict_proba(&[1.0]), 0.0);
    }
}
