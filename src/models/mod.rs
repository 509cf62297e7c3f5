//! Predictive models.
//!
//! - [`NaiveBayes`] / [`GaussianNaiveBayes`]: probabilistic classifiers
//!   fitted in one pass.
//! - [`RandomForestRegressor`]: bagged CART regression trees.
//! - [`MlpRegressor`] / [`MlpClassifier`]: one-hidden-layer networks
//!   trained by full-batch gradient descent.
//!
//! All randomness is drawn from a `StdRng` seeded from the model
//! configuration, so a fit is a pure function of its inputs and seed.
//!
//! The iterative models follow an `Untrained → Training → Trained`
//! lifecycle (see [`ModelState`]). Predicting before a successful fit is a
//! validation error, and a failed or cancelled fit leaves the model
//! untrained.

mod forest;
mod naive_bayes;
mod network;

pub use forest::{ForestConfig, RandomForestRegressor};
pub use naive_bayes::{GaussianNaiveBayes, NaiveBayes, NaiveBayesConfig};
pub use network::{MlpClassifier, MlpRegressor, NetworkConfig};

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::{InferenceError, Result};
use crate::linalg::{matrix_from_rows, Matrix};

/// Lifecycle of an iteratively fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum ModelState {
    /// No parameters; predictions are rejected.
    #[default]
    Untrained,
    /// A fit is in progress.
    Training,
    /// Parameters are available.
    Trained,
}

/// Loss history of a network fit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct TrainingReport {
    /// Training loss measured at the start of each epoch, before its
    /// parameter update.
    pub losses: Vec<f64>,
}

impl TrainingReport {
    /// Loss of the last epoch.
    pub fn final_loss(&self) -> Option<f64> {
        self.losses.last().copied()
    }

    /// Number of completed epochs.
    pub fn epochs(&self) -> usize {
        self.losses.len()
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Validates a rectangular, finite, non-empty feature table.
pub(crate) fn feature_matrix(features: &[Vec<f64>]) -> Result<Matrix> {
    if features.is_empty() {
        return Err(InferenceError::validation("training data cannot be empty"));
    }
    if features[0].is_empty() {
        return Err(InferenceError::validation(
            "feature vectors must have at least one feature",
        ));
    }
    matrix_from_rows(features)
}

pub(crate) fn check_target_count(rows: usize, targets: usize) -> Result<()> {
    if rows != targets {
        return Err(InferenceError::validation(format!(
            "features and targets must have the same length ({rows} vs {targets})"
        )));
    }
    Ok(())
}

pub(crate) fn check_width(x: &[f64], expected: usize) -> Result<()> {
    if x.len() != expected {
        return Err(InferenceError::validation(format!(
            "feature vector has {} values, model was trained on {expected}",
            x.len()
        )));
    }
    crate::data::ensure_finite(x, "feature vector")
}

pub(crate) fn not_trained(model: &str) -> InferenceError {
    InferenceError::validation(format!("{model} must be trained before predicting"))
}

/// Distinct labels in first-seen order, and each label's index.
pub(crate) fn encode_labels<L: Clone + Eq + Hash>(labels: &[L]) -> (Vec<L>, Vec<usize>) {
    let mut classes = Vec::new();
    let mut lookup: HashMap<&L, usize> = HashMap::new();
    let indices = labels
        .iter()
        .map(|label| {
            *lookup.entry(label).or_insert_with(|| {
                classes.push(label.clone());
                classes.len() - 1
            })
        })
        .collect();
    (classes, indices)
}

/// Index of the largest value; the first one wins ties.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Normalizes log-scores into probabilities (log-sum-exp).
///
/// Fails when no score is finite, since the normalizer is then undefined.
pub(crate) fn softmax_in_place(scores: &mut [f64]) -> Result<()> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() || scores.iter().any(|s| s.is_nan()) {
        return Err(InferenceError::computation(
            "no class has a finite log-likelihood for this input",
        ));
    }
    let mut total = 0.0;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        total += *s;
    }
    for s in scores.iter_mut() {
        *s /= total;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_in_first_seen_order() {
        let (classes, idx) = encode_labels(&["b", "a", "b", "c", "a"]);
        assert_eq!(classes, vec!["b", "a", "c"]);
        assert_eq!(idx, vec![0, 1, 0, 2, 1]);
    }

    #[test]
    fn argmax_first_on_ties() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5, 0.1]), 1);
        assert_eq!(argmax(&[1.0]), 0);
    }

    #[test]
    fn softmax_normalizes() {
        let mut s = vec![1000.0, 1001.0, 999.0];
        softmax_in_place(&mut s).unwrap();
        assert!((s.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(s[1] > s[0] && s[0] > s[2]);

        let mut s = vec![f64::NEG_INFINITY, -3.0];
        softmax_in_place(&mut s).unwrap();
        assert_eq!(s, vec![0.0, 1.0]);
    }

    #[test]
    fn softmax_rejects_all_impossible() {
        let mut s = vec![f64::NEG_INFINITY, f64::NEG_INFINITY];
        assert!(matches!(
            softmax_in_place(&mut s),
            Err(InferenceError::Computation(_))
        ));
        let mut s = vec![0.0, f64::NAN];
        assert!(softmax_in_place(&mut s).is_err());
    }

    #[test]
    fn feature_table_validation() {
        assert!(feature_matrix(&[]).is_err());
        assert!(feature_matrix(&[vec![]]).is_err());
        assert!(feature_matrix(&[vec![1.0, 2.0], vec![1.0]]).is_err());
        assert!(feature_matrix(&[vec![1.0, f64::NAN]]).is_err());
        let m = feature_matrix(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!((m.rows(), m.cols()), (2, 2));
    }

    #[test]
    fn report_accessors() {
        let r = TrainingReport {
            losses: vec![3.0, 2.0, 1.5],
        };
        assert_eq!(r.final_loss(), Some(1.5));
        assert_eq!(r.epochs(), 3);
        assert_eq!(ModelState::default(), ModelState::Untrained);
    }
}
