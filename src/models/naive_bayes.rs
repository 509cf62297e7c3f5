//! Naive Bayes classifiers.
//!
//! # Examples
//!
//! ```
//! use u_inference::models::{NaiveBayes, NaiveBayesConfig};
//!
//! let features = vec![vec!["sunny", "hot"], vec!["sunny", "mild"], vec!["rainy", "mild"]];
//! let labels = vec!["no", "no", "yes"];
//! let model = NaiveBayes::fit(&features, &labels, &NaiveBayesConfig::default()).unwrap();
//! assert_eq!(model.predict(&["sunny", "hot"]).unwrap(), &"no");
//! let p = model.predict_proba(&["rainy", "cool"]).unwrap();
//! assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
//! ```

use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;
use std::hash::Hash;

use u_numflow::stats;

use super::{argmax, check_target_count, check_width, encode_labels, softmax_in_place};
use crate::error::{InferenceError, Result};

/// Smoothing options for the naive Bayes classifiers.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct NaiveBayesConfig {
    /// Laplace pseudo-count added to every categorical value (> 0).
    pub alpha: f64,
    /// Fraction of the largest feature variance added to every Gaussian
    /// variance (> 0).
    pub var_smoothing: f64,
}

impl Default for NaiveBayesConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            var_smoothing: 1e-9,
        }
    }
}

impl NaiveBayesConfig {
    /// Checks that both smoothing terms are positive and finite.
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(InferenceError::config(format!(
                "alpha must be positive, got {}",
                self.alpha
            )));
        }
        if !(self.var_smoothing.is_finite() && self.var_smoothing > 0.0) {
            return Err(InferenceError::config(format!(
                "var_smoothing must be positive, got {}",
                self.var_smoothing
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Categorical
// ---------------------------------------------------------------------------

/// Categorical naive Bayes with Laplace smoothing.
///
/// P(xⱼ = v | c) = (count(c, j, v) + α) / (n_c + α(|Vⱼ| + 1)), where Vⱼ is
/// the set of values seen for feature j during training. The extra slot in
/// the denominator is the probability mass reserved for values never seen
/// in training, so an unknown value contributes α / (n_c + α(|Vⱼ| + 1))
/// instead of zero.
#[derive(Debug, Clone)]
pub struct NaiveBayes<V, L> {
    classes: Vec<L>,
    class_counts: Vec<u64>,
    log_priors: Vec<f64>,
    // [feature][class] -> value counts
    value_counts: Vec<Vec<HashMap<V, u64>>>,
    vocabulary: Vec<usize>,
    alpha: f64,
}

impl<V, L> NaiveBayes<V, L>
where
    V: Clone + Eq + Hash,
    L: Clone + Eq + Hash,
{
    /// Counts class and value frequencies from paired examples.
    ///
    /// # Errors
    ///
    /// - [`InferenceError::Validation`] for empty input, mismatched
    ///   lengths, empty or ragged feature vectors.
    /// - [`InferenceError::Config`] for a non-positive `alpha`.
    pub fn fit(features: &[Vec<V>], labels: &[L], config: &NaiveBayesConfig) -> Result<Self> {
        config.validate()?;
        let width = check_table(features)?;
        check_target_count(features.len(), labels.len())?;

        let (classes, label_idx) = encode_labels(labels);
        let k = classes.len();
        let mut class_counts = vec![0u64; k];
        let mut value_counts: Vec<Vec<HashMap<V, u64>>> = vec![vec![HashMap::new(); k]; width];
        let mut seen: Vec<HashSet<V>> = vec![HashSet::new(); width];

        for (row, &c) in features.iter().zip(&label_idx) {
            class_counts[c] += 1;
            for (j, v) in row.iter().enumerate() {
                *value_counts[j][c].entry(v.clone()).or_insert(0) += 1;
                seen[j].insert(v.clone());
            }
        }

        let n = features.len() as f64;
        let log_priors = class_counts.iter().map(|&c| (c as f64 / n).ln()).collect();
        log::debug!(
            "naive Bayes fitted: {} rows, {width} features, {k} classes",
            features.len()
        );
        Ok(Self {
            classes,
            class_counts,
            log_priors,
            value_counts,
            vocabulary: seen.iter().map(HashSet::len).collect(),
            alpha: config.alpha,
        })
    }

    /// Class labels in first-seen order.
    pub fn classes(&self) -> &[L] {
        &self.classes
    }

    /// Number of features per example.
    pub fn n_features(&self) -> usize {
        self.vocabulary.len()
    }

    /// Posterior probability of each class, aligned with
    /// [`classes`](Self::classes). Sums to 1.
    pub fn predict_proba(&self, x: &[V]) -> Result<Vec<f64>> {
        if x.len() != self.n_features() {
            return Err(InferenceError::validation(format!(
                "feature vector has {} values, model was trained on {}",
                x.len(),
                self.n_features()
            )));
        }
        let mut scores: Vec<f64> = (0..self.classes.len())
            .map(|c| {
                self.log_priors[c]
                    + x.iter()
                        .enumerate()
                        .map(|(j, v)| self.log_likelihood(j, c, v))
                        .sum::<f64>()
            })
            .collect();
        softmax_in_place(&mut scores)?;
        Ok(scores)
    }

    /// Most probable class; the first class in order wins ties.
    pub fn predict(&self, x: &[V]) -> Result<&L> {
        let p = self.predict_proba(x)?;
        Ok(&self.classes[argmax(&p)])
    }

    fn log_likelihood(&self, feature: usize, class: usize, value: &V) -> f64 {
        let count = self.value_counts[feature][class]
            .get(value)
            .copied()
            .unwrap_or(0) as f64;
        let slots = (self.vocabulary[feature] + 1) as f64;
        let denom = self.class_counts[class] as f64 + self.alpha * slots;
        ((count + self.alpha) / denom).ln()
    }
}

fn check_table<T>(features: &[Vec<T>]) -> Result<usize> {
    let width = features
        .first()
        .map(Vec::len)
        .ok_or_else(|| InferenceError::validation("training data cannot be empty"))?;
    if width == 0 {
        return Err(InferenceError::validation(
            "feature vectors must have at least one feature",
        ));
    }
    if let Some(i) = features.iter().position(|r| r.len() != width) {
        return Err(InferenceError::validation(format!(
            "all feature vectors must have the same length (row 0 has {width}, row {i} has {})",
            features[i].len()
        )));
    }
    Ok(width)
}

// ---------------------------------------------------------------------------
// Gaussian
// ---------------------------------------------------------------------------

/// Gaussian naive Bayes for real-valued features.
///
/// Each feature is modelled per class as N(μ_cj, σ²_cj + ε), with the
/// maximum-likelihood (divisor n_c) variance and ε = `var_smoothing` ×
/// the largest per-feature variance of the training data (or
/// `var_smoothing` alone when every feature is constant).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GaussianNaiveBayes<L> {
    classes: Vec<L>,
    log_priors: Vec<f64>,
    // [class][feature]
    means: Vec<Vec<f64>>,
    variances: Vec<Vec<f64>>,
}

impl<L: Clone + Eq + Hash> GaussianNaiveBayes<L> {
    /// Estimates per-class means and variances.
    ///
    /// # Errors
    ///
    /// - [`InferenceError::Validation`] for empty, ragged or non-finite
    ///   features, or mismatched lengths.
    /// - [`InferenceError::Config`] for a non-positive `var_smoothing`.
    pub fn fit(features: &[Vec<f64>], labels: &[L], config: &NaiveBayesConfig) -> Result<Self> {
        config.validate()?;
        let x = super::feature_matrix(features)?;
        check_target_count(x.rows(), labels.len())?;
        let (n, width) = (x.rows(), x.cols());

        let (classes, label_idx) = encode_labels(labels);
        let k = classes.len();
        let mut counts = vec![0usize; k];
        let mut means = vec![vec![0.0; width]; k];
        for (i, &c) in label_idx.iter().enumerate() {
            counts[c] += 1;
            for (m, &v) in means[c].iter_mut().zip(x.row(i)) {
                *m += v;
            }
        }
        for (row, &count) in means.iter_mut().zip(&counts) {
            for m in row.iter_mut() {
                *m /= count as f64;
            }
        }
        let mut variances = vec![vec![0.0; width]; k];
        for (i, &c) in label_idx.iter().enumerate() {
            for (j, &v) in x.row(i).iter().enumerate() {
                variances[c][j] += (v - means[c][j]).powi(2);
            }
        }

        let max_var = (0..width)
            .filter_map(|j| {
                let column: Vec<f64> = (0..n).map(|i| x.get(i, j)).collect();
                stats::population_variance(&column)
            })
            .fold(0.0_f64, f64::max);
        let epsilon = if max_var > 0.0 {
            config.var_smoothing * max_var
        } else {
            config.var_smoothing
        };
        for (row, &count) in variances.iter_mut().zip(&counts) {
            for v in row.iter_mut() {
                *v = *v / count as f64 + epsilon;
            }
        }

        let log_priors = counts
            .iter()
            .map(|&c| (c as f64 / n as f64).ln())
            .collect();
        log::debug!("Gaussian naive Bayes fitted: {n} rows, {width} features, {k} classes");
        Ok(Self {
            classes,
            log_priors,
            means,
            variances,
        })
    }

    /// Class labels in first-seen order.
    pub fn classes(&self) -> &[L] {
        &self.classes
    }

    /// Per-class feature means, aligned with [`classes`](Self::classes).
    pub fn means(&self) -> &[Vec<f64>] {
        &self.means
    }

    /// Posterior probability of each class. Sums to 1.
    pub fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>> {
        check_width(x, self.means[0].len())?;
        let mut scores: Vec<f64> = (0..self.classes.len())
            .map(|c| {
                let ll: f64 = x
                    .iter()
                    .zip(&self.means[c])
                    .zip(&self.variances[c])
                    .map(|((&v, &m), &var)| -0.5 * ((2.0 * PI * var).ln() + (v - m).powi(2) / var))
                    .sum();
                self.log_priors[c] + ll
            })
            .collect();
        softmax_in_place(&mut scores)?;
        Ok(scores)
    }

    /// Most probable class; the first class in order wins ties.
    pub fn predict(&self, x: &[f64]) -> Result<&L> {
        let p = self.predict_proba(x)?;
        Ok(&self.classes[argmax(&p)])
    }
}
