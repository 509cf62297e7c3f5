//! Bagged regression trees ("random forest").
//!
//! # Algorithm
//!
//! Each tree is a CART regression tree grown on a bootstrap resample of
//! the training rows. At every node a random subset of
//! ⌈`max_features` · p⌉ features is searched for the threshold that most
//! reduces the sum of squared errors; leaves predict the mean target of
//! their rows. The forest predicts the mean over trees.
//!
//! # References
//!
//! - Breiman et al. (1984). "Classification and Regression Trees".
//! - Breiman (2001). "Random Forests". *Machine Learning* 45, 5–32.
//!
//! # Examples
//!
//! ```
//! use u_inference::models::{ForestConfig, RandomForestRegressor};
//!
//! let features: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64 / 40.0]).collect();
//! let targets: Vec<f64> = features.iter().map(|x| if x[0] < 0.5 { 0.0 } else { 10.0 }).collect();
//!
//! let mut forest = RandomForestRegressor::new(ForestConfig::default()).unwrap();
//! forest.fit(&features, &targets).unwrap();
//! assert!(forest.predict(&[0.1]).unwrap() < 2.0);
//! assert!(forest.predict(&[0.9]).unwrap() > 8.0);
//! ```

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{check_target_count, check_width, feature_matrix, not_trained, ModelState};
use crate::error::{InferenceError, Result};
use crate::linalg::Matrix;

/// Forest hyperparameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct ForestConfig {
    /// Number of trees (≥ 1).
    pub n_estimators: usize,
    /// Fraction of features tried at each split, in (0, 1].
    pub max_features: f64,
    /// Resample rows with replacement for every tree.
    pub bootstrap: bool,
    /// Seed for bootstrap draws and feature subsampling.
    pub seed: u64,
    /// Maximum tree depth; `None` grows until leaves are pure or too small.
    pub max_depth: Option<usize>,
    /// Minimum rows a node needs to be split (≥ 2).
    pub min_samples_split: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 10,
            max_features: 0.3,
            bootstrap: true,
            seed: 42,
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

impl ForestConfig {
    /// Rejects out-of-range hyperparameters.
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(InferenceError::config("n_estimators must be at least 1"));
        }
        if !(self.max_features > 0.0 && self.max_features <= 1.0) {
            return Err(InferenceError::config(format!(
                "max_features must lie in (0, 1], got {}",
                self.max_features
            )));
        }
        if self.max_depth == Some(0) {
            return Err(InferenceError::config("max_depth must be at least 1"));
        }
        if self.min_samples_split < 2 {
            return Err(InferenceError::config("min_samples_split must be at least 2"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Arena-allocated tree; node 0 is the root.
#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict(&self, x: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes[id] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => id = if x[feature] <= threshold { left } else { right },
            }
        }
    }

    fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(0, 0)];
        while let Some((id, depth)) = pending.pop() {
            match self.nodes[id] {
                Node::Leaf { .. } => deepest = deepest.max(depth),
                Node::Split { left, right, .. } => {
                    pending.push((left, depth + 1));
                    pending.push((right, depth + 1));
                }
            }
        }
        deepest
    }

    fn leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

// Rows awaiting a node, plus the split (and side) that will point at it.
struct Pending {
    rows: Vec<usize>,
    depth: usize,
    parent: Option<(usize, bool)>,
}

struct TreeBuilder<'a> {
    x: &'a Matrix,
    y: &'a [f64],
    config: &'a ForestConfig,
    n_try: usize,
    nodes: Vec<Node>,
    importances: &'a mut [f64],
}

impl TreeBuilder<'_> {
    // Depth-first with an explicit stack, left subtree first, so node ids
    // and RNG draws follow preorder.
    fn grow(&mut self, rows: Vec<usize>, rng: &mut StdRng) {
        let mut pending = vec![Pending {
            rows,
            depth: 0,
            parent: None,
        }];
        while let Some(task) = pending.pop() {
            let id = self.node(task.rows, task.depth, &mut pending, rng);
            if let Some((parent, is_left)) = task.parent {
                if let Node::Split { left, right, .. } = &mut self.nodes[parent] {
                    if is_left {
                        *left = id;
                    } else {
                        *right = id;
                    }
                }
            }
        }
    }

    // Emits one node; a split queues its children and is linked to them
    // once they are emitted.
    fn node(
        &mut self,
        rows: Vec<usize>,
        depth: usize,
        pending: &mut Vec<Pending>,
        rng: &mut StdRng,
    ) -> usize {
        let mean = rows.iter().map(|&r| self.y[r]).sum::<f64>() / rows.len() as f64;
        let depth_reached = self.config.max_depth.is_some_and(|d| depth >= d);
        if depth_reached || rows.len() < self.config.min_samples_split {
            return self.leaf(mean);
        }
        let Some(split) = self.best_split(&rows, rng) else {
            return self.leaf(mean);
        };

        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| self.x.get(r, split.feature) <= split.threshold);
        if left.is_empty() || right.is_empty() {
            return self.leaf(mean);
        }
        self.importances[split.feature] += split.gain;

        self.nodes.push(Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: 0,
            right: 0,
        });
        let id = self.nodes.len() - 1;
        pending.push(Pending {
            rows: right,
            depth: depth + 1,
            parent: Some((id, false)),
        });
        pending.push(Pending {
            rows: left,
            depth: depth + 1,
            parent: Some((id, true)),
        });
        id
    }

    fn leaf(&mut self, value: f64) -> usize {
        self.nodes.push(Node::Leaf { value });
        self.nodes.len() - 1
    }

    // Largest SSE reduction over a random subset of features.
    fn best_split(&self, rows: &[usize], rng: &mut StdRng) -> Option<Split> {
        let n = rows.len() as f64;
        let (sum, sum_sq) = rows.iter().fold((0.0, 0.0), |(s, q), &r| {
            let v = self.y[r];
            (s + v, q + v * v)
        });
        let parent_sse = sum_sq - sum * sum / n;
        if parent_sse <= 0.0 {
            return None;
        }

        let mut features: Vec<usize> = (0..self.x.cols()).collect();
        features.shuffle(rng);
        features.truncate(self.n_try);

        let mut order = rows.to_vec();
        let mut best: Option<Split> = None;
        for &f in &features {
            order.sort_by(|&a, &b| self.x.get(a, f).total_cmp(&self.x.get(b, f)));
            let (mut left_sum, mut left_sq) = (0.0, 0.0);
            for i in 0..order.len() - 1 {
                let v = self.y[order[i]];
                left_sum += v;
                left_sq += v * v;
                let lo = self.x.get(order[i], f);
                let hi = self.x.get(order[i + 1], f);
                if lo == hi {
                    continue;
                }
                let nl = (i + 1) as f64;
                let nr = n - nl;
                let right_sum = sum - left_sum;
                let right_sq = sum_sq - left_sq;
                let child_sse = (left_sq - left_sum * left_sum / nl)
                    + (right_sq - right_sum * right_sum / nr);
                let gain = parent_sse - child_sse;
                if gain > best.as_ref().map_or(0.0, |b| b.gain) {
                    let mid = lo + 0.5 * (hi - lo);
                    best = Some(Split {
                        feature: f,
                        threshold: if mid < hi { mid } else { lo },
                        gain,
                    });
                }
            }
        }
        best
    }
}

// ---------------------------------------------------------------------------
// Forest
// ---------------------------------------------------------------------------

/// Ensemble of bootstrap-trained regression trees.
#[derive(Debug, Clone)]
pub struct RandomForestRegressor {
    config: ForestConfig,
    state: ModelState,
    trees: Vec<Tree>,
    n_features: usize,
    importances: Vec<f64>,
}

impl RandomForestRegressor {
    /// Creates an untrained forest.
    ///
    /// # Errors
    ///
    /// [`InferenceError::Config`] if the configuration is invalid.
    pub fn new(config: ForestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: ModelState::Untrained,
            trees: Vec::new(),
            n_features: 0,
            importances: Vec::new(),
        })
    }

    /// Hyperparameters.
    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ModelState {
        self.state
    }

    /// Number of fitted trees.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Grows `n_estimators` trees on `features` (rows) and `targets`.
    ///
    /// Refitting discards the previous ensemble.
    pub fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<()> {
        self.fit_with_cancel(features, targets, || false)
    }

    /// Like [`fit`](Self::fit), but polls `should_stop` before each tree
    /// and aborts with [`InferenceError::Cancelled`] when it returns
    /// `true`.
    pub fn fit_with_cancel(
        &mut self,
        features: &[Vec<f64>],
        targets: &[f64],
        mut should_stop: impl FnMut() -> bool,
    ) -> Result<()> {
        self.reset();
        self.state = ModelState::Training;
        match self.grow_forest(features, targets, &mut should_stop) {
            Ok(()) => {
                self.state = ModelState::Trained;
                Ok(())
            }
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    fn reset(&mut self) {
        self.state = ModelState::Untrained;
        self.trees.clear();
        self.importances.clear();
        self.n_features = 0;
    }

    fn grow_forest(
        &mut self,
        features: &[Vec<f64>],
        targets: &[f64],
        should_stop: &mut impl FnMut() -> bool,
    ) -> Result<()> {
        let x = feature_matrix(features)?;
        check_target_count(x.rows(), targets.len())?;
        crate::data::ensure_finite(targets, "targets")?;

        let (n, p) = (x.rows(), x.cols());
        let n_try = ((self.config.max_features * p as f64).ceil() as usize).clamp(1, p);
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut importances = vec![0.0; p];
        let mut trees = Vec::with_capacity(self.config.n_estimators);

        for t in 0..self.config.n_estimators {
            if should_stop() {
                log::debug!("forest fit cancelled after {t} trees");
                return Err(InferenceError::Cancelled);
            }
            let rows: Vec<usize> = if self.config.bootstrap {
                (0..n).map(|_| rng.random_range(0..n)).collect()
            } else {
                (0..n).collect()
            };
            let mut builder = TreeBuilder {
                x: &x,
                y: targets,
                config: &self.config,
                n_try,
                nodes: Vec::new(),
                importances: &mut importances,
            };
            builder.grow(rows, &mut rng);
            let tree = Tree {
                nodes: builder.nodes,
            };
            log::trace!(
                "tree {t}: {} nodes, {} leaves, depth {}",
                tree.nodes.len(),
                tree.leaves(),
                tree.depth()
            );
            trees.push(tree);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for v in &mut importances {
                *v /= total;
            }
        }
        log::debug!("forest trained: {} trees on {n} rows × {p} features", trees.len());
        self.trees = trees;
        self.importances = importances;
        self.n_features = p;
        Ok(())
    }

    /// Mean prediction over all trees.
    pub fn predict(&self, x: &[f64]) -> Result<f64> {
        if self.state != ModelState::Trained {
            return Err(not_trained("random forest"));
        }
        check_width(x, self.n_features)?;
        let sum: f64 = self.trees.iter().map(|t| t.predict(x)).sum();
        Ok(sum / self.trees.len() as f64)
    }

    /// Predicts every row of `xs`.
    pub fn predict_many(&self, xs: &[Vec<f64>]) -> Result<Vec<f64>> {
        xs.iter().map(|x| self.predict(x)).collect()
    }

    /// Total SSE reduction credited to each feature, normalized to sum
    /// to 1 (all zeros if no split was ever made).
    pub fn feature_importances(&self) -> Result<&[f64]> {
        if self.state != ModelState::Trained {
            return Err(not_trained("random forest"));
        }
        Ok(&self.importances)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn predictions_within_target_range(
            rows in proptest::collection::vec((-10.0f64..10.0, -10.0f64..10.0, -5.0f64..5.0), 2..40),
        ) {
            let x: Vec<Vec<f64>> = rows.iter().map(|&(a, b, _)| vec![a, b]).collect();
            let y: Vec<f64> = rows.iter().map(|&(_, _, t)| t).collect();
            let mut f = RandomForestRegressor::new(ForestConfig::default()).unwrap();
            f.fit(&x, &y).unwrap();
            let lo = y.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            for xi in &x {
                let p = f.predict(xi).unwrap();
                prop_assert!(p >= lo - 1e-9 && p <= hi + 1e-9);
            }
        }
    }
}
