//! One-hidden-layer feed-forward networks.
//!
//! # Algorithm
//!
//! Full-batch gradient descent. Each epoch runs a forward pass over every
//! training row, records the loss, backpropagates
//!
//! ```text
//! δ₂ = ∂L/∂z₂
//! ∇W₂ = a₁ᵀ δ₂,          ∇b₂ = Σ δ₂
//! δ₁ = (δ₂ W₂ᵀ) ⊙ f'(z₁)
//! ∇W₁ = Xᵀ δ₁,           ∇b₁ = Σ δ₁
//! ```
//!
//! and steps every parameter by `-learning_rate · ∇`. Weights start from a
//! seeded Xavier-uniform draw, biases from zero.
//!
//! # Examples
//!
//! ```
//! use u_inference::models::{MlpRegressor, NetworkConfig};
//!
//! let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64 / 19.0]).collect();
//! let y: Vec<f64> = x.iter().map(|v| 2.0 * v[0] + 1.0).collect();
//!
//! let mut net = MlpRegressor::new(NetworkConfig::default()).unwrap();
//! let report = net.fit(&x, &y).unwrap();
//! assert_eq!(report.epochs(), 100);
//! assert!(report.final_loss().unwrap() < report.losses[0]);
//! ```

use std::hash::Hash;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{
    argmax, check_target_count, check_width, encode_labels, feature_matrix, not_trained,
    softmax_in_place, ModelState, TrainingReport,
};
use crate::error::{InferenceError, Result};
use crate::linalg::{add_row_vector, column_sums, map, Matrix};

/// Network hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct NetworkConfig {
    /// Hidden-layer width (≥ 1).
    pub hidden_size: usize,
    /// Gradient-descent step size (> 0).
    pub learning_rate: f64,
    /// Number of full passes over the training data (≥ 1).
    pub epochs: usize,
    /// Seed for weight initialization.
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hidden_size: 10,
            learning_rate: 0.01,
            epochs: 100,
            seed: 42,
        }
    }
}

impl NetworkConfig {
    /// Rejects out-of-range hyperparameters.
    pub fn validate(&self) -> Result<()> {
        if self.hidden_size == 0 {
            return Err(InferenceError::config("hidden_size must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(InferenceError::config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.epochs == 0 {
            return Err(InferenceError::config("epochs must be at least 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activation {
    Tanh,
    Relu,
}

impl Activation {
    fn apply(self, z: f64) -> f64 {
        match self {
            Activation::Tanh => z.tanh(),
            Activation::Relu => z.max(0.0),
        }
    }

    // Derivative in terms of the pre-activation z and activation a.
    fn derivative(self, z: f64, a: f64) -> f64 {
        match self {
            Activation::Tanh => 1.0 - a * a,
            Activation::Relu => {
                if z > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Layers {
    activation: Activation,
    w1: Matrix,
    b1: Vec<f64>,
    w2: Matrix,
    b2: Vec<f64>,
}

struct Forward {
    z1: Matrix,
    a1: Matrix,
    z2: Matrix,
}

impl Layers {
    fn init(
        inputs: usize,
        hidden: usize,
        outputs: usize,
        activation: Activation,
        seed: u64,
    ) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Ok(Self {
            activation,
            w1: xavier(inputs, hidden, &mut rng)?,
            b1: vec![0.0; hidden],
            w2: xavier(hidden, outputs, &mut rng)?,
            b2: vec![0.0; outputs],
        })
    }

    fn inputs(&self) -> usize {
        self.w1.rows()
    }

    fn forward(&self, x: &Matrix) -> Result<Forward> {
        let z1 = add_row_vector(&x.mul_mat(&self.w1)?, &self.b1)?;
        let act = self.activation;
        let a1 = map(&z1, |z| act.apply(z))?;
        let z2 = add_row_vector(&a1.mul_mat(&self.w2)?, &self.b2)?;
        Ok(Forward { z1, a1, z2 })
    }

    // One gradient step given δ₂ = ∂L/∂z₂.
    fn backward(&mut self, x: &Matrix, fwd: &Forward, delta2: &Matrix, lr: f64) -> Result<()> {
        let grad_w2 = fwd.a1.transpose().mul_mat(delta2)?;
        let grad_b2 = column_sums(delta2);

        let back = delta2.mul_mat(&self.w2.transpose())?;
        let act = self.activation;
        let delta1_data = back
            .data()
            .iter()
            .zip(fwd.z1.data())
            .zip(fwd.a1.data())
            .map(|((&d, &z), &a)| d * act.derivative(z, a))
            .collect();
        let delta1 = Matrix::new(back.rows(), back.cols(), delta1_data)?;
        let grad_w1 = x.transpose().mul_mat(&delta1)?;
        let grad_b1 = column_sums(&delta1);

        self.w2 = self.w2.sub(&grad_w2.scale(lr))?;
        step(&mut self.b2, &grad_b2, lr);
        self.w1 = self.w1.sub(&grad_w1.scale(lr))?;
        step(&mut self.b1, &grad_b1, lr);
        Ok(())
    }

    fn output(&self, x: &[f64]) -> Result<Vec<f64>> {
        let row = Matrix::new(1, x.len(), x.to_vec())?;
        Ok(self.forward(&row)?.z2.row(0).to_vec())
    }
}

// U(−√(6/(fan_in+fan_out)), +√(6/(fan_in+fan_out)))
fn xavier(fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Result<Matrix> {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    let weights = (0..fan_in * fan_out)
        .map(|_| rng.random_range(-limit..limit))
        .collect();
    Ok(Matrix::new(fan_in, fan_out, weights)?)
}

fn step(params: &mut [f64], grad: &[f64], lr: f64) {
    for (p, g) in params.iter_mut().zip(grad) {
        *p -= lr * g;
    }
}

/// Runs the epoch loop. `loss` maps the output pre-activations to the
/// batch loss and δ₂.
fn train(
    layers: &mut Layers,
    x: &Matrix,
    config: &NetworkConfig,
    should_stop: &mut impl FnMut() -> bool,
    loss: impl Fn(&Matrix) -> Result<(f64, Matrix)>,
) -> Result<TrainingReport> {
    let mut losses = Vec::with_capacity(config.epochs);
    for epoch in 0..config.epochs {
        if should_stop() {
            log::debug!("training cancelled at epoch {epoch}");
            return Err(InferenceError::Cancelled);
        }
        let fwd = layers.forward(x)?;
        let (value, delta2) = loss(&fwd.z2)?;
        if !value.is_finite() {
            return Err(InferenceError::computation(format!(
                "training diverged at epoch {epoch} (loss = {value}); \
                 try a smaller learning rate"
            )));
        }
        if epoch % 20 == 0 {
            log::debug!("epoch {epoch}, loss {value:.6}");
        }
        losses.push(value);
        layers.backward(x, &fwd, &delta2, config.learning_rate)?;
    }
    log::debug!(
        "training finished after {} epochs, loss {:.6}",
        losses.len(),
        losses.last().copied().unwrap_or(f64::NAN)
    );
    Ok(TrainingReport { losses })
}

// ---------------------------------------------------------------------------
// Regressor
// ---------------------------------------------------------------------------

/// Network regressor: tanh hidden layer, identity output, mean squared
/// error loss.
#[derive(Debug, Clone)]
pub struct MlpRegressor {
    config: NetworkConfig,
    state: ModelState,
    layers: Option<Layers>,
}

impl MlpRegressor {
    /// Creates an untrained regressor.
    pub fn new(config: NetworkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: ModelState::Untrained,
            layers: None,
        })
    }

    /// Hyperparameters.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ModelState {
        self.state
    }

    /// Trains on `features` (rows) and real-valued `targets`.
    ///
    /// # Errors
    ///
    /// - [`InferenceError::Validation`] for empty, ragged, non-finite or
    ///   mismatched input.
    /// - [`InferenceError::Computation`] if the loss becomes non-finite.
    pub fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<TrainingReport> {
        self.fit_with_cancel(features, targets, || false)
    }

    /// Like [`fit`](Self::fit), but polls `should_stop` before each epoch
    /// and aborts with [`InferenceError::Cancelled`] when it returns
    /// `true`.
    pub fn fit_with_cancel(
        &mut self,
        features: &[Vec<f64>],
        targets: &[f64],
        mut should_stop: impl FnMut() -> bool,
    ) -> Result<TrainingReport> {
        self.layers = None;
        self.state = ModelState::Training;
        let result = self.train_layers(features, targets, &mut should_stop);
        match result {
            Ok((layers, report)) => {
                self.layers = Some(layers);
                self.state = ModelState::Trained;
                Ok(report)
            }
            Err(e) => {
                self.state = ModelState::Untrained;
                Err(e)
            }
        }
    }

    fn train_layers(
        &self,
        features: &[Vec<f64>],
        targets: &[f64],
        should_stop: &mut impl FnMut() -> bool,
    ) -> Result<(Layers, TrainingReport)> {
        let x = feature_matrix(features)?;
        check_target_count(x.rows(), targets.len())?;
        crate::data::ensure_finite(targets, "targets")?;

        let c = &self.config;
        let mut layers = Layers::init(x.cols(), c.hidden_size, 1, Activation::Tanh, c.seed)?;
        let n = x.rows() as f64;
        let report = train(&mut layers, &x, c, should_stop, |z2| {
            let mut sse = 0.0;
            let delta = z2
                .data()
                .iter()
                .zip(targets)
                .map(|(&z, &t)| {
                    let e = z - t;
                    sse += e * e;
                    2.0 * e / n
                })
                .collect();
            Ok((sse / n, Matrix::new(z2.rows(), z2.cols(), delta)?))
        })?;
        Ok((layers, report))
    }

    /// Predicted value for one feature vector.
    pub fn predict(&self, x: &[f64]) -> Result<f64> {
        let layers = self.trained()?;
        check_width(x, layers.inputs())?;
        Ok(layers.output(x)?[0])
    }

    /// Predicts every row of `xs`.
    pub fn predict_many(&self, xs: &[Vec<f64>]) -> Result<Vec<f64>> {
        xs.iter().map(|x| self.predict(x)).collect()
    }

    fn trained(&self) -> Result<&Layers> {
        match (&self.layers, self.state) {
            (Some(layers), ModelState::Trained) => Ok(layers),
            _ => Err(not_trained("network regressor")),
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Network classifier: ReLU hidden layer, softmax output, cross-entropy
/// loss on one-hot labels. Output units follow the first-seen order of the
/// training labels.
#[derive(Debug, Clone)]
pub struct MlpClassifier<L> {
    config: NetworkConfig,
    state: ModelState,
    classes: Vec<L>,
    layers: Option<Layers>,
}

impl<L: Clone + Eq + Hash> MlpClassifier<L> {
    /// Creates an untrained classifier.
    pub fn new(config: NetworkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: ModelState::Untrained,
            classes: Vec::new(),
            layers: None,
        })
    }

    /// Hyperparameters.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ModelState {
        self.state
    }

    /// Class labels in first-seen order (empty until trained).
    pub fn classes(&self) -> &[L] {
        &self.classes
    }

    /// Trains on `features` (rows) and their labels.
    pub fn fit(&mut self, features: &[Vec<f64>], labels: &[L]) -> Result<TrainingReport> {
        self.fit_with_cancel(features, labels, || false)
    }

    /// Like [`fit`](Self::fit), but polls `should_stop` before each epoch
    /// and aborts with [`InferenceError::Cancelled`] when it returns
    /// `true`.
    pub fn fit_with_cancel(
        &mut self,
        features: &[Vec<f64>],
        labels: &[L],
        mut should_stop: impl FnMut() -> bool,
    ) -> Result<TrainingReport> {
        self.layers = None;
        self.classes.clear();
        self.state = ModelState::Training;
        match self.train_layers(features, labels, &mut should_stop) {
            Ok((classes, layers, report)) => {
                self.classes = classes;
                self.layers = Some(layers);
                self.state = ModelState::Trained;
                Ok(report)
            }
            Err(e) => {
                self.state = ModelState::Untrained;
                Err(e)
            }
        }
    }

    fn train_layers(
        &self,
        features: &[Vec<f64>],
        labels: &[L],
        should_stop: &mut impl FnMut() -> bool,
    ) -> Result<(Vec<L>, Layers, TrainingReport)> {
        let x = feature_matrix(features)?;
        check_target_count(x.rows(), labels.len())?;
        let (classes, idx) = encode_labels(labels);
        let k = classes.len();

        let c = &self.config;
        let mut layers = Layers::init(x.cols(), c.hidden_size, k, Activation::Relu, c.seed)?;
        let n = x.rows() as f64;
        let report = train(&mut layers, &x, c, should_stop, |z2| {
            let mut delta = z2.data().to_vec();
            let mut total = 0.0;
            for (row, &target) in delta.chunks_exact_mut(k).zip(&idx) {
                let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let log_sum = max + row.iter().map(|&z| (z - max).exp()).sum::<f64>().ln();
                total += log_sum - row[target];
                for (j, d) in row.iter_mut().enumerate() {
                    let p = (*d - log_sum).exp();
                    *d = (p - if j == target { 1.0 } else { 0.0 }) / n;
                }
            }
            Ok((total / n, Matrix::new(z2.rows(), z2.cols(), delta)?))
        })?;
        Ok((classes, layers, report))
    }

    /// Class probabilities for one feature vector, aligned with
    /// [`classes`](Self::classes).
    pub fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>> {
        let layers = self.trained()?;
        check_width(x, layers.inputs())?;
        let mut scores = layers.output(x)?;
        softmax_in_place(&mut scores)?;
        Ok(scores)
    }

    /// Most probable class.
    pub fn predict(&self, x: &[f64]) -> Result<&L> {
        let p = self.predict_proba(x)?;
        Ok(&self.classes[argmax(&p)])
    }

    fn trained(&self) -> Result<&Layers> {
        match (&self.layers, self.state) {
            (Some(layers), ModelState::Trained) => Ok(layers),
            _ => Err(not_trained("network classifier")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64 / 19.0]).collect();
        let y = x.iter().map(|v| 2.0 * v[0] + 1.0).collect();
        (x, y)
    }

    fn clusters() -> (Vec<Vec<f64>>, Vec<&'static str>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..10 {
            let (dx, dy) = (0.1 * (i % 5) as f64, 0.1 * (i / 5) as f64);
            x.push(vec![dx, dy]);
            y.push("low");
            x.push(vec![2.0 + dx, 2.0 + dy]);
            y.push("high");
        }
        (x, y)
    }

    #[test]
    fn config_validation() {
        let d = NetworkConfig::default();
        assert_eq!((d.hidden_size, d.epochs, d.seed), (10, 100, 42));
        assert_eq!(d.learning_rate, 0.01);
        for bad in [
            NetworkConfig { hidden_size: 0, ..d },
            NetworkConfig { learning_rate: 0.0, ..d },
            NetworkConfig { learning_rate: f64::NAN, ..d },
            NetworkConfig { epochs: 0, ..d },
        ] {
            assert!(matches!(MlpRegressor::new(bad), Err(InferenceError::Config(_))));
        }
    }

    #[test]
    fn regression_loss_is_non_increasing() {
        let (x, y) = line();
        let mut net = MlpRegressor::new(NetworkConfig::default()).unwrap();
        let report = net.fit(&x, &y).expect("should train");
        assert_eq!(report.epochs(), 100);
        for w in report.losses[5..].windows(2) {
            assert!(w[1] <= w[0] + 1e-12, "loss rose: {} -> {}", w[0], w[1]);
        }
        assert!(report.final_loss().unwrap() < report.losses[0]);
    }

    #[test]
    fn regression_fits_a_line() {
        let (x, y) = line();
        let mut net = MlpRegressor::new(NetworkConfig {
            learning_rate: 0.1,
            epochs: 500,
            ..NetworkConfig::default()
        })
        .unwrap();
        net.fit(&x, &y).unwrap();
        assert_eq!(net.state(), ModelState::Trained);
        let p = net.predict(&[0.5]).unwrap();
        assert!((p - 2.0).abs() < 0.15, "prediction {p}");
    }

    #[test]
    fn training_is_deterministic() {
        let (x, y) = line();
        let run = || {
            let mut net = MlpRegressor::new(NetworkConfig::default()).unwrap();
            let report = net.fit(&x, &y).unwrap();
            (report, net.predict_many(&[vec![0.25], vec![0.75]]).unwrap())
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn untrained_networks_reject_prediction() {
        let reg = MlpRegressor::new(NetworkConfig::default()).unwrap();
        assert_eq!(reg.state(), ModelState::Untrained);
        assert!(matches!(reg.predict(&[1.0]), Err(InferenceError::Validation(_))));
        let clf = MlpClassifier::<u8>::new(NetworkConfig::default()).unwrap();
        assert!(matches!(
            clf.predict_proba(&[1.0]),
            Err(InferenceError::Validation(_))
        ));
    }

    #[test]
    fn cancelled_fit_discards_parameters() {
        let (x, y) = line();
        let mut net = MlpRegressor::new(NetworkConfig::default()).unwrap();
        net.fit(&x, &y).unwrap();
        let mut epochs = 0;
        let err = net
            .fit_with_cancel(&x, &y, || {
                epochs += 1;
                epochs > 10
            })
            .unwrap_err();
        assert_eq!(err, InferenceError::Cancelled);
        assert_eq!(net.state(), ModelState::Untrained);
        assert!(net.predict(&[0.5]).is_err());
    }

    #[test]
    fn divergence_is_reported() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64 * 100.0]).collect();
        let y: Vec<f64> = (0..10).map(|i| i as f64 * 1e4).collect();
        let mut net = MlpRegressor::new(NetworkConfig {
            learning_rate: 10.0,
            epochs: 1000,
            ..NetworkConfig::default()
        })
        .unwrap();
        assert!(matches!(
            net.fit(&x, &y),
            Err(InferenceError::Computation(_))
        ));
        assert_eq!(net.state(), ModelState::Untrained);
    }

    #[test]
    fn classifier_learns_clusters() {
        let (x, y) = clusters();
        let mut clf = MlpClassifier::new(NetworkConfig {
            learning_rate: 0.1,
            epochs: 300,
            ..NetworkConfig::default()
        })
        .unwrap();
        let report = clf.fit(&x, &y).expect("should train");
        assert_eq!(clf.classes(), &["low", "high"]);
        assert!(report.final_loss().unwrap() < report.losses[0]);
        for w in report.losses[5..].windows(2) {
            assert!(w[1] <= w[0] + 1e-12);
        }
        for (xi, yi) in x.iter().zip(&y) {
            assert_eq!(clf.predict(xi).unwrap(), yi);
        }
        let p = clf.predict_proba(&[1.0, 1.0]).unwrap();
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn classifier_input_errors() {
        let mut clf = MlpClassifier::new(NetworkConfig::default()).unwrap();
        assert!(matches!(
            clf.fit(&[vec![1.0], vec![2.0]], &["a"]),
            Err(InferenceError::Validation(_))
        ));
        clf.fit(&[vec![1.0, 0.0], vec![0.0, 1.0]], &["a", "b"]).unwrap();
        assert!(matches!(clf.predict(&[1.0]), Err(InferenceError::Validation(_))));
        assert!(matches!(
            clf.predict(&[1.0, f64::INFINITY]),
            Err(InferenceError::Validation(_))
        ));
    }
}
