//! Regression analysis.
//!
//! Ordinary least squares for straight lines and polynomials of any degree,
//! with fitted values, residuals, R² and (for lines) Pearson's r.
//!
//! Coefficients are stored lowest power first: `[β₀, β₁, …, β_d]` for
//! ŷ = β₀ + β₁x + … + β_d x^d.
//!
//! # Examples
//!
//! ```
//! use u_inference::data::Sample;
//! use u_inference::regression::linear_regression;
//!
//! let x = Sample::new(vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
//! let y = Sample::new(vec![2.1, 3.9, 6.1, 7.9, 10.1]).unwrap();
//! let model = linear_regression(&x, &y).unwrap();
//! assert!((model.coefficients[1] - 2.0).abs() < 1e-10);
//! assert!(model.r_squared > 0.99);
//! assert_eq!(model.equation(), "y = 2.0000x + 0.0200");
//! ```

use crate::data::Sample;
use crate::error::{InferenceError, Result};
use crate::linalg::{qr_least_squares, Matrix};

/// Which fit produced a [`RegressionModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum RegressionKind {
    Linear,
    Polynomial,
}

/// A fitted least-squares model. Immutable after fitting.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct RegressionModel {
    /// Fit that produced the model.
    pub kind: RegressionKind,
    /// Polynomial degree (1 for a line).
    pub degree: usize,
    /// Coefficients, lowest power first.
    pub coefficients: Vec<f64>,
    /// ŷᵢ, index-aligned with the training inputs.
    pub fitted: Vec<f64>,
    /// yᵢ − ŷᵢ, index-aligned with the training inputs.
    pub residuals: Vec<f64>,
    /// Coefficient of determination 1 − SS_res/SS_tot.
    pub r_squared: f64,
    /// Pearson correlation of x and y. Linear fits only; `None` when y is
    /// constant.
    pub correlation: Option<f64>,
}

impl RegressionModel {
    /// Evaluates the fitted polynomial at `x` (Horner's scheme).
    pub fn predict(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * x + c)
    }

    /// Evaluates the fitted polynomial at every point of `xs`.
    pub fn predict_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.predict(x)).collect()
    }

    /// Intercept β₀.
    pub fn intercept(&self) -> f64 {
        self.coefficients[0]
    }

    /// Renders the model as `y = …`, highest power first, four decimals.
    ///
    /// ```
    /// # use u_inference::regression::{RegressionKind, RegressionModel};
    /// let m = RegressionModel {
    ///     kind: RegressionKind::Polynomial,
    ///     degree: 2,
    ///     coefficients: vec![0.25, -3.0, 1.5],
    ///     fitted: vec![],
    ///     residuals: vec![],
    ///     r_squared: 1.0,
    ///     correlation: None,
    /// };
    /// assert_eq!(m.equation(), "y = 1.5000x^2 - 3.0000x + 0.2500");
    /// ```
    pub fn equation(&self) -> String {
        let mut out = String::from("y = ");
        for (power, &c) in self.coefficients.iter().enumerate().rev() {
            let rounded = format!("{:.4}", c.abs());
            let negative = c < 0.0 && rounded != "0.0000";
            let first = power + 1 == self.coefficients.len();
            match (first, negative) {
                (true, true) => out.push('-'),
                (true, false) => {}
                (false, true) => out.push_str(" - "),
                (false, false) => out.push_str(" + "),
            }
            out.push_str(&rounded);
            match power {
                0 => {}
                1 => out.push('x'),
                p => out.push_str(&format!("x^{p}")),
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Fitting
// ---------------------------------------------------------------------------

/// Simple linear regression y = β₀ + β₁x (OLS closed form).
///
/// # Algorithm
///
/// β₁ = Sxy / Sxx, β₀ = ȳ − β₁x̄, r = Sxy / √(Sxx·Syy).
///
/// # Errors
///
/// - [`InferenceError::Validation`] if `x` and `y` differ in length or
///   have fewer than 2 points.
/// - [`InferenceError::Computation`] if `x` is constant.
///
/// # References
///
/// Draper & Smith (1998). "Applied Regression Analysis", 3rd edition.
pub fn linear_regression(x: &Sample, y: &Sample) -> Result<RegressionModel> {
    check_pairs(x, y, 2)?;
    let xm = x.mean();
    let ym = y.mean();
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for (&xi, &yi) in x.values().iter().zip(y.values()) {
        let dx = xi - xm;
        let dy = yi - ym;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    if sxx == 0.0 {
        return Err(InferenceError::computation(
            "x has zero variance; the slope is undefined",
        ));
    }
    let slope = sxy / sxx;
    let intercept = ym - slope * xm;
    let correlation = (syy > 0.0).then(|| (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0));

    let model = finish(
        RegressionKind::Linear,
        1,
        vec![intercept, slope],
        x,
        y,
        correlation,
    )?;
    log::trace!("linear fit: {} (R² = {:.6})", model.equation(), model.r_squared);
    Ok(model)
}

/// Least-squares polynomial of the given degree.
///
/// # Algorithm
///
/// Builds the n × (d+1) Vandermonde matrix Vᵢⱼ = xᵢʲ and solves
/// min ‖Vβ − y‖₂ by Householder QR.
///
/// # Errors
///
/// - [`InferenceError::Config`] if `degree` is 0.
/// - [`InferenceError::Validation`] if the lengths differ or there are
///   fewer than `degree + 1` points.
/// - [`InferenceError::Computation`] if the design matrix is singular
///   (fewer distinct x values than coefficients).
///
/// # Examples
///
/// ```
/// use u_inference::data::Sample;
/// use u_inference::regression::polynomial_regression;
///
/// let x = Sample::new((0..6).map(f64::from).collect()).unwrap();
/// let y = Sample::new(x.values().iter().map(|v| v * v - 2.0 * v + 1.0).collect()).unwrap();
/// let model = polynomial_regression(&x, &y, 2).unwrap();
/// assert!((model.coefficients[2] - 1.0).abs() < 1e-9);
/// assert!((model.r_squared - 1.0).abs() < 1e-12);
/// ```
pub fn polynomial_regression(x: &Sample, y: &Sample, degree: usize) -> Result<RegressionModel> {
    if degree == 0 {
        return Err(InferenceError::config("polynomial degree must be at least 1"));
    }
    check_pairs(x, y, degree + 1)?;

    let n = x.len();
    let cols = degree + 1;
    let mut design = Vec::with_capacity(n * cols);
    for &xi in x.values() {
        let mut p = 1.0;
        for _ in 0..cols {
            design.push(p);
            p *= xi;
        }
    }
    crate::data::ensure_finite(&design, "design matrix")?;
    let coefficients = qr_least_squares(&Matrix::new(n, cols, design)?, y.values())?;

    let model = finish(RegressionKind::Polynomial, degree, coefficients, x, y, None)?;
    log::trace!(
        "degree {degree} fit: {} (R² = {:.6})",
        model.equation(),
        model.r_squared
    );
    Ok(model)
}

fn check_pairs(x: &Sample, y: &Sample, min_points: usize) -> Result<()> {
    if x.len() != y.len() {
        return Err(InferenceError::validation(format!(
            "x and y must have the same length ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    if x.len() < min_points {
        return Err(InferenceError::validation(format!(
            "need at least {min_points} points to fit {} coefficients, got {}",
            min_points,
            x.len()
        )));
    }
    Ok(())
}

fn finish(
    kind: RegressionKind,
    degree: usize,
    coefficients: Vec<f64>,
    x: &Sample,
    y: &Sample,
    correlation: Option<f64>,
) -> Result<RegressionModel> {
    let mut model = RegressionModel {
        kind,
        degree,
        coefficients,
        fitted: Vec::new(),
        residuals: Vec::new(),
        r_squared: 0.0,
        correlation,
    };
    model.fitted = model.predict_many(x.values());
    model.residuals = y
        .values()
        .iter()
        .zip(&model.fitted)
        .map(|(yi, fi)| yi - fi)
        .collect();
    model.r_squared = r_squared(y, &model.residuals)?;
    Ok(model)
}

// R² = 1 − SS_res / SS_tot. A constant response is explained perfectly
// only when every residual vanishes.
fn r_squared(y: &Sample, residuals: &[f64]) -> Result<f64> {
    let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
    let first = y.values()[0];
    if y.values().iter().all(|&v| v == first) {
        let tol = 1e-12 * first.abs().max(1.0);
        return if residuals.iter().all(|r| r.abs() <= tol) {
            Ok(1.0)
        } else {
            Err(InferenceError::computation(
                "y is constant but the fit leaves non-zero residuals; R² is undefined",
            ))
        };
    }
    let ym = y.mean();
    let ss_tot: f64 = y.values().iter().map(|&v| (v - ym).powi(2)).sum();
    Ok(1.0 - ss_res / ss_tot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &[f64]) -> Sample {
        Sample::try_from(v).expect("valid sample")
    }

    fn line() -> (Sample, Sample) {
        let x: Vec<f64> = (1..=6).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        (s(&x), s(&y))
    }

    #[test]
    fn exact_line() {
        let (x, y) = line();
        let m = linear_regression(&x, &y).expect("should compute");
        assert_eq!(m.kind, RegressionKind::Linear);
        assert!((m.coefficients[0] - 1.0).abs() < 1e-12);
        assert!((m.coefficients[1] - 2.0).abs() < 1e-12);
        assert!((m.r_squared - 1.0).abs() < 1e-12);
        assert!(m.residuals.iter().all(|r| r.abs() < 1e-12));
        assert!((m.correlation.unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(m.equation(), "y = 2.0000x + 1.0000");
    }

    #[test]
    fn linear_and_degree_one_agree() {
        let (x, y) = line();
        let lin = linear_regression(&x, &y).unwrap();
        let poly = polynomial_regression(&x, &y, 1).unwrap();
        assert_eq!(poly.kind, RegressionKind::Polynomial);
        assert!(poly.correlation.is_none());
        for (a, b) in lin.coefficients.iter().zip(&poly.coefficients) {
            assert!((a - b).abs() < 1e-10, "{a} vs {b}");
        }
        assert!((poly.r_squared - 1.0).abs() < 1e-12);
        assert!(poly.residuals.iter().all(|r| r.abs() < 1e-10));
    }

    #[test]
    fn predict_reproduces_fitted() {
        let x = s(&[0.5, 1.7, 2.2, 3.9, 4.1, 6.0, 7.3]);
        let y = s(&[1.2, 0.4, 2.9, 3.3, 5.8, 4.9, 8.1]);
        for degree in 1..=3 {
            let m = polynomial_regression(&x, &y, degree).unwrap();
            assert_eq!(m.predict_many(x.values()), m.fitted);
        }
        let m = linear_regression(&x, &y).unwrap();
        assert_eq!(m.predict_many(x.values()), m.fitted);
    }

    #[test]
    fn quadratic_recovery() {
        let x = s(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = s(&x
            .values()
            .iter()
            .map(|v| 1.5 * v * v - 3.0 * v + 0.25)
            .collect::<Vec<_>>());
        let m = polynomial_regression(&x, &y, 2).unwrap();
        assert!((m.coefficients[0] - 0.25).abs() < 1e-9);
        assert!((m.coefficients[1] + 3.0).abs() < 1e-9);
        assert!((m.coefficients[2] - 1.5).abs() < 1e-9);
        assert_eq!(m.equation(), "y = 1.5000x^2 - 3.0000x + 0.2500");
        assert!((m.predict(10.0) - 120.25).abs() < 1e-6);
    }

    #[test]
    fn noisy_line() {
        let x = s(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = s(&[2.1, 3.9, 6.1, 7.9, 10.1]);
        let m = linear_regression(&x, &y).unwrap();
        assert!((m.coefficients[1] - 2.0).abs() < 1e-10);
        assert!((m.intercept() - 0.02).abs() < 1e-10);
        assert!(m.r_squared > 0.99 && m.r_squared < 1.0);
        let sum: f64 = m.residuals.iter().sum();
        assert!(sum.abs() < 1e-10);
    }

    #[test]
    fn negative_leading_coefficient() {
        let x = s(&[0.0, 1.0, 2.0]);
        let y = s(&[1.0, -1.0, -3.0]);
        let m = linear_regression(&x, &y).unwrap();
        assert_eq!(m.equation(), "y = -2.0000x + 1.0000");
    }

    #[test]
    fn constant_response() {
        let m = linear_regression(&s(&[1.0, 2.0, 3.0]), &s(&[4.0, 4.0, 4.0])).unwrap();
        assert_eq!(m.r_squared, 1.0);
        assert!(m.correlation.is_none());
        assert_eq!(m.coefficients[1], 0.0);
    }

    #[test]
    fn fit_errors() {
        let x = s(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            linear_regression(&x, &s(&[1.0, 2.0])),
            Err(InferenceError::Validation(_))
        ));
        assert!(matches!(
            linear_regression(&s(&[1.0]), &s(&[1.0])),
            Err(InferenceError::Validation(_))
        ));
        assert!(matches!(
            linear_regression(&s(&[2.0, 2.0, 2.0]), &x),
            Err(InferenceError::Computation(_))
        ));
        assert!(matches!(
            polynomial_regression(&x, &x, 0),
            Err(InferenceError::Config(_))
        ));
        assert!(matches!(
            polynomial_regression(&x, &x, 3),
            Err(InferenceError::Validation(_))
        ));
        assert!(matches!(
            polynomial_regression(&s(&[1.0, 1.0, 2.0, 2.0]), &s(&[1.0, 2.0, 3.0, 4.0]), 2),
            Err(InferenceError::Computation(_))
        ));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn residuals_sum_to_zero(
            pts in proptest::collection::vec((-10.0f64..10.0, -10.0f64..10.0), 3..=30),
        ) {
            let (xs, ys): (Vec<f64>, Vec<f64>) = pts.into_iter().unzip();
            let x = Sample::new(xs).unwrap();
            let y = Sample::new(ys).unwrap();
            if x.variance().unwrap() > 1e-6 {
                let m = linear_regression(&x, &y).unwrap();
                let sum: f64 = m.residuals.iter().sum();
                prop_assert!(sum.abs() < 1e-8, "Σr = {}", sum);
                prop_assert!(m.r_squared <= 1.0 + 1e-12);
                if let Some(r) = m.correlation {
                    prop_assert!((r * r - m.r_squared).abs() < 1e-8);
                }
            }
        }
    }
}
