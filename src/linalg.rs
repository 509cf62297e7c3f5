//! Dense-matrix helpers over [`u_numflow::matrix::Matrix`].
//!
//! Validated construction from feature rows, a Householder QR
//! least-squares solver, and the few element-wise operations the networks
//! need on top of the products `u-numflow` already provides.
//!
//! # Examples
//!
//! ```
//! use u_inference::linalg::{matrix_from_rows, qr_least_squares};
//!
//! // y = 1 + 2x
//! let a = matrix_from_rows(&[vec![1.0, 0.0], vec![1.0, 1.0], vec![1.0, 2.0]]).unwrap();
//! let beta = qr_least_squares(&a, &[1.0, 3.0, 5.0]).unwrap();
//! assert!((beta[0] - 1.0).abs() < 1e-12);
//! assert!((beta[1] - 2.0).abs() < 1e-12);
//! ```

pub use u_numflow::matrix::Matrix;

use crate::error::{InferenceError, Result};

/// Builds a matrix from equally long, non-empty, finite rows.
pub fn matrix_from_rows(rows: &[Vec<f64>]) -> Result<Matrix> {
    let cols = rows.first().map_or(0, Vec::len);
    if rows.is_empty() || cols == 0 {
        return Err(InferenceError::validation(format!(
            "matrix must be non-empty, got {}×{cols}",
            rows.len()
        )));
    }
    if let Some(i) = rows.iter().position(|r| r.len() != cols) {
        return Err(InferenceError::validation(format!(
            "all rows must have the same length (row 0 has {cols}, row {i} has {})",
            rows[i].len()
        )));
    }
    let data = rows.concat();
    crate::data::ensure_finite(&data, "matrix")?;
    Ok(Matrix::new(rows.len(), cols, data)?)
}

/// Least-squares solution of `a · β ≈ y` via Householder QR.
///
/// Requires `rows ≥ cols`. Returns a computation error if `a` is
/// numerically rank deficient.
///
/// # Algorithm
///
/// Reduces `[A | y]` to `[R | Qᵀy]` with `cols` Householder reflections,
/// then back-substitutes `Rβ = (Qᵀy)[..cols]`. Works on the design matrix
/// directly, so the conditioning is that of `A` rather than `AᵀA`.
///
/// # References
///
/// Golub & Van Loan (2013). "Matrix Computations", 4th ed., §5.3.
pub fn qr_least_squares(a: &Matrix, y: &[f64]) -> Result<Vec<f64>> {
    let (m, n) = (a.rows(), a.cols());
    if y.len() != m {
        return Err(InferenceError::validation(format!(
            "right-hand side has {} entries, expected {m}",
            y.len()
        )));
    }
    if m < n {
        return Err(InferenceError::validation(format!(
            "underdetermined system: {m} equations for {n} unknowns"
        )));
    }

    let mut r = a.data().to_vec();
    let mut b = y.to_vec();
    let scale = r.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let tol = f64::EPSILON * (m.max(n) as f64) * scale.max(1.0) * 16.0;

    for k in 0..n {
        let norm = (k..m).map(|i| r[i * n + k].powi(2)).sum::<f64>().sqrt();
        if norm <= tol {
            return Err(InferenceError::computation(format!(
                "design matrix is singular (column {k} is linearly dependent)"
            )));
        }
        let alpha = if r[k * n + k] > 0.0 { -norm } else { norm };

        // v = x - alpha e1
        let mut v: Vec<f64> = (k..m).map(|i| r[i * n + k]).collect();
        v[0] -= alpha;
        let v_norm_sq: f64 = v.iter().map(|x| x * x).sum();
        if v_norm_sq == 0.0 {
            continue;
        }

        for j in k..n {
            let s: f64 = (k..m).zip(&v).map(|(i, vi)| vi * r[i * n + j]).sum();
            let f = 2.0 * s / v_norm_sq;
            for (i, vi) in (k..m).zip(&v) {
                r[i * n + j] -= f * vi;
            }
        }
        let s: f64 = (k..m).zip(&v).map(|(i, vi)| vi * b[i]).sum();
        let f = 2.0 * s / v_norm_sq;
        for (i, vi) in (k..m).zip(&v) {
            b[i] -= f * vi;
        }
    }

    let mut beta = vec![0.0; n];
    for k in (0..n).rev() {
        let diag = r[k * n + k];
        if diag.abs() <= tol {
            return Err(InferenceError::computation(
                "design matrix is singular (zero pivot in R)",
            ));
        }
        let tail: f64 = ((k + 1)..n).map(|j| r[k * n + j] * beta[j]).sum();
        beta[k] = (b[k] - tail) / diag;
    }
    Ok(beta)
}

// ---------------------------------------------------------------------------
// Element-wise operations
// ---------------------------------------------------------------------------

/// Adds `bias[j]` to every entry of column `j`.
pub(crate) fn add_row_vector(m: &Matrix, bias: &[f64]) -> Result<Matrix> {
    if bias.len() != m.cols() {
        return Err(InferenceError::computation(format!(
            "bias of length {} does not match {} columns",
            bias.len(),
            m.cols()
        )));
    }
    let data = m
        .data()
        .chunks_exact(m.cols())
        .flat_map(|row| row.iter().zip(bias).map(|(x, b)| x + b))
        .collect();
    Ok(Matrix::new(m.rows(), m.cols(), data)?)
}

/// Applies `f` to every entry.
pub(crate) fn map(m: &Matrix, f: impl Fn(f64) -> f64) -> Result<Matrix> {
    Ok(Matrix::new(m.rows(), m.cols(), m.data().iter().map(|&x| f(x)).collect())?)
}

/// Column sums.
pub(crate) fn column_sums(m: &Matrix) -> Vec<f64> {
    let mut sums = vec![0.0; m.cols()];
    for row in m.data().chunks_exact(m.cols().max(1)) {
        for (s, &x) in sums.iter_mut().zip(row) {
            *s += x;
        }
    }
    sums
}
