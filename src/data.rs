//! Validated input containers.
//!
//! Raw slices are checked once, here, for emptiness, finiteness and shape.
//! Downstream engines accept these types and never re-validate them.
//!
//! # Examples
//!
//! ```
//! use u_inference::data::{ContingencyTable, Sample};
//!
//! let s = Sample::new(vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
//! assert_eq!(s.len(), 5);
//! assert!((s.mean() - 3.0).abs() < 1e-12);
//! assert!(Sample::new(vec![]).is_err());
//! assert!(Sample::new(vec![1.0, f64::NAN]).is_err());
//!
//! let t = ContingencyTable::new(vec![vec![10, 20], vec![30, 40]]).unwrap();
//! assert_eq!(t.grand_total(), 100);
//! assert!(ContingencyTable::new(vec![vec![1, 2], vec![3]]).is_err());
//! ```

use u_numflow::stats;

use crate::error::{InferenceError, Result};

// ---------------------------------------------------------------------------
// Sample
// ---------------------------------------------------------------------------

/// Non-empty ordered sequence of finite real numbers.
///
/// The mean is computed once at construction; the variance is computed
/// from the stored values on every call.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "Vec<f64>", into = "Vec<f64>")
)]
pub struct Sample {
    values: Vec<f64>,
    mean: f64,
}

impl Sample {
    /// Wraps `values` after checking it is non-empty and entirely finite.
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(InferenceError::validation("sample cannot be empty"));
        }
        ensure_finite(&values, "sample")?;
        let mean = stats::mean(&values)
            .ok_or_else(|| InferenceError::validation("sample mean is undefined"))?;
        Ok(Self { values, mean })
    }

    /// Observations in input order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of observations (always ≥ 1).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always `false`; kept for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Arithmetic mean (compensated summation).
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance with the n−1 divisor (Welford's algorithm).
    ///
    /// `None` for a single observation.
    pub fn variance(&self) -> Option<f64> {
        stats::variance(&self.values).map(|v| v.max(0.0))
    }

    /// Sample standard deviation (√ of [`variance`](Self::variance)).
    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }

    /// Smallest observation.
    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Largest observation.
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Copy of the observations in non-decreasing order.
    pub fn sorted(&self) -> Vec<f64> {
        let mut v = self.values.clone();
        v.sort_by(f64::total_cmp);
        v
    }
}

impl TryFrom<Vec<f64>> for Sample {
    type Error = InferenceError;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Self::new(values)
    }
}

impl TryFrom<&[f64]> for Sample {
    type Error = InferenceError;

    fn try_from(values: &[f64]) -> Result<Self> {
        Self::new(values.to_vec())
    }
}

impl From<Sample> for Vec<f64> {
    fn from(s: Sample) -> Self {
        s.values
    }
}

impl AsRef<[f64]> for Sample {
    fn as_ref(&self) -> &[f64] {
        &self.values
    }
}

// ---------------------------------------------------------------------------
// Contingency table
// ---------------------------------------------------------------------------

/// Rectangular grid of non-negative integer counts (row-major).
///
/// The grand total must fit in a `u64`, so every marginal total does too.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "Vec<Vec<u64>>", into = "Vec<Vec<u64>>")
)]
pub struct ContingencyTable {
    counts: Vec<u64>,
    n_rows: usize,
    n_cols: usize,
    grand_total: u64,
}

impl ContingencyTable {
    /// Builds a table from rows. Every row must have the same, non-zero
    /// length and there must be at least one row.
    pub fn new(rows: Vec<Vec<u64>>) -> Result<Self> {
        let n_rows = rows.len();
        if n_rows == 0 {
            return Err(InferenceError::validation(
                "contingency table must have at least one row",
            ));
        }
        let n_cols = rows[0].len();
        if n_cols == 0 {
            return Err(InferenceError::validation(
                "contingency table rows cannot be empty",
            ));
        }
        if let Some(i) = rows.iter().position(|r| r.len() != n_cols) {
            return Err(InferenceError::validation(format!(
                "all rows in contingency table must have the same length \
                 (row 0 has {n_cols}, row {i} has {})",
                rows[i].len()
            )));
        }
        let counts: Vec<u64> = rows.into_iter().flatten().collect();
        let grand_total = counts
            .iter()
            .try_fold(0u64, |acc, &c| acc.checked_add(c))
            .ok_or_else(|| {
                InferenceError::validation("contingency table total overflows a 64-bit count")
            })?;
        Ok(Self {
            counts,
            n_rows,
            n_cols,
            grand_total,
        })
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Count at (`row`, `col`).
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn get(&self, row: usize, col: usize) -> u64 {
        assert!(row < self.n_rows && col < self.n_cols, "index out of range");
        self.counts[row * self.n_cols + col]
    }

    /// Iterator over rows as slices.
    pub fn rows(&self) -> impl Iterator<Item = &[u64]> {
        self.counts.chunks_exact(self.n_cols)
    }

    /// Row marginal totals.
    pub fn row_totals(&self) -> Vec<u64> {
        self.rows().map(|r| r.iter().sum()).collect()
    }

    /// Column marginal totals.
    pub fn col_totals(&self) -> Vec<u64> {
        let mut totals = vec![0u64; self.n_cols];
        for row in self.rows() {
            for (t, &c) in totals.iter_mut().zip(row) {
                *t += c;
            }
        }
        totals
    }

    /// Sum of all cells.
    pub fn grand_total(&self) -> u64 {
        self.grand_total
    }
}

impl TryFrom<Vec<Vec<u64>>> for ContingencyTable {
    type Error = InferenceError;

    fn try_from(rows: Vec<Vec<u64>>) -> Result<Self> {
        Self::new(rows)
    }
}

impl From<ContingencyTable> for Vec<Vec<u64>> {
    fn from(t: ContingencyTable) -> Self {
        t.counts.chunks_exact(t.n_cols).map(<[u64]>::to_vec).collect()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Rejects NaN and ±∞, naming the offending position.
pub(crate) fn ensure_finite(values: &[f64], what: &str) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(InferenceError::validation(format!(
            "{what} must contain only finite numbers (index {i} is {})",
            values[i]
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_rejects_empty_and_non_finite() {
        assert!(matches!(
            Sample::new(vec![]),
            Err(InferenceError::Validation(_))
        ));
        assert!(Sample::new(vec![1.0, f64::INFINITY]).is_err());
        assert!(Sample::new(vec![f64::NAN]).is_err());
    }

    #[test]
    fn sample_moments() {
        let s = Sample::new(vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert!((s.mean() - 3.0).abs() < 1e-12);
        assert!((s.variance().unwrap() - 2.5).abs() < 1e-12);
        assert_eq!(s.min(), 1.0);
        assert_eq!(s.max(), 5.0);
    }

    #[test]
    fn single_observation_has_no_variance() {
        let s = Sample::new(vec![42.0]).unwrap();
        assert!(s.variance().is_none());
        assert!(s.std_dev().is_none());
        assert_eq!(s.mean(), 42.0);
    }

    #[test]
    fn mean_survives_cancellation() {
        let s = Sample::new(vec![1e100, 3.0, -1e100]).unwrap();
        assert_eq!(s.mean(), 1.0);
    }

    #[test]
    fn table_marginals() {
        let t = ContingencyTable::new(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.n_cols(), 3);
        assert_eq!(t.row_totals(), vec![6, 15]);
        assert_eq!(t.col_totals(), vec![5, 7, 9]);
        assert_eq!(t.grand_total(), 21);
        assert_eq!(t.get(1, 2), 6);
    }

    #[test]
    fn table_total_overflow_is_rejected() {
        let r = ContingencyTable::new(vec![vec![u64::MAX, 1], vec![0, 0]]);
        assert!(matches!(r, Err(InferenceError::Validation(_))));
        let r = ContingencyTable::new(vec![vec![u64::MAX / 2], vec![u64::MAX / 2 + 1]]);
        assert_eq!(r.unwrap().grand_total(), u64::MAX);
    }

    #[test]
    fn table_converts_back_to_rows() {
        let rows = vec![vec![1, 2, 3], vec![4, 5, 6]];
        let t = ContingencyTable::try_from(rows.clone()).unwrap();
        assert_eq!(Vec::<Vec<u64>>::from(t), rows);
        assert!(ContingencyTable::try_from(vec![vec![1], vec![]]).is_err());
    }

    #[test]
    fn table_shape_errors() {
        assert!(ContingencyTable::new(vec![]).is_err());
        assert!(ContingencyTable::new(vec![vec![]]).is_err());
        assert!(ContingencyTable::new(vec![vec![1, 2], vec![3]]).is_err());
    }
}
