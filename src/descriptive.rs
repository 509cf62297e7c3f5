//! Descriptive statistics for a single sample.
//!
//! # Examples
//!
//! ```
//! use u_inference::data::Sample;
//! use u_inference::descriptive::describe;
//!
//! let s = Sample::new(vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
//! let d = describe(&s);
//! assert_eq!(d.count, 5);
//! assert!((d.mean - 3.0).abs() < 1e-12);
//! assert!((d.variance.unwrap() - 2.5).abs() < 1e-12);
//! assert!((d.q1 - 2.0).abs() < 1e-12);
//! assert!((d.iqr - 2.0).abs() < 1e-12);
//! ```

use std::collections::HashMap;

use u_numflow::stats;

use crate::data::Sample;
use crate::error::{InferenceError, Result};

/// Summary metrics of a sample.
///
/// Moments that are undefined for the sample size (or for a sample with
/// zero spread) are `None` instead of NaN.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DescriptiveStatistics {
    /// Number of observations.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Median (0.5 quantile).
    pub median: f64,
    /// Most frequent value; the first one encountered on ties.
    pub mode: f64,
    /// Sample standard deviation (n−1). `None` when n < 2.
    pub standard_deviation: Option<f64>,
    /// Sample variance (n−1). `None` when n < 2.
    pub variance: Option<f64>,
    /// Smallest value.
    pub minimum: f64,
    /// Largest value.
    pub maximum: f64,
    /// `maximum − minimum`.
    pub range: f64,
    /// First quartile (R-7 linear interpolation).
    pub q1: f64,
    /// Third quartile (R-7 linear interpolation).
    pub q3: f64,
    /// Interquartile range `q3 − q1`.
    pub iqr: f64,
    /// Bias-corrected sample skewness G₁. `None` when n < 3 or zero spread.
    pub skewness: Option<f64>,
    /// Sample excess kurtosis G₂. `None` when n < 4 or zero spread.
    pub kurtosis: Option<f64>,
}

/// Computes every summary metric of `sample`.
///
/// Cannot fail: a [`Sample`] is non-empty and finite by construction.
pub fn describe(sample: &Sample) -> DescriptiveStatistics {
    let sorted = sample.sorted();
    let count = sample.len();
    let variance = sample.variance();

    let minimum = sorted[0];
    let maximum = sorted[count - 1];
    // R-7 on a non-empty sorted slice with p in [0, 1] is always defined.
    let quartile = |p: f64| stats::quantile_sorted(&sorted, p).unwrap_or(minimum);
    let q1 = quartile(0.25);
    let q3 = quartile(0.75);

    DescriptiveStatistics {
        count,
        mean: sample.mean(),
        median: quartile(0.5),
        mode: mode(sample.values()),
        standard_deviation: variance.map(f64::sqrt),
        variance,
        minimum,
        maximum,
        range: maximum - minimum,
        q1,
        q3,
        iqr: q3 - q1,
        skewness: stats::skewness(sample.values()),
        kurtosis: stats::kurtosis(sample.values()),
    }
}

/// `p`-th quantile of pre-sorted data using the R-7 method.
///
/// # Algorithm
///
/// h = (n−1)·p, j = ⌊h⌋, g = h − j, result = (1−g)·x[j] + g·x[j+1].
///
/// # Errors
///
/// [`InferenceError::Validation`] if `sorted` is empty or `p` lies outside
/// [0, 1].
///
/// # References
///
/// Hyndman & Fan (1996), *The American Statistician* 50(4), pp. 361–365.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Result<f64> {
    if sorted.is_empty() {
        return Err(InferenceError::validation("quantile of empty data"));
    }
    stats::quantile_sorted(sorted, p).ok_or_else(|| {
        InferenceError::validation(format!("quantile level must lie in [0, 1], got {p}"))
    })
}

// First value reaching the highest frequency, in input order.
fn mode(values: &[f64]) -> f64 {
    let key = |v: f64| if v == 0.0 { 0.0_f64.to_bits() } else { v.to_bits() };
    let mut counts: HashMap<u64, usize> = HashMap::with_capacity(values.len());
    for &v in values {
        *counts.entry(key(v)).or_insert(0) += 1;
    }
    let mut best = values[0];
    let mut best_count = 0;
    for &v in values {
        let c = counts[&key(v)];
        if c > best_count {
            best = v;
            best_count = c;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(v: &[f64]) -> Sample {
        Sample::try_from(v).expect("valid sample")
    }

    #[test]
    fn one_through_five() {
        let d = describe(&sample(&[1.0, 2.0, 3.0, 4.0, 5.0]));
        assert_eq!(d.count, 5);
        assert!((d.mean - 3.0).abs() < 1e-12);
        assert!((d.median - 3.0).abs() < 1e-12);
        assert!((d.standard_deviation.unwrap() - 1.581_138_830_084_19).abs() < 1e-4);
        assert!((d.variance.unwrap() - 2.5).abs() < 1e-12);
        assert!(d.skewness.unwrap().abs() < 1e-12);
        assert!((d.kurtosis.unwrap() + 1.2).abs() < 1e-12);
        assert_eq!(d.q1, 2.0);
        assert_eq!(d.q3, 4.0);
        assert_eq!(d.iqr, 2.0);
        assert_eq!(d.minimum, 1.0);
        assert_eq!(d.maximum, 5.0);
        assert_eq!(d.range, 4.0);
    }

    #[test]
    fn mode_first_on_ties() {
        let d = describe(&sample(&[3.0, 1.0, 1.0, 3.0, 2.0]));
        assert_eq!(d.mode, 3.0);
        let d = describe(&sample(&[5.0, 2.0, 2.0, 7.0]));
        assert_eq!(d.mode, 2.0);
        let d = describe(&sample(&[4.0, 8.0, 9.0]));
        assert_eq!(d.mode, 4.0);
    }

    #[test]
    fn median_even_count() {
        let d = describe(&sample(&[4.0, 1.0, 3.0, 2.0]));
        assert!((d.median - 2.5).abs() < 1e-12);
        assert!((d.q1 - 1.75).abs() < 1e-12);
        assert!((d.q3 - 3.25).abs() < 1e-12);
    }

    #[test]
    fn right_skewed_sample() {
        let d = describe(&sample(&[1.0, 1.0, 1.0, 2.0, 2.0, 3.0, 10.0]));
        assert!(d.skewness.unwrap() > 1.0, "skew = {:?}", d.skewness);
    }

    #[test]
    fn small_samples_omit_higher_moments() {
        let d = describe(&sample(&[7.0]));
        assert_eq!(d.variance, None);
        assert_eq!(d.standard_deviation, None);
        assert_eq!(d.skewness, None);
        assert_eq!(d.kurtosis, None);
        assert_eq!(d.median, 7.0);
        assert_eq!(d.range, 0.0);

        let d = describe(&sample(&[1.0, 2.0, 3.0]));
        assert!(d.skewness.is_some());
        assert!(d.kurtosis.is_none());
    }

    #[test]
    fn quantile_level_checked() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile_sorted(&sorted, 0.25).unwrap() - 1.75).abs() < 1e-12);
        assert_eq!(quantile_sorted(&sorted, 1.0).unwrap(), 4.0);
        assert!(matches!(
            quantile_sorted(&sorted, 1.5),
            Err(InferenceError::Validation(_))
        ));
        assert!(quantile_sorted(&[], 0.5).is_err());
    }

    #[test]
    fn constant_sample_has_no_shape() {
        let d = describe(&sample(&[2.0, 2.0, 2.0, 2.0, 2.0]));
        assert_eq!(d.variance, Some(0.0));
        assert_eq!(d.skewness, None);
        assert_eq!(d.kurtosis, None);
    }
}
