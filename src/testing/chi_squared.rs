//! Pearson chi-squared tests on counts.

use super::{check_significance, DegreesOfFreedom, TestDetails, TestKind, TestResult, Verdict};
use crate::data::{ensure_finite, ContingencyTable};
use crate::error::{InferenceError, Result};
use crate::special::{chi_squared_quantile, chi_squared_sf};

/// Chi-squared goodness-of-fit test.
///
/// # Algorithm
///
/// χ² = Σ (Oᵢ − Eᵢ)² / Eᵢ, df = k − 1, p = P(χ²_df ≥ χ²).
///
/// Expected counts are used as given; they are not rescaled to the
/// observed total.
///
/// # Errors
///
/// - [`InferenceError::Validation`] if the arrays differ in length, have
///   fewer than 2 categories, or contain negative or non-finite values.
/// - [`InferenceError::Computation`] if any expected count is zero.
/// - [`InferenceError::Config`] if `significance` is outside (0, 1).
///
/// # References
///
/// Pearson (1900). "On the criterion that a given system of deviations…".
/// *Philosophical Magazine* 50(302), 157–175.
///
/// # Examples
///
/// ```
/// use u_inference::testing::chi_squared_goodness_of_fit;
///
/// let r = chi_squared_goodness_of_fit(&[10.0, 20.0, 30.0], &[15.0, 25.0, 20.0], 0.05).unwrap();
/// assert!((r.statistic - 23.0 / 3.0).abs() < 1e-12);
/// assert!(r.reject_null);
/// ```
pub fn chi_squared_goodness_of_fit(
    observed: &[f64],
    expected: &[f64],
    significance: f64,
) -> Result<TestResult> {
    check_significance(significance)?;
    if observed.len() != expected.len() {
        return Err(InferenceError::validation(format!(
            "observed and expected arrays must have the same length ({} vs {})",
            observed.len(),
            expected.len()
        )));
    }
    let k = observed.len();
    if k < 2 {
        return Err(InferenceError::validation(
            "goodness-of-fit test needs at least 2 categories",
        ));
    }
    ensure_finite(observed, "observed frequencies")?;
    ensure_finite(expected, "expected frequencies")?;
    if observed.iter().chain(expected).any(|&v| v < 0.0) {
        return Err(InferenceError::validation("frequencies cannot be negative"));
    }
    if let Some(i) = expected.iter().position(|&e| e == 0.0) {
        return Err(InferenceError::computation(format!(
            "expected frequency at index {i} is zero"
        )));
    }

    let chi2: f64 = observed
        .iter()
        .zip(expected)
        .map(|(&o, &e)| (o - e) * (o - e) / e)
        .sum();
    let df = k - 1;

    let verdict = upper_tail(
        TestKind::ChiSquaredGoodnessOfFit,
        chi2,
        df,
        significance,
        TestDetails::GoodnessOfFit {
            observed: observed.to_vec(),
            expected: expected.to_vec(),
        },
    )?;
    Ok(verdict.conclude(|reject| {
        if reject {
            "Reject the null hypothesis. The observed frequencies differ significantly \
             from the expected frequencies."
                .to_string()
        } else {
            "Fail to reject the null hypothesis. The observed frequencies do not differ \
             significantly from the expected frequencies."
                .to_string()
        }
    }))
}

/// Chi-squared test of independence on an r × c contingency table.
///
/// # Algorithm
///
/// Eᵢⱼ = (row totalᵢ · column totalⱼ) / N,
/// χ² = Σᵢⱼ (Oᵢⱼ − Eᵢⱼ)² / Eᵢⱼ, df = (r − 1)(c − 1).
///
/// # Errors
///
/// - [`InferenceError::Validation`] if the table has fewer than 2 rows or
///   2 columns.
/// - [`InferenceError::Computation`] if any expected count is zero (an
///   all-zero row or column).
/// - [`InferenceError::Config`] if `significance` is outside (0, 1).
pub fn chi_squared_independence(
    table: &ContingencyTable,
    significance: f64,
) -> Result<TestResult> {
    check_significance(significance)?;
    let (r, c) = (table.n_rows(), table.n_cols());
    if r < 2 || c < 2 {
        return Err(InferenceError::validation(format!(
            "independence test needs at least a 2 × 2 table, got {r} × {c}"
        )));
    }
    let row_totals = table.row_totals();
    let col_totals = table.col_totals();
    let total = table.grand_total() as f64;
    if row_totals.contains(&0) || col_totals.contains(&0) {
        return Err(InferenceError::computation(
            "expected frequency is zero: table has an all-zero row or column",
        ));
    }

    let expected: Vec<Vec<f64>> = row_totals
        .iter()
        .map(|&rt| {
            col_totals
                .iter()
                .map(|&ct| rt as f64 * ct as f64 / total)
                .collect()
        })
        .collect();
    let chi2: f64 = table
        .rows()
        .zip(&expected)
        .flat_map(|(obs, exp)| obs.iter().zip(exp))
        .map(|(&o, &e)| {
            let d = o as f64 - e;
            d * d / e
        })
        .sum();
    let df = (r - 1) * (c - 1);

    let verdict = upper_tail(
        TestKind::ChiSquaredIndependence,
        chi2,
        df,
        significance,
        TestDetails::Independence {
            observed: table.rows().map(<[u64]>::to_vec).collect(),
            expected,
        },
    )?;
    Ok(verdict.conclude(|reject| {
        if reject {
            "Reject the null hypothesis. There is sufficient evidence that the variables \
             are not independent."
                .to_string()
        } else {
            "Fail to reject the null hypothesis. There is insufficient evidence that the \
             variables are dependent."
                .to_string()
        }
    }))
}

fn upper_tail(
    kind: TestKind,
    chi2: f64,
    df: usize,
    significance: f64,
    details: TestDetails,
) -> Result<Verdict> {
    let dfv = df as f64;
    Ok(Verdict {
        kind,
        statistic: chi2,
        degrees_of_freedom: Some(DegreesOfFreedom::Whole(df)),
        p_value: chi_squared_sf(chi2, dfv)?.clamp(0.0, 1.0),
        significance,
        alternative: None,
        critical_value: chi_squared_quantile(1.0 - significance, dfv)?,
        details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goodness_of_fit_reference() {
        let r = chi_squared_goodness_of_fit(&[10.0, 20.0, 30.0], &[15.0, 25.0, 20.0], 0.05)
            .expect("should compute");
        assert!((r.statistic - 7.666_666_666_666_667).abs() < 1e-10, "χ² = {}", r.statistic);
        assert_eq!(r.degrees_of_freedom, Some(DegreesOfFreedom::Whole(2)));
        assert!((r.p_value - 0.021_637_370_719_493_09).abs() < 1e-9, "p = {}", r.p_value);
        assert!(r.reject_null);
        assert!((r.critical_value - 5.991_464_547_107_979).abs() < 1e-8);
        assert!(r.alternative.is_none());
        assert!(r.conclusion.contains("differ significantly"));
    }

    #[test]
    fn perfect_fit() {
        let r = chi_squared_goodness_of_fit(&[25.0, 25.0, 25.0, 25.0], &[25.0; 4], 0.05).unwrap();
        assert_eq!(r.statistic, 0.0);
        assert!((r.p_value - 1.0).abs() < 1e-12);
        assert!(!r.reject_null);
    }

    #[test]
    fn goodness_of_fit_errors() {
        assert!(matches!(
            chi_squared_goodness_of_fit(&[1.0, 2.0], &[1.0], 0.05),
            Err(InferenceError::Validation(_))
        ));
        assert!(matches!(
            chi_squared_goodness_of_fit(&[1.0], &[1.0], 0.05),
            Err(InferenceError::Validation(_))
        ));
        assert!(matches!(
            chi_squared_goodness_of_fit(&[1.0, -2.0], &[1.0, 1.0], 0.05),
            Err(InferenceError::Validation(_))
        ));
        assert!(matches!(
            chi_squared_goodness_of_fit(&[1.0, 2.0], &[1.0, 0.0], 0.05),
            Err(InferenceError::Computation(_))
        ));
        assert!(matches!(
            chi_squared_goodness_of_fit(&[1.0, 2.0], &[1.0, 2.0], 1.0),
            Err(InferenceError::Config(_))
        ));
    }

    #[test]
    fn independence_two_by_two() {
        // Row totals 30/70, col totals 40/60, N = 100.
        // E = [[12, 18], [28, 42]]
        let t = ContingencyTable::new(vec![vec![20, 10], vec![20, 50]]).unwrap();
        let r = chi_squared_independence(&t, 0.05).unwrap();
        let expected = 64.0 / 12.0 + 64.0 / 18.0 + 64.0 / 28.0 + 64.0 / 42.0;
        assert!((r.statistic - expected).abs() < 1e-10, "χ² = {}", r.statistic);
        assert_eq!(r.degrees_of_freedom, Some(DegreesOfFreedom::Whole(1)));
        assert!(r.reject_null);
        match &r.details {
            TestDetails::Independence { expected, .. } => {
                assert!((expected[0][0] - 12.0).abs() < 1e-12);
                assert!((expected[1][1] - 42.0).abs() < 1e-12);
            }
            other => panic!("unexpected details {other:?}"),
        }
    }

    #[test]
    fn independence_proportional_table() {
        let t = ContingencyTable::new(vec![vec![10, 20, 30], vec![20, 40, 60]]).unwrap();
        let r = chi_squared_independence(&t, 0.05).unwrap();
        assert!(r.statistic.abs() < 1e-12);
        assert_eq!(r.degrees_of_freedom, Some(DegreesOfFreedom::Whole(2)));
        assert!(!r.reject_null);
    }

    #[test]
    fn independence_errors() {
        let single_row = ContingencyTable::new(vec![vec![1, 2, 3]]).unwrap();
        assert!(matches!(
            chi_squared_independence(&single_row, 0.05),
            Err(InferenceError::Validation(_))
        ));
        let zero_col = ContingencyTable::new(vec![vec![0, 2], vec![0, 3]]).unwrap();
        assert!(matches!(
            chi_squared_independence(&zero_col, 0.05),
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
        fn gof_statistic_non_negative(
            pairs in proptest::collection::vec((0.0f64..100.0, 0.5f64..100.0), 2..=10),
        ) {
            let (obs, exp): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
            let r = chi_squared_goodness_of_fit(&obs, &exp, 0.05).unwrap();
            prop_assert!(r.statistic >= 0.0);
            prop_assert!((0.0..=1.0).contains(&r.p_value));
        }

        #[test]
        fn independence_df(rows in 2usize..5, cols in 2usize..5, seed in 1u64..50) {
            let table: Vec<Vec<u64>> = (0..rows)
                .map(|i| (0..cols).map(|j| 1 + (seed * (i as u64 + 3) * (j as u64 + 7)) % 17).collect())
                .collect();
            let r = chi_squared_independence(&ContingencyTable::new(table).unwrap(), 0.05).unwrap();
            prop_assert_eq!(r.degrees_of_freedom, Some(DegreesOfFreedom::Whole((rows - 1) * (cols - 1))));
            prop_assert!(r.statistic >= -1e-12);
        }
    }
}
