//! One-way analysis of variance.

use super::{check_significance, DegreesOfFreedom, TestDetails, TestKind, TestResult, Verdict};
use crate::data::Sample;
use crate::error::{InferenceError, Result};
use crate::special::{f_quantile, f_sf};

/// Sums of squares and mean squares of a one-way ANOVA.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct AnovaTable {
    /// Number of groups k.
    pub groups: usize,
    /// Total number of observations N.
    pub total_size: usize,
    /// Mean of each group, in input order.
    pub group_means: Vec<f64>,
    /// Mean of all observations.
    pub grand_mean: f64,
    /// Σ nⱼ(x̄ⱼ − x̄)².
    pub ss_between: f64,
    /// Σⱼ Σᵢ (xᵢⱼ − x̄ⱼ)².
    pub ss_within: f64,
    /// ss_between + ss_within.
    pub ss_total: f64,
    /// k − 1.
    pub df_between: usize,
    /// N − k.
    pub df_within: usize,
    /// N − 1.
    pub df_total: usize,
    /// ss_between / df_between.
    pub ms_between: f64,
    /// ss_within / df_within.
    pub ms_within: f64,
}

/// One-way ANOVA: H₀: all group means are equal.
///
/// # Algorithm
///
/// F = MS_between / MS_within where
/// MS_between = SS_between / (k−1),
/// MS_within = SS_within / (N−k),
/// and p = P(F_{k−1, N−k} ≥ F).
///
/// # Errors
///
/// - [`InferenceError::Validation`] with fewer than 2 groups or a group of
///   fewer than 2 observations.
/// - [`InferenceError::Computation`] if every group is constant
///   (MS_within = 0).
/// - [`InferenceError::Config`] if `significance` is outside (0, 1).
///
/// # References
///
/// Fisher (1925). *Statistical Methods for Research Workers*.
///
/// # Examples
///
/// ```
/// use u_inference::data::Sample;
/// use u_inference::testing::one_way_anova;
///
/// let groups = [
///     Sample::new(vec![1.0, 2.0, 3.0]).unwrap(),
///     Sample::new(vec![4.0, 5.0, 6.0]).unwrap(),
///     Sample::new(vec![7.0, 8.0, 9.0]).unwrap(),
/// ];
/// let r = one_way_anova(&groups, 0.05).unwrap();
/// assert!((r.statistic - 27.0).abs() < 1e-10);
/// assert!(r.reject_null);
/// ```
pub fn one_way_anova(groups: &[Sample], significance: f64) -> Result<TestResult> {
    check_significance(significance)?;
    let k = groups.len();
    if k < 2 {
        return Err(InferenceError::validation(format!(
            "ANOVA needs at least 2 groups, got {k}"
        )));
    }
    if let Some(i) = groups.iter().position(|g| g.len() < 2) {
        return Err(InferenceError::validation(format!(
            "each ANOVA group needs at least 2 observations (group {i} has {})",
            groups[i].len()
        )));
    }

    let total_size: usize = groups.iter().map(Sample::len).sum();
    let group_means: Vec<f64> = groups.iter().map(Sample::mean).collect();
    let grand_mean = groups
        .iter()
        .zip(&group_means)
        .map(|(g, &m)| g.len() as f64 * m)
        .sum::<f64>()
        / total_size as f64;

    let ss_between: f64 = groups
        .iter()
        .zip(&group_means)
        .map(|(g, &m)| g.len() as f64 * (m - grand_mean).powi(2))
        .sum();
    let ss_within: f64 = groups
        .iter()
        .zip(&group_means)
        .map(|(g, &m)| g.values().iter().map(|&x| (x - m).powi(2)).sum::<f64>())
        .sum();

    let df_between = k - 1;
    let df_within = total_size - k;
    let ms_between = ss_between / df_between as f64;
    let ms_within = ss_within / df_within as f64;
    if ms_within <= 0.0 {
        return Err(InferenceError::computation(
            "within-group variance is zero; the F statistic is undefined",
        ));
    }
    let f = ms_between / ms_within;
    let (d1, d2) = (df_between as f64, df_within as f64);

    let table = AnovaTable {
        groups: k,
        total_size,
        group_means,
        grand_mean,
        ss_between,
        ss_within,
        ss_total: ss_between + ss_within,
        df_between,
        df_within,
        df_total: total_size - 1,
        ms_between,
        ms_within,
    };
    let verdict = Verdict {
        kind: TestKind::OneWayAnova,
        statistic: f,
        degrees_of_freedom: Some(DegreesOfFreedom::Pair {
            numerator: df_between,
            denominator: df_within,
        }),
        p_value: f_sf(f, d1, d2)?.clamp(0.0, 1.0),
        significance,
        alternative: None,
        critical_value: f_quantile(1.0 - significance, d1, d2)?,
        details: TestDetails::Anova(table),
    };
    Ok(verdict.conclude(|reject| {
        if reject {
            "Reject the null hypothesis. There is sufficient evidence that at least one \
             group mean differs from the others."
                .to_string()
        } else {
            "Fail to reject the null hypothesis. There is insufficient evidence that the \
             group means differ."
                .to_string()
        }
    }))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn sums_of_squares_decompose(
            groups in proptest::collection::vec(
                proptest::collection::vec(-50.0f64..50.0, 2..=8), 2..=5),
        ) {
            let samples: Vec<Sample> = groups.into_iter().map(|g| Sample::new(g).unwrap()).collect();
            if let Ok(r) = one_way_anova(&samples, 0.05) {
                let t = table(&r);
                let all: Vec<f64> = samples.iter().flat_map(|g| g.values().to_vec()).collect();
                let total: f64 = all.iter().map(|&x| (x - t.grand_mean).powi(2)).sum();
                prop_assert!((t.ss_total - total).abs() < 1e-6 * total.max(1.0));
                prop_assert!(r.statistic >= 0.0);
                prop_assert!((0.0..=1.0).contains(&r.p_value));
            }
        }
    }

    fn table(r: &TestResult) -> &AnovaTable {
        match &r.details {
            TestDetails::Anova(t) => t,
            _ => unreachable!(),
        }
    }
}
