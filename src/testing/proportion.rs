//! One- and two-proportion z-tests.

use super::{
    direction, evidence_conclusion, symmetric_critical_value, symmetric_p_value, Alternative,
    TestConfig, TestDetails, TestKind, TestResult, Verdict,
};
use crate::error::{InferenceError, Result};
use crate::special::{inverse_normal_cdf, standard_normal_sf};

/// One-proportion z-test of H₀: p = p₀.
///
/// # Algorithm
///
/// p̂ = x / n, z = (p̂ − p₀) / √(p₀(1 − p₀)/n), referred to N(0, 1).
///
/// # Errors
///
/// - [`InferenceError::Validation`] if `sample_size` is 0, `successes`
///   exceeds `sample_size`, or `p0` is not a finite value in [0, 1].
/// - [`InferenceError::Computation`] if `p0` is exactly 0 or 1 (zero
///   standard error).
/// - [`InferenceError::Config`] if the significance level is invalid.
///
/// # Examples
///
/// ```
/// use u_inference::testing::{one_proportion_z_test, TestConfig};
///
/// let r = one_proportion_z_test(45, 100, 0.5, &TestConfig::default()).unwrap();
/// assert!((r.statistic + 1.0).abs() < 1e-12);
/// assert!(!r.reject_null);
/// ```
pub fn one_proportion_z_test(
    successes: u64,
    sample_size: u64,
    p0: f64,
    config: &TestConfig,
) -> Result<TestResult> {
    config.validate()?;
    check_counts(successes, sample_size, "")?;
    if !p0.is_finite() || !(0.0..=1.0).contains(&p0) {
        return Err(InferenceError::validation(format!(
            "hypothesized proportion must be between 0 and 1, got {p0}"
        )));
    }
    if p0 == 0.0 || p0 == 1.0 {
        return Err(InferenceError::computation(
            "standard error is zero for a hypothesized proportion of 0 or 1",
        ));
    }

    let n = sample_size as f64;
    let p_hat = successes as f64 / n;
    let se = (p0 * (1.0 - p0) / n).sqrt();
    let z = (p_hat - p0) / se;

    let alternative = config.alternative;
    let verdict = Verdict {
        kind: TestKind::OneProportionZ,
        statistic: z,
        degrees_of_freedom: None,
        p_value: symmetric_p_value(z, alternative, standard_normal_sf)?,
        significance: config.significance,
        alternative: Some(alternative),
        critical_value: symmetric_critical_value(
            config.significance,
            alternative,
            inverse_normal_cdf,
        )?,
        details: TestDetails::OneProportion {
            successes,
            sample_size,
            sample_proportion: p_hat,
            hypothesized_proportion: p0,
        },
    };
    Ok(verdict.conclude(|reject| {
        evidence_conclusion(
            reject,
            &format!("that the proportion {} {p0}", direction(alternative)),
        )
    }))
}

/// Two-proportion z-test of H₀: p₁ = p₂ with a pooled standard error.
///
/// # Algorithm
///
/// p̂ = (x₁ + x₂)/(n₁ + n₂),
/// z = (p̂₁ − p̂₂) / √(p̂(1 − p̂)(1/n₁ + 1/n₂)).
///
/// # Errors
///
/// - [`InferenceError::Validation`] for an empty sample or more successes
///   than trials.
/// - [`InferenceError::Computation`] if the pooled proportion is 0 or 1.
/// - [`InferenceError::Config`] if the significance level is invalid.
pub fn two_proportion_z_test(
    successes1: u64,
    sample_size1: u64,
    successes2: u64,
    sample_size2: u64,
    config: &TestConfig,
) -> Result<TestResult> {
    config.validate()?;
    check_counts(successes1, sample_size1, " 1")?;
    check_counts(successes2, sample_size2, " 2")?;

    let n1 = sample_size1 as f64;
    let n2 = sample_size2 as f64;
    let p1 = successes1 as f64 / n1;
    let p2 = successes2 as f64 / n2;
    let pooled = (successes1 as f64 + successes2 as f64) / (n1 + n2);
    let se = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();
    if se == 0.0 {
        return Err(InferenceError::computation(
            "standard error is zero: pooled proportion is 0 or 1",
        ));
    }
    let z = (p1 - p2) / se;

    let alternative = config.alternative;
    let verdict = Verdict {
        kind: TestKind::TwoProportionZ,
        statistic: z,
        degrees_of_freedom: None,
        p_value: symmetric_p_value(z, alternative, standard_normal_sf)?,
        significance: config.significance,
        alternative: Some(alternative),
        critical_value: symmetric_critical_value(
            config.significance,
            alternative,
            inverse_normal_cdf,
        )?,
        details: TestDetails::TwoProportion {
            proportion1: p1,
            proportion2: p2,
            pooled_proportion: pooled,
            sample_size1,
            sample_size2,
        },
    };
    Ok(verdict.conclude(|reject| {
        let claim = match alternative {
            Alternative::TwoSided => "of a difference between the two proportions",
            Alternative::Greater => "that the first proportion is greater than the second",
            Alternative::Less => "that the first proportion is less than the second",
        };
        evidence_conclusion(reject, claim)
    }))
}

fn check_counts(successes: u64, sample_size: u64, label: &str) -> Result<()> {
    if sample_size == 0 {
        return Err(InferenceError::validation(format!(
            "sample size{label} must be positive"
        )));
    }
    if successes > sample_size {
        return Err(InferenceError::validation(format!(
            "successes{label} ({successes}) cannot exceed sample size ({sample_size})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forty_five_of_hundred() {
        let r = one_proportion_z_test(45, 100, 0.5, &TestConfig::default()).expect("should compute");
        assert!((r.statistic + 1.0).abs() < 1e-12, "z = {}", r.statistic);
        // 2·(1 − Φ(1)) = 0.31731…
        assert!((r.p_value - 0.317_310_507_862_914).abs() < 1e-9, "p = {}", r.p_value);
        assert!(!r.reject_null);
        assert!(r.degrees_of_freedom.is_none());
        assert!(r.conclusion.starts_with("Fail to reject"));
        match r.details {
            TestDetails::OneProportion {
                sample_proportion, ..
            } => assert!((sample_proportion - 0.45).abs() < 1e-15),
            other => panic!("unexpected details {other:?}"),
        }
    }

    #[test]
    fn one_sided_alternatives_split_the_tail() {
        let less = TestConfig::new(Alternative::Less, 0.05).unwrap();
        let greater = TestConfig::new(Alternative::Greater, 0.05).unwrap();
        let rl = one_proportion_z_test(45, 100, 0.5, &less).unwrap();
        let rg = one_proportion_z_test(45, 100, 0.5, &greater).unwrap();
        assert!((rl.p_value - 0.158_655_253_931_457).abs() < 1e-9);
        assert!((rl.p_value + rg.p_value - 1.0).abs() < 1e-12);
        assert!(rl.critical_value < 0.0);
        assert!(rg.critical_value > 0.0);
    }

    #[test]
    fn strong_evidence_rejects() {
        let r = one_proportion_z_test(80, 100, 0.5, &TestConfig::default()).unwrap();
        assert!((r.statistic - 6.0).abs() < 1e-12);
        assert!(r.reject_null);
        assert!(r.conclusion.contains("sufficient evidence that the proportion differs from 0.5"));
    }

    #[test]
    fn invalid_proportion_inputs() {
        let cfg = TestConfig::default();
        assert!(matches!(
            one_proportion_z_test(5, 0, 0.5, &cfg),
            Err(InferenceError::Validation(_))
        ));
        assert!(matches!(
            one_proportion_z_test(11, 10, 0.5, &cfg),
            Err(InferenceError::Validation(_))
        ));
        assert!(matches!(
            one_proportion_z_test(5, 10, 1.5, &cfg),
            Err(InferenceError::Validation(_))
        ));
        assert!(matches!(
            one_proportion_z_test(5, 10, 0.0, &cfg),
            Err(InferenceError::Computation(_))
        ));
        assert!(matches!(
            one_proportion_z_test(5, 10, 1.0, &cfg),
            Err(InferenceError::Computation(_))
        ));
        let bad = TestConfig {
            significance: 0.0,
            ..TestConfig::default()
        };
        assert!(matches!(
            one_proportion_z_test(5, 10, 0.5, &bad),
            Err(InferenceError::Config(_))
        ));
    }

    #[test]
    fn two_proportions() {
        // p̂₁ = 0.6, p̂₂ = 0.4, pooled 0.5, se = √(0.25·0.04) = 0.1
        let r = two_proportion_z_test(30, 50, 20, 50, &TestConfig::default()).unwrap();
        assert!((r.statistic - 2.0).abs() < 1e-12, "z = {}", r.statistic);
        assert!((r.p_value - 0.045_500_263_896_358).abs() < 1e-9);
        assert!(r.reject_null);
    }

    #[test]
    fn two_proportions_degenerate_pool() {
        let cfg = TestConfig::default();
        assert!(matches!(
            two_proportion_z_test(0, 10, 0, 20, &cfg),
            Err(InferenceError::Computation(_))
        ));
        assert!(matches!(
            two_proportion_z_test(10, 10, 20, 20, &cfg),
            Err(InferenceError::Computation(_))
        ));
        assert!(matches!(
            two_proportion_z_test(1, 0, 1, 2, &cfg),
            Err(InferenceError::Validation(_))
        ));
    }

    #[test]
    fn two_proportions_near_u64_limit() {
        let cfg = TestConfig::default();
        // pooled rounds to exactly 1 in f64
        assert!(matches!(
            two_proportion_z_test(u64::MAX, u64::MAX, 1, 2, &cfg),
            Err(InferenceError::Computation(_))
        ));
        // success counts whose integer sum would wrap
        let r = two_proportion_z_test(u64::MAX - 1, u64::MAX, u64::MAX / 4, u64::MAX, &cfg).unwrap();
        assert!(r.statistic > 0.0 && r.statistic.is_finite());
        assert!(r.reject_null);
    }
}
