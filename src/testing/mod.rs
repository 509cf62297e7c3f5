//! Hypothesis testing.
//!
//! Proportion z-tests, one/two-sample t-tests, chi-squared goodness-of-fit
//! and independence tests, and one-way ANOVA. Every test computes its
//! statistic, takes the p-value from the exact sampling distribution in
//! [`special`](crate::special), compares it with the significance level and
//! returns an immutable [`TestResult`].
//!
//! # Examples
//!
//! ```
//! use u_inference::data::Sample;
//! use u_inference::testing::{one_sample_t_test, TestConfig};
//!
//! let data = Sample::new(vec![5.1, 4.9, 5.2, 5.0, 4.8, 5.3, 5.1, 4.9]).unwrap();
//! let result = one_sample_t_test(&data, 5.0, &TestConfig::default()).unwrap();
//! assert!(result.p_value > 0.05); // cannot reject H₀: μ = 5.0
//! assert!(!result.reject_null);
//! ```

mod anova;
mod chi_squared;
mod proportion;

pub use anova::{one_way_anova, AnovaTable};
pub use chi_squared::{chi_squared_goodness_of_fit, chi_squared_independence};
pub use proportion::{one_proportion_z_test, two_proportion_z_test};
pub use t_test::{one_sample_t_test, paired_t_test, two_sample_t_test, Variances};

use std::fmt;
use std::str::FromStr;

use crate::error::{InferenceError, Result};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Alternative hypothesis for tests with a signed statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Alternative {
    /// H₁: parameter ≠ hypothesized value.
    #[default]
    TwoSided,
    /// H₁: parameter > hypothesized value.
    Greater,
    /// H₁: parameter < hypothesized value.
    Less,
}

impl Alternative {
    /// Wire name (`"two-sided"`, `"greater"`, `"less"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Alternative::TwoSided => "two-sided",
            Alternative::Greater => "greater",
            Alternative::Less => "less",
        }
    }
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Alternative {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "two-sided" => Ok(Alternative::TwoSided),
            "greater" => Ok(Alternative::Greater),
            "less" => Ok(Alternative::Less),
            other => Err(InferenceError::config(format!(
                "alternative hypothesis must be one of: two-sided, greater, less (got {other:?})"
            ))),
        }
    }
}

/// Options shared by the z- and t-tests.
///
/// Defaults to a two-sided test at the 5% level.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct TestConfig {
    /// Alternative hypothesis.
    pub alternative: Alternative,
    /// Significance level α, strictly inside (0, 1).
    pub significance: f64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            alternative: Alternative::TwoSided,
            significance: 0.05,
        }
    }
}

impl TestConfig {
    /// Creates a validated configuration.
    pub fn new(alternative: Alternative, significance: f64) -> Result<Self> {
        let config = Self {
            alternative,
            significance,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the significance level.
    pub fn validate(&self) -> Result<()> {
        check_significance(self.significance)
    }
}

pub(crate) fn check_significance(alpha: f64) -> Result<()> {
    if alpha.is_finite() && alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(InferenceError::config(format!(
            "significance level must lie strictly between 0 and 1, got {alpha}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Which test produced a [`TestResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum TestKind {
    OneProportionZ,
    TwoProportionZ,
    OneSampleT,
    PairedT,
    TwoSampleT,
    WelchT,
    ChiSquaredGoodnessOfFit,
    ChiSquaredIndependence,
    OneWayAnova,
}

impl TestKind {
    /// Human-readable test name.
    pub fn name(&self) -> &'static str {
        match self {
            TestKind::OneProportionZ => "One-Proportion Z-Test",
            TestKind::TwoProportionZ => "Two-Proportion Z-Test",
            TestKind::OneSampleT => "One-Sample T-Test",
            TestKind::PairedT => "Paired T-Test",
            TestKind::TwoSampleT => "Two-Sample T-Test (Equal Variances)",
            TestKind::WelchT => "Welch's T-Test (Unequal Variances)",
            TestKind::ChiSquaredGoodnessOfFit => "Chi-Squared Goodness of Fit Test",
            TestKind::ChiSquaredIndependence => "Chi-Squared Test for Independence",
            TestKind::OneWayAnova => "One-Way ANOVA",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Degrees of freedom of the reference distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum DegreesOfFreedom {
    /// Integer df (t, chi-squared).
    Whole(usize),
    /// Real-valued df (Welch–Satterthwaite).
    Fractional(f64),
    /// Numerator and denominator df (F).
    Pair { numerator: usize, denominator: usize },
}

impl DegreesOfFreedom {
    /// The df as a real number, for single-parameter distributions.
    ///
    /// `None` for [`DegreesOfFreedom::Pair`].
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            DegreesOfFreedom::Whole(v) => Some(v as f64),
            DegreesOfFreedom::Fractional(v) => Some(v),
            DegreesOfFreedom::Pair { .. } => None,
        }
    }
}

/// Test-specific quantities reported alongside the verdict.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")
)]
pub enum TestDetails {
    OneProportion {
        successes: u64,
        sample_size: u64,
        sample_proportion: f64,
        hypothesized_proportion: f64,
    },
    TwoProportion {
        proportion1: f64,
        proportion2: f64,
        pooled_proportion: f64,
        sample_size1: u64,
        sample_size2: u64,
    },
    /// One-sample and paired t-tests (paired reports the differences).
    OneSample {
        sample_mean: f64,
        hypothesized_mean: f64,
        sample_std: f64,
        sample_size: usize,
    },
    TwoSample {
        mean1: f64,
        mean2: f64,
        std1: f64,
        std2: f64,
        sample_size1: usize,
        sample_size2: usize,
        /// Pooled standard deviation; `None` for Welch.
        pooled_std: Option<f64>,
    },
    GoodnessOfFit {
        observed: Vec<f64>,
        expected: Vec<f64>,
    },
    Independence {
        observed: Vec<Vec<u64>>,
        expected: Vec<Vec<f64>>,
    },
    Anova(AnovaTable),
}

/// Outcome of a hypothesis test. Created once; never mutated.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct TestResult {
    /// Test that produced this result.
    pub kind: TestKind,
    /// Test statistic (z, t, χ² or F).
    pub statistic: f64,
    /// Degrees of freedom; `None` for z-tests.
    pub degrees_of_freedom: Option<DegreesOfFreedom>,
    /// p-value in [0, 1].
    pub p_value: f64,
    /// Significance level α used for the decision.
    pub significance: f64,
    /// Alternative hypothesis; `None` for upper-tail-only tests (χ², F).
    pub alternative: Option<Alternative>,
    /// Rejection threshold for the statistic at level α. For two-sided
    /// tests this is the positive bound.
    pub critical_value: f64,
    /// `p_value < significance`.
    pub reject_null: bool,
    /// Plain-language verdict.
    pub conclusion: String,
    /// Test-specific quantities.
    pub details: TestDetails,
}

// ---------------------------------------------------------------------------
// Shared machinery
// ---------------------------------------------------------------------------

/// p-value for a statistic with a symmetric reference distribution whose
/// survival function is `sf`.
pub(crate) fn symmetric_p_value(
    statistic: f64,
    alternative: Alternative,
    sf: impl Fn(f64) -> Result<f64>,
) -> Result<f64> {
    let p = match alternative {
        Alternative::TwoSided => 2.0 * sf(statistic.abs())?,
        Alternative::Greater => sf(statistic)?,
        Alternative::Less => sf(-statistic)?,
    };
    Ok(p.clamp(0.0, 1.0))
}

/// Critical value at level `alpha` for a symmetric distribution with
/// quantile function `quantile`.
pub(crate) fn symmetric_critical_value(
    alpha: f64,
    alternative: Alternative,
    quantile: impl Fn(f64) -> Result<f64>,
) -> Result<f64> {
    match alternative {
        Alternative::TwoSided => quantile(1.0 - alpha / 2.0),
        Alternative::Greater => quantile(1.0 - alpha),
        Alternative::Less => quantile(alpha),
    }
}

/// Verb phrase for a one-parameter claim under `alternative`.
pub(crate) fn direction(alternative: Alternative) -> &'static str {
    match alternative {
        Alternative::TwoSided => "differs from",
        Alternative::Greater => "is greater than",
        Alternative::Less => "is less than",
    }
}

/// "Reject …/Fail to reject … There is (in)sufficient evidence {claim}."
pub(crate) fn evidence_conclusion(reject: bool, claim: &str) -> String {
    if reject {
        format!("Reject the null hypothesis. There is sufficient evidence {claim}.")
    } else {
        format!("Fail to reject the null hypothesis. There is insufficient evidence {claim}.")
    }
}

pub(crate) struct Verdict {
    pub kind: TestKind,
    pub statistic: f64,
    pub degrees_of_freedom: Option<DegreesOfFreedom>,
    pub p_value: f64,
    pub significance: f64,
    pub alternative: Option<Alternative>,
    pub critical_value: f64,
    pub details: TestDetails,
}

impl Verdict {
    /// Applies the decision rule and attaches the conclusion text.
    pub(crate) fn conclude(self, conclusion: impl FnOnce(bool) -> String) -> TestResult {
        let reject_null = self.p_value < self.significance;
        log::trace!(
            "{}: statistic = {:.6}, p = {:.6}, reject = {reject_null}",
            self.kind,
            self.statistic,
            self.p_value
        );
        TestResult {
            kind: self.kind,
            statistic: self.statistic,
            degrees_of_freedom: self.degrees_of_freedom,
            p_value: self.p_value,
            significance: self.significance,
            alternative: self.alternative,
            critical_value: self.critical_value,
            reject_null,
            conclusion: conclusion(reject_null),
            details: self.details,
        }
    }
}
