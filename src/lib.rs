//! # u-inference
//!
//! Statistical inference and model fitting: descriptive statistics,
//! classical hypothesis tests, least-squares regression, and small
//! predictive models (naive Bayes, bagged regression trees, one-hidden-layer
//! networks).
//!
//! Every entry point is a pure function of its inputs (and, for models, an
//! explicit seed). Inputs are validated once at the boundary and every
//! failure is reported as an [`InferenceError`].
//!
//! ## Modules
//!
//! - [`data`] — Validated containers (`Sample`, `ContingencyTable`)
//! - [`special`] — Gamma/beta functions and normal, t, χ², F distributions
//! - [`descriptive`] — Summary statistics, quartiles, skewness, kurtosis
//! - [`testing`] — z-, t-, χ²-tests and one-way ANOVA
//! - [`regression`] — Linear and polynomial least squares
//! - [`models`] — Naive Bayes, random forest, MLP regressor/classifier
//! - [`linalg`] — Householder QR over `u-numflow` matrices
//!
//! ## Design Philosophy
//!
//! - **Exact tails**: p-values come from the proper t, χ² and F
//!   distributions, never a normal approximation
//! - **Deterministic**: all randomness flows from a seeded `StdRng`
//! - **Leverages `u-numflow`**: special functions, compensated moments
//!   and dense matrices come from the shared numerical core
//! - **Research-backed**: algorithms cite their references
//!
//! # Examples
//!
//! ```
//! use u_inference::data::Sample;
//! use u_inference::testing::{two_sample_t_test, TestConfig, Variances};
//!
//! let a = Sample::new(vec![5.1, 4.9, 5.3, 5.0, 5.2]).unwrap();
//! let b = Sample::new(vec![6.2, 6.0, 6.4, 6.1, 6.3]).unwrap();
//! let r = two_sample_t_test(&a, &b, Variances::Unequal, &TestConfig::default()).unwrap();
//! assert!(r.reject_null);
//! println!("{}", r.conclusion);
//! ```

pub mod data;
pub mod descriptive;
pub mod error;
pub mod linalg;
pub mod models;
pub mod regression;
pub mod special;
pub mod testing;

pub use error::{InferenceError, Result};
