//! Error and configuration types for directional fitting.

use serde::{Deserialize, Serialize};

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors that can occur while fitting a directional distribution.
#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    /// Too few sample directions for the requested model.
    TooFewSamples {
        /// Required minimum number of samples.
        needed: usize,
        /// Provided number of samples.
        got: usize,
    },
    /// All samples (nearly) coincide; no spread to estimate.
    Degenerate {
        /// Length of the mean resultant vector, 1 for identical samples.
        mean_resultant_length: f64,
    },
    /// The optimizer produced non-finite parameters or likelihood.
    NonFinite,
}

impl std::fmt::Display for FitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewSamples { needed, got } => {
                write!(f, "too few samples: need {}, got {}", needed, got)
            }
            Self::Degenerate {
                mean_resultant_length,
            } => write!(
                f,
                "degenerate sample set: mean resultant length {:.12}",
                mean_resultant_length
            ),
            Self::NonFinite => write!(f, "fit produced non-finite parameters"),
        }
    }
}

impl std::error::Error for FitError {}

// ── Configuration ──────────────────────────────────────────────────────────

/// Sub-family of FB8 to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Fb8Family {
    /// Kent distribution: η = 1, ν = (1, 0, 0).
    Fb5,
    /// Kent with free η: ν = (1, 0, 0).
    Fb6,
    /// All eight parameters free.
    #[default]
    Fb8,
}

impl Fb8Family {
    /// Number of free parameters.
    pub fn n_params(self) -> usize {
        match self {
            Self::Fb5 => 5,
            Self::Fb6 => 6,
            Self::Fb8 => 8,
        }
    }
}

/// Configuration for maximum-likelihood FB8 fitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Largest sub-family to fit; smaller families are fitted first as
    /// starting points.
    pub family: Fb8Family,
    /// Maximum Nelder–Mead iterations per stage and start.
    pub max_iters: usize,
    /// Relative tolerance on the simplex objective spread.
    pub tolerance: f64,
    /// Minimum number of non-degenerate samples required to attempt a fit.
    pub min_samples: usize,
    /// Samples needed per free parameter before the FB6 and FB8 stages run;
    /// smaller sets keep the Kent fit.
    pub min_samples_per_param: usize,
    /// Upper bound on κ and β.
    pub kappa_max: f64,
    /// Mean resultant length above which a sample set is degenerate.
    pub degenerate_resultant: f64,
    /// Fit on a seeded random subset when more samples are available.
    pub max_samples: Option<usize>,
    /// Seed for subsampling.
    pub seed: u64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            family: Fb8Family::Fb8,
            max_iters: 2000,
            tolerance: 1e-10,
            min_samples: 3,
            min_samples_per_param: 2,
            kappa_max: 1e4,
            degenerate_resultant: 1.0 - 1e-10,
            max_samples: None,
            seed: 42,
        }
    }
}
