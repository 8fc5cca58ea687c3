//! Maximum-likelihood FB8 fitting.
//!
//! Parameters are optimized in an unconstrained form:
//!
//! - orientation as a rotation vector ω applied to a reference frame,
//!   Γ = Γ₀ · exp([ω]ₓ), re-based after every stage;
//! - κ = exp(k), β = exp(b), both capped at `kappa_max`;
//! - η = sin(e), so η = 1 sits at an interior point;
//! - ν through its model-frame angles (α, ρ).
//!
//! Fitting is staged FB5 → FB6 → FB8, each stage starting from the
//! previous optimum; the FB8 stage additionally restarts from several
//! tilted ν directions and keeps the best. A stage runs only with at least
//! `min_samples_per_param` samples per free parameter: a handful of
//! directions always lies on some small circle, which FB6 and FB8 can
//! concentrate on without bound.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use nalgebra::{Matrix3, Rotation3, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::fb8::{data_term, nu_from_angles, Fb8Distribution, Fb8Params};
use super::moments::{kent_moment_estimate, SufficientStats};
use super::normalize::log_normalizer;
use super::optimizer::{nelder_mead_restarted, Minimum};
use super::types::{Fb8Family, FitConfig, FitError};
use super::DirectionalFitter;

const ANGLE_STEP: f64 = 0.2;
const LOG_STEP: f64 = 0.3;
const ETA_STEP: f64 = 0.3;
const ALPHA_STEP: f64 = 0.3;
const RHO_STEP: f64 = 0.5;

/// Lower bound applied before taking logs of κ and β.
const LOG_FLOOR: f64 = 1e-8;

/// Tilted ν starting points `(α, ρ)` tried by the FB8 stage.
const NU_STARTS: [(f64, f64); 5] = [
    (0.0, 0.0),
    (FRAC_PI_4, 0.0),
    (FRAC_PI_4, FRAC_PI_2),
    (FRAC_PI_4, PI),
    (FRAC_PI_4, 3.0 * FRAC_PI_2),
];

/// Fitted model with fit diagnostics.
#[derive(Debug, Clone)]
pub struct Fb8Fit {
    pub model: Fb8Distribution,
    /// Negative log-likelihood of the fitted samples.
    pub neg_log_likelihood: f64,
    /// Number of samples the fit used (after subsampling).
    pub n_samples: usize,
}

/// FB8 fitter with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct Fb8Fitter {
    pub config: FitConfig,
}

impl Fb8Fitter {
    pub fn new(config: FitConfig) -> Self {
        Self { config }
    }
}

impl DirectionalFitter for Fb8Fitter {
    type Model = Fb8Distribution;

    fn fit(&self, samples: &[Vector3<f64>]) -> Result<Fb8Distribution, FitError> {
        fit_fb8(samples, &self.config).map(|fit| fit.model)
    }
}

/// Decoded parameter vector of one stage.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    gamma: Matrix3<f64>,
    kappa: f64,
    beta: f64,
    eta: f64,
    nu: Vector3<f64>,
}

impl Candidate {
    /// Unconstrained vector for `family`, relative to this candidate's own
    /// frame.
    fn encode(&self, family: Fb8Family, alpha: f64, rho: f64) -> Vec<f64> {
        let mut x = vec![
            0.0,
            0.0,
            0.0,
            self.kappa.max(LOG_FLOOR).ln(),
            self.beta.max(LOG_FLOOR).ln(),
        ];
        if family != Fb8Family::Fb5 {
            x.push(self.eta.clamp(-1.0, 1.0).asin());
        }
        if family == Fb8Family::Fb8 {
            x.push(alpha);
            x.push(rho);
        }
        x
    }

    fn into_params(self) -> Fb8Params {
        Fb8Params::from_frame(&self.gamma, &self.nu, self.kappa, self.beta, self.eta)
    }
}

fn decode(family: Fb8Family, base: &Matrix3<f64>, x: &[f64], kappa_max: f64) -> Candidate {
    let rot = Rotation3::from_scaled_axis(Vector3::new(x[0], x[1], x[2]));
    let eta = match family {
        Fb8Family::Fb5 => 1.0,
        _ => x[5].sin(),
    };
    let nu = match family {
        Fb8Family::Fb8 => nu_from_angles(x[6], x[7]),
        _ => Vector3::x(),
    };
    Candidate {
        gamma: base * rot.matrix(),
        kappa: x[3].exp().min(kappa_max),
        beta: x[4].exp().min(kappa_max),
        eta,
        nu,
    }
}

fn steps(family: Fb8Family) -> Vec<f64> {
    let mut s = vec![ANGLE_STEP, ANGLE_STEP, ANGLE_STEP, LOG_STEP, LOG_STEP];
    if family != Fb8Family::Fb5 {
        s.push(ETA_STEP);
    }
    if family == Fb8Family::Fb8 {
        s.push(ALPHA_STEP);
        s.push(RHO_STEP);
    }
    s
}

/// Mean negative log-likelihood of a candidate.
fn mean_nll(c: &Candidate, stats: &SufficientStats) -> f64 {
    let log_c = log_normalizer(c.kappa, c.beta, c.eta, &c.nu);
    let data = data_term(&c.gamma, &c.nu, c.kappa, c.beta, c.eta, stats);
    (stats.n as f64 * log_c - data) / stats.n as f64
}

/// Result of one optimization stage.
struct StageResult {
    candidate: Candidate,
    minimum: Minimum,
}

fn run_stage(
    family: Fb8Family,
    start: &Candidate,
    nu_start: (f64, f64),
    stats: &SufficientStats,
    config: &FitConfig,
) -> StageResult {
    let base = start.gamma;
    let objective = |x: &[f64]| mean_nll(&decode(family, &base, x, config.kappa_max), stats);
    let x0 = start.encode(family, nu_start.0, nu_start.1);
    let minimum = nelder_mead_restarted(
        objective,
        &x0,
        &steps(family),
        config.max_iters,
        config.tolerance,
    );
    tracing::debug!(
        family = ?family,
        nll = minimum.value,
        iterations = minimum.iterations,
        converged = minimum.converged,
        "FB8 stage finished"
    );
    StageResult {
        candidate: decode(family, &base, &minimum.x, config.kappa_max),
        minimum,
    }
}

/// Largest family up to `config.family` that `n` samples support.
fn supported_family(config: &FitConfig, n: usize) -> Fb8Family {
    [Fb8Family::Fb8, Fb8Family::Fb6]
        .into_iter()
        .find(|f| {
            f.n_params() <= config.family.n_params()
                && n >= config.min_samples_per_param * f.n_params()
        })
        .unwrap_or(Fb8Family::Fb5)
}

/// Draw the configured subset of samples, or all of them.
fn subsample(samples: &[Vector3<f64>], config: &FitConfig) -> Vec<Vector3<f64>> {
    match config.max_samples {
        Some(max) if samples.len() > max => {
            let mut rng = StdRng::seed_from_u64(config.seed);
            let mut idx = sample_indices(&mut rng, samples.len(), max);
            idx.sort_unstable();
            idx.into_iter().map(|i| samples[i]).collect()
        }
        _ => samples.to_vec(),
    }
}

pub(crate) fn sample_indices(rng: &mut impl rand::Rng, n: usize, k: usize) -> Vec<usize> {
    debug_assert!(k <= n);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}

/// Fit an FB8 (or FB5/FB6, per `config.family`) distribution to unit
/// directions by maximum likelihood.
///
/// Sample sets too small for the requested family are fitted with the
/// largest family they support.
///
/// Deterministic: the same samples and configuration always give the same
/// parameters.
pub fn fit_fb8(samples: &[Vector3<f64>], config: &FitConfig) -> Result<Fb8Fit, FitError> {
    let samples = subsample(samples, config);
    let stats = SufficientStats::from_samples(&samples);
    let init = kent_moment_estimate(&stats, config)?;
    tracing::debug!(
        n = stats.n,
        kappa = init.kappa,
        beta = init.beta,
        "moment estimate"
    );

    let start = Candidate {
        gamma: init.gamma(),
        kappa: init.kappa,
        beta: init.beta,
        eta: 1.0,
        nu: Vector3::x(),
    };
    let family = supported_family(config, stats.n);
    if family != config.family {
        tracing::debug!(
            n = stats.n,
            requested = ?config.family,
            fitted = ?family,
            "too few samples for the requested family"
        );
    }

    let mut best = run_stage(Fb8Family::Fb5, &start, (0.0, 0.0), &stats, config);

    if family != Fb8Family::Fb5 {
        let fb6 = run_stage(Fb8Family::Fb6, &best.candidate, (0.0, 0.0), &stats, config);
        if fb6.minimum.value <= best.minimum.value {
            best = fb6;
        }
    }

    if family == Fb8Family::Fb8 {
        let from = best.candidate;
        for &nu_start in &NU_STARTS {
            let fb8 = run_stage(Fb8Family::Fb8, &from, nu_start, &stats, config);
            if fb8.minimum.value < best.minimum.value {
                best = fb8;
            }
        }
    }

    let params = best.candidate.into_params();
    if !params.is_finite() || !best.minimum.value.is_finite() || best.minimum.value == f64::MAX {
        return Err(FitError::NonFinite);
    }
    let model = Fb8Distribution::new(params);
    if !model.log_normalizer().is_finite() {
        return Err(FitError::NonFinite);
    }

    Ok(Fb8Fit {
        model,
        neg_log_likelihood: best.minimum.value * stats.n as f64,
        n_samples: stats.n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_anisotropic_cone, sample_cone};
    use approx::assert_relative_eq;

    fn quick(family: Fb8Family) -> FitConfig {
        FitConfig {
            family,
            max_iters: 400,
            tolerance: 1e-9,
            kappa_max: 500.0,
            ..FitConfig::default()
        }
    }

    #[test]
    fn fb5_recovers_mean_axis_and_concentration() {
        let mut rng = StdRng::seed_from_u64(3);
        let axis = Vector3::new(-0.4, 0.3, 0.6).normalize();
        let xs = sample_cone(&mut rng, &axis, 0.2, 500);
        let fit = fit_fb8(&xs, &quick(Fb8Family::Fb5)).unwrap();

        assert_eq!(fit.n_samples, 500);
        assert_eq!(fit.model.family_name(), "FB5");
        assert!(fit.model.mean_axis().dot(&axis) > 0.995);
        // Tangent spread 0.2 rad corresponds to κ ≈ 25.
        assert!(fit.model.kappa() > 15.0 && fit.model.kappa() < 40.0);

        let stats = SufficientStats::from_samples(&xs);
        assert_relative_eq!(
            -fit.model.log_likelihood(&stats),
            fit.neg_log_likelihood,
            epsilon = 1e-8,
            max_relative = 1e-9
        );
    }

    #[test]
    fn fit_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(5);
        let xs = sample_anisotropic_cone(&mut rng, &Vector3::y(), &Vector3::z(), 0.3, 0.1, 300);
        let config = quick(Fb8Family::Fb6);
        let a = fit_fb8(&xs, &config).unwrap();
        let b = fit_fb8(&xs, &config).unwrap();
        assert_eq!(a.model.params(), b.model.params());
        assert_eq!(a.neg_log_likelihood, b.neg_log_likelihood);
    }

    #[test]
    fn larger_family_never_fits_worse() {
        let mut rng = StdRng::seed_from_u64(9);
        let xs = sample_anisotropic_cone(&mut rng, &Vector3::x(), &Vector3::y(), 0.35, 0.1, 300);
        let fb5 = fit_fb8(&xs, &quick(Fb8Family::Fb5)).unwrap();
        let fb8 = fit_fb8(&xs, &quick(Fb8Family::Fb8)).unwrap();
        assert!(fb8.neg_log_likelihood <= fb5.neg_log_likelihood + 1e-9);
        assert!(fb8.model.params().is_finite());
        assert!(fb8.model.eta() >= -1.0 && fb8.model.eta() <= 1.0);
    }

    #[test]
    fn elongated_samples_give_positive_beta() {
        let mut rng = StdRng::seed_from_u64(13);
        let xs = sample_anisotropic_cone(&mut rng, &Vector3::z(), &Vector3::x(), 0.3, 0.08, 400);
        let fit = fit_fb8(&xs, &quick(Fb8Family::Fb5)).unwrap();
        assert!(fit.model.beta() > 1.0);
        let g2 = fit.model.gamma().column(1).into_owned();
        assert!(g2.dot(&Vector3::x()).abs() > 0.95);
    }

    #[test]
    fn repeated_point_fails_gracefully() {
        let xs = vec![Vector3::new(0.0, 0.6, 0.8); 20];
        let err = fit_fb8(&xs, &FitConfig::default()).unwrap_err();
        assert!(matches!(err, FitError::Degenerate { .. }));
    }

    #[test]
    fn subsampling_is_seeded() {
        let mut rng = StdRng::seed_from_u64(17);
        let xs = sample_cone(&mut rng, &Vector3::z(), 0.3, 400);
        let config = FitConfig {
            max_samples: Some(60),
            ..quick(Fb8Family::Fb5)
        };
        let a = fit_fb8(&xs, &config).unwrap();
        assert_eq!(a.n_samples, 60);
        let b = fit_fb8(&xs, &config).unwrap();
        assert_eq!(a.model.params(), b.model.params());
    }

    #[test]
    fn fitter_trait_returns_model() {
        let mut rng = StdRng::seed_from_u64(19);
        let xs = sample_cone(&mut rng, &Vector3::x(), 0.25, 200);
        let fitter = Fb8Fitter::new(quick(Fb8Family::Fb5));
        let model = fitter.fit(&xs).unwrap();
        assert!(model.mean_axis().dot(&Vector3::x()) > 0.99);
    }

    #[test]
    fn stages_follow_sample_count() {
        let config = FitConfig::default();
        assert_eq!(supported_family(&config, 16), Fb8Family::Fb8);
        assert_eq!(supported_family(&config, 15), Fb8Family::Fb6);
        assert_eq!(supported_family(&config, 11), Fb8Family::Fb5);
        assert_eq!(supported_family(&quick(Fb8Family::Fb6), 500), Fb8Family::Fb6);
        assert_eq!(supported_family(&quick(Fb8Family::Fb5), 500), Fb8Family::Fb5);
    }

    #[test]
    fn small_sample_sets_keep_kent_fit() {
        let mut rng = StdRng::seed_from_u64(23);
        let xs = sample_cone(&mut rng, &Vector3::y(), 0.2, 10);
        let fit = fit_fb8(&xs, &quick(Fb8Family::Fb8)).unwrap();
        assert_eq!(fit.model.family_name(), "FB5");
        assert!(fit.model.mean_axis().dot(&Vector3::y()) > 0.9);
    }

    #[test]
    fn three_directions_fit_with_default_config() {
        let mut rng = StdRng::seed_from_u64(29);
        let xs = sample_cone(&mut rng, &Vector3::z(), 0.2, 3);
        let config = FitConfig::default();
        let fit = fit_fb8(&xs, &config).unwrap();
        assert_eq!(fit.n_samples, 3);
        assert!(fit.neg_log_likelihood.is_finite());
        assert!(fit.model.kappa() <= config.kappa_max);
        assert!(fit.model.mean_axis().dot(&Vector3::z()) > 0.9);
    }

    #[test]
    fn tight_cone_at_concentration_cap_fits() {
        let mut rng = StdRng::seed_from_u64(31);
        let xs = sample_cone(&mut rng, &Vector3::x(), 1e-4, 50);
        let config = FitConfig {
            family: Fb8Family::Fb5,
            ..FitConfig::default()
        };
        let fit = fit_fb8(&xs, &config).unwrap();
        assert!(fit.model.kappa() > 0.99 * config.kappa_max);
        // Laplace form of a capped, isotropic cap: ln c ≈ κ + ln(2π/κ).
        let kappa = config.kappa_max;
        assert_relative_eq!(
            fit.model.log_normalizer(),
            kappa + (2.0 * PI / kappa).ln(),
            epsilon = 0.5
        );
    }
}
