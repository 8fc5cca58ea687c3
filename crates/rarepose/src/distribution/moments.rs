//! Sufficient statistics and Kent's moment estimator.

use nalgebra::{Matrix3, Vector3};

use super::fb8::Fb8Params;
use super::types::{FitConfig, FitError};
use crate::sphere::orthonormal_basis;

/// Sample count, resultant vector Σx and scatter matrix Σxxᵀ of a set of
/// unit directions.
///
/// These are sufficient for the FB8 likelihood, so one objective
/// evaluation costs O(1) in the number of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct SufficientStats {
    pub n: usize,
    pub sum: Vector3<f64>,
    pub scatter: Matrix3<f64>,
}

impl SufficientStats {
    /// Accumulate statistics; inputs are normalized, zero or non-finite
    /// vectors are skipped.
    pub fn from_samples(samples: &[Vector3<f64>]) -> Self {
        let mut stats = Self {
            n: 0,
            sum: Vector3::zeros(),
            scatter: Matrix3::zeros(),
        };
        for x in samples {
            let norm = x.norm();
            if !(norm.is_finite() && norm > 0.0) {
                continue;
            }
            let u = x / norm;
            stats.n += 1;
            stats.sum += u;
            stats.scatter += u * u.transpose();
        }
        stats
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// ‖Σx‖ / n; 1 for a single repeated direction, 0 for an empty set.
    pub fn mean_resultant_length(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        self.sum.norm() / self.n as f64
    }
}

/// Kent's moment estimate of FB5 parameters.
///
/// γ₁ is the sample mean direction (the principal axis of the scatter
/// matrix when the resultant vanishes); γ₂, γ₃ diagonalize the scatter in
/// the tangent plane; κ and β use the large-concentration approximation
///
///   κ = 1/(2 − 2r − q) + 1/(2 − 2r + q),   β = ½ (1/(2 − 2r − q) − 1/(2 − 2r + q))
///
/// with r the mean resultant length and q the tangent-plane eigenvalue gap.
/// κ is capped at `kappa_max`; β is kept in [0, κ/2] so the estimate is
/// unimodal.
pub fn kent_moment_estimate(
    stats: &SufficientStats,
    config: &FitConfig,
) -> Result<Fb8Params, FitError> {
    if stats.n < config.min_samples.max(1) {
        return Err(FitError::TooFewSamples {
            needed: config.min_samples.max(1),
            got: stats.n,
        });
    }
    let n = stats.n as f64;
    let r = stats.mean_resultant_length();
    if r >= config.degenerate_resultant {
        return Err(FitError::Degenerate {
            mean_resultant_length: r,
        });
    }

    let scatter = stats.scatter / n;
    let g1 = if r > 1e-12 {
        stats.sum / (r * n)
    } else {
        let eig = scatter.symmetric_eigen();
        eig.eigenvectors.column(eig.eigenvalues.imax()).into_owned()
    };

    let (a, b) = orthonormal_basis(&g1);
    let saa = a.dot(&(scatter * a));
    let sbb = b.dot(&(scatter * b));
    let sab = a.dot(&(scatter * b));
    let omega = 0.5 * (2.0 * sab).atan2(saa - sbb);
    let q = ((saa - sbb).powi(2) + 4.0 * sab * sab).sqrt();
    let g2 = a * omega.cos() + b * omega.sin();
    let g3 = g1.cross(&g2);
    let gamma = Matrix3::from_columns(&[g1, g2, g3]);

    let d = 2.0 - 2.0 * r;
    let lo = (d - q).max(1.0 / config.kappa_max);
    let hi = (d + q).max(1.0 / config.kappa_max);
    let kappa = (1.0 / lo + 1.0 / hi).min(config.kappa_max);
    let beta = (0.5 * (1.0 / lo - 1.0 / hi)).clamp(0.0, 0.5 * kappa);

    let params = Fb8Params::from_frame(&gamma, &Vector3::x(), kappa, beta, 1.0);
    if !params.is_finite() {
        return Err(FitError::NonFinite);
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_anisotropic_cone, sample_cone};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn stats_skip_degenerate_inputs() {
        let xs = vec![
            Vector3::new(0.0, 0.0, 2.0),
            Vector3::zeros(),
            Vector3::new(f64::NAN, 0.0, 1.0),
            Vector3::new(0.0, 3.0, 0.0),
        ];
        let s = SufficientStats::from_samples(&xs);
        assert_eq!(s.n, 2);
        assert_relative_eq!(s.sum, Vector3::new(0.0, 1.0, 1.0));
        assert_relative_eq!(s.scatter.trace(), 2.0);
        assert_relative_eq!(s.mean_resultant_length(), 2.0f64.sqrt() / 2.0);
    }

    #[test]
    fn repeated_point_is_degenerate() {
        let xs = vec![Vector3::new(0.3, 0.4, 0.5); 10];
        let s = SufficientStats::from_samples(&xs);
        let err = kent_moment_estimate(&s, &FitConfig::default()).unwrap_err();
        assert!(matches!(err, FitError::Degenerate { .. }));
    }

    #[test]
    fn too_few_samples() {
        let xs = vec![Vector3::x(), Vector3::y()];
        let s = SufficientStats::from_samples(&xs);
        let err = kent_moment_estimate(&s, &FitConfig::default()).unwrap_err();
        assert_eq!(err, FitError::TooFewSamples { needed: 3, got: 2 });
    }

    #[test]
    fn recovers_mean_direction() {
        let mut rng = StdRng::seed_from_u64(7);
        let axis = Vector3::new(0.2, -0.5, 0.8).normalize();
        let xs = sample_cone(&mut rng, &axis, 0.15, 2000);
        let s = SufficientStats::from_samples(&xs);
        let p = kent_moment_estimate(&s, &FitConfig::default()).unwrap();
        let g1 = p.gamma().column(0).into_owned();
        assert!(g1.dot(&axis) > 0.999, "mean axis {g1:?}");
        // Isotropic tangent spread 0.15 rad gives κ ≈ 1/0.15².
        assert!(p.kappa > 30.0 && p.kappa < 60.0, "kappa {}", p.kappa);
        assert!(p.beta < 0.25 * p.kappa);
    }

    #[test]
    fn major_axis_follows_elongation() {
        let mut rng = StdRng::seed_from_u64(11);
        let axis = Vector3::z();
        let major = Vector3::x();
        let xs = sample_anisotropic_cone(&mut rng, &axis, &major, 0.3, 0.05, 2000);
        let s = SufficientStats::from_samples(&xs);
        let p = kent_moment_estimate(&s, &FitConfig::default()).unwrap();
        let g2 = p.gamma().column(1).into_owned();
        assert!(g2.dot(&major).abs() > 0.99, "major axis {g2:?}");
        assert!(p.beta > 0.0);
        assert!(p.beta <= 0.5 * p.kappa + 1e-12);
    }
}
