//! Directional distributions on the unit sphere.
//!
//! Two traits form the seam between the per-bone orchestration and the
//! statistics:
//!
//! - [`DirectionalModel`]: a fitted density over unit directions,
//! - [`DirectionalFitter`]: estimates a model from sample directions.
//!
//! The concrete implementation is the Fisher–Bingham FB8 family
//! ([`Fb8Distribution`], fitted by [`Fb8Fitter`]), which contains the Kent
//! (FB5) distribution as a special case.

mod fb8;
mod mle;
mod moments;
mod normalize;
mod optimizer;
mod types;

use nalgebra::Vector3;

pub use fb8::{Fb8Distribution, Fb8Params};
pub use mle::{fit_fb8, Fb8Fit, Fb8Fitter};
pub(crate) use mle::sample_indices;
pub use moments::{kent_moment_estimate, SufficientStats};
pub use types::{Fb8Family, FitConfig, FitError};

/// A probability density over unit directions.
pub trait DirectionalModel {
    /// Natural log of the density at a unit direction.
    fn log_density(&self, direction: &Vector3<f64>) -> f64;

    /// Density at a unit direction.
    fn density(&self, direction: &Vector3<f64>) -> f64 {
        self.log_density(direction).exp()
    }

    /// Check that the parameters describe a valid density, e.g. after
    /// loading a model from disk.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Estimates a [`DirectionalModel`] from sample directions.
pub trait DirectionalFitter {
    type Model: DirectionalModel;

    fn fit(&self, samples: &[Vector3<f64>]) -> Result<Self::Model, FitError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    /// ∫ f over a lat-long midpoint grid.
    fn integrate(model: &impl DirectionalModel, n: usize) -> f64 {
        let dt = PI / n as f64;
        let dp = 2.0 * PI / (2 * n) as f64;
        let mut sum = 0.0;
        for i in 0..n {
            let t = (i as f64 + 0.5) * dt;
            for j in 0..2 * n {
                let p = (j as f64 + 0.5) * dp;
                let x = Vector3::new(t.sin() * p.cos(), t.sin() * p.sin(), t.cos());
                sum += model.density(&x) * t.sin() * dt * dp;
            }
        }
        sum
    }

    #[test]
    fn fb8_density_integrates_to_one() {
        let models = [
            Fb8Params::kent(0.4, 1.0, 0.3, 15.0, 4.0),
            Fb8Params {
                theta: 2.0,
                phi: -1.2,
                psi: 0.7,
                kappa: 6.0,
                beta: 4.0,
                eta: -0.5,
                alpha: 1.1,
                rho: 2.4,
            },
            Fb8Params::kent(1.0, 0.0, 0.0, 0.0, 0.0),
        ];
        for p in models {
            let d = Fb8Distribution::new(p);
            assert_relative_eq!(integrate(&d, 400), 1.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn density_is_exp_of_log_density() {
        let d = Fb8Distribution::new(Fb8Params::kent(0.3, 0.2, 0.1, 5.0, 1.0));
        let x = Vector3::new(0.1, 0.9, 0.3).normalize();
        assert_relative_eq!(d.density(&x), d.log_density(&x).exp());
        assert_relative_eq!(d.density(&x), d.pdf(&x));
    }
}
