//! FB8 density, parameterisation and serialization.
//!
//! Density on the unit sphere:
//!
//!   f(x) = exp(κ ν·y + β (y₂² − η y₃²)) / c(κ, β, η, ν),   y = Γᵀ x
//!
//! with Γ = [γ₁ γ₂ γ₃] an orthonormal frame, κ, β ≥ 0, η ∈ [−1, 1] and
//! ν = (cos α, sin α cos ρ, sin α sin ρ) a unit vector expressed in the
//! model frame. ν = (1, 0, 0) with η = 1 is the Kent (FB5) distribution.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use super::moments::SufficientStats;
use super::normalize::log_normalizer;
use super::DirectionalModel;

/// Tolerance for treating η and ν as their FB5 values when labelling.
const FAMILY_EPS: f64 = 1e-9;

/// Raw FB8 parameters. Angles are in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fb8Params {
    /// Inclination of the mean axis γ₁ from +z.
    pub theta: f64,
    /// Azimuth of the mean axis γ₁ from +x.
    pub phi: f64,
    /// Rotation of (γ₂, γ₃) about γ₁.
    pub psi: f64,
    /// Concentration.
    pub kappa: f64,
    /// Ovalness.
    pub beta: f64,
    /// Relative weight of the γ₃ term.
    pub eta: f64,
    /// Polar angle of ν in the model frame.
    pub alpha: f64,
    /// Azimuth of ν in the model frame.
    pub rho: f64,
}

impl Fb8Params {
    /// Kent (FB5) parameters.
    pub fn kent(theta: f64, phi: f64, psi: f64, kappa: f64, beta: f64) -> Self {
        Self {
            theta,
            phi,
            psi,
            kappa,
            beta,
            eta: 1.0,
            alpha: 0.0,
            rho: 0.0,
        }
    }

    /// Build parameters from an orthonormal right-handed frame and ν.
    ///
    /// Angles are recovered in canonical ranges: θ ∈ [0, π], φ, ψ, ρ ∈
    /// (−π, π], α ∈ [0, π].
    pub fn from_frame(
        gamma: &Matrix3<f64>,
        nu: &Vector3<f64>,
        kappa: f64,
        beta: f64,
        eta: f64,
    ) -> Self {
        let g1 = gamma.column(0).into_owned();
        let g2 = gamma.column(1).into_owned();
        let theta = g1.z.clamp(-1.0, 1.0).acos();
        let phi = g1.y.atan2(g1.x);
        let base = frame(theta, phi, 0.0);
        let psi = g2
            .dot(&base.column(2).into_owned())
            .atan2(g2.dot(&base.column(1).into_owned()));

        let nu = nu.normalize();
        let alpha = nu.x.clamp(-1.0, 1.0).acos();
        let rho = if nu.y.abs() < FAMILY_EPS && nu.z.abs() < FAMILY_EPS {
            0.0
        } else {
            nu.z.atan2(nu.y)
        };

        Self {
            theta,
            phi,
            psi,
            kappa,
            beta,
            eta,
            alpha,
            rho,
        }
    }

    /// Orientation frame Γ with columns γ₁, γ₂, γ₃.
    pub fn gamma(&self) -> Matrix3<f64> {
        frame(self.theta, self.phi, self.psi)
    }

    /// ν in the model frame.
    pub fn nu(&self) -> Vector3<f64> {
        nu_from_angles(self.alpha, self.rho)
    }

    /// Parameter domain: all values finite, κ, β ≥ 0 and |η| ≤ 1.
    pub fn validate(&self) -> Result<(), String> {
        if !self.is_finite() {
            return Err("parameters must be finite".to_string());
        }
        if self.kappa < 0.0 {
            return Err(format!("kappa must be >= 0, got {}", self.kappa));
        }
        if self.beta < 0.0 {
            return Err(format!("beta must be >= 0, got {}", self.beta));
        }
        if self.eta.abs() > 1.0 {
            return Err(format!("eta must lie in [-1, 1], got {}", self.eta));
        }
        Ok(())
    }

    pub fn is_finite(&self) -> bool {
        [
            self.theta, self.phi, self.psi, self.kappa, self.beta, self.eta, self.alpha, self.rho,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Orthonormal frame from mean-axis angles and the in-plane rotation ψ.
///
/// γ₁ = (sinθ cosφ, sinθ sinφ, cosθ); (γ₂, γ₃) are the local
/// (∂/∂θ, ∂/∂φ) directions rotated by ψ about γ₁.
pub(crate) fn frame(theta: f64, phi: f64, psi: f64) -> Matrix3<f64> {
    let (st, ct) = theta.sin_cos();
    let (sp, cp) = phi.sin_cos();
    let (ss, cs) = psi.sin_cos();

    let g1 = Vector3::new(st * cp, st * sp, ct);
    let e2 = Vector3::new(ct * cp, ct * sp, -st);
    let e3 = Vector3::new(-sp, cp, 0.0);
    let g2 = e2 * cs + e3 * ss;
    let g3 = e3 * cs - e2 * ss;
    Matrix3::from_columns(&[g1, g2, g3])
}

pub(crate) fn nu_from_angles(alpha: f64, rho: f64) -> Vector3<f64> {
    let (sa, ca) = alpha.sin_cos();
    let (sr, cr) = rho.sin_cos();
    Vector3::new(ca, sa * cr, sa * sr)
}

/// Unnormalized log-density in model-frame coordinates `y`.
#[inline]
pub(crate) fn exponent(y: &Vector3<f64>, kappa: f64, beta: f64, eta: f64, nu: &Vector3<f64>) -> f64 {
    kappa * nu.dot(y) + beta * (y.y * y.y - eta * y.z * y.z)
}

/// Σᵢ exponent(Γᵀ xᵢ) from sufficient statistics.
pub(crate) fn data_term(
    gamma: &Matrix3<f64>,
    nu: &Vector3<f64>,
    kappa: f64,
    beta: f64,
    eta: f64,
    stats: &SufficientStats,
) -> f64 {
    let g2 = gamma.column(1);
    let g3 = gamma.column(2);
    let linear = nu.dot(&(gamma.transpose() * stats.sum));
    let q2 = (g2.transpose() * stats.scatter * g2)[(0, 0)];
    let q3 = (g3.transpose() * stats.scatter * g3)[(0, 0)];
    kappa * linear + beta * (q2 - eta * q3)
}

/// Fitted FB8 distribution with cached normalizer.
///
/// Serializes as [`Fb8Params`]; the normalizer is recomputed on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Fb8Params", into = "Fb8Params")]
pub struct Fb8Distribution {
    params: Fb8Params,
    gamma: Matrix3<f64>,
    nu: Vector3<f64>,
    log_c: f64,
}

impl Fb8Distribution {
    pub fn new(params: Fb8Params) -> Self {
        let gamma = params.gamma();
        let nu = params.nu();
        let log_c = log_normalizer(params.kappa, params.beta, params.eta, &nu);
        Self {
            params,
            gamma,
            nu,
            log_c,
        }
    }

    pub fn params(&self) -> &Fb8Params {
        &self.params
    }

    pub fn kappa(&self) -> f64 {
        self.params.kappa
    }

    pub fn beta(&self) -> f64 {
        self.params.beta
    }

    pub fn eta(&self) -> f64 {
        self.params.eta
    }

    /// ν in the model frame.
    pub fn nu(&self) -> Vector3<f64> {
        self.nu
    }

    /// Orientation frame Γ with columns γ₁, γ₂, γ₃.
    pub fn gamma(&self) -> &Matrix3<f64> {
        &self.gamma
    }

    /// Mean axis γ₁ in world coordinates.
    pub fn mean_axis(&self) -> Vector3<f64> {
        self.gamma.column(0).into_owned()
    }

    /// Natural log of the normalizing constant c(κ, β, η, ν).
    pub fn log_normalizer(&self) -> f64 {
        self.log_c
    }

    /// Log-density at a unit direction in world coordinates.
    pub fn log_pdf(&self, x: &Vector3<f64>) -> f64 {
        let y = self.gamma.transpose() * x;
        exponent(&y, self.params.kappa, self.params.beta, self.params.eta, &self.nu) - self.log_c
    }

    /// Density at a unit direction in world coordinates.
    pub fn pdf(&self, x: &Vector3<f64>) -> f64 {
        self.log_pdf(x).exp()
    }

    /// Total log-likelihood of a sample set.
    pub fn log_likelihood(&self, stats: &SufficientStats) -> f64 {
        data_term(
            &self.gamma,
            &self.nu,
            self.params.kappa,
            self.params.beta,
            self.params.eta,
            stats,
        ) - stats.n as f64 * self.log_c
    }

    /// Sub-family label: `FB4`, `FB5`, `FB6` or `FB8`.
    pub fn family_name(&self) -> &'static str {
        let nu_is_pole = (1.0 - self.nu.x).abs() < FAMILY_EPS;
        if !nu_is_pole {
            return "FB8";
        }
        if (self.params.eta - 1.0).abs() < FAMILY_EPS {
            "FB5"
        } else if (self.params.eta + 1.0).abs() < FAMILY_EPS {
            "FB4"
        } else {
            "FB6"
        }
    }
}

impl From<Fb8Params> for Fb8Distribution {
    fn from(params: Fb8Params) -> Self {
        Self::new(params)
    }
}

impl From<Fb8Distribution> for Fb8Params {
    fn from(d: Fb8Distribution) -> Self {
        d.params
    }
}

impl DirectionalModel for Fb8Distribution {
    fn log_density(&self, direction: &Vector3<f64>) -> f64 {
        self.log_pdf(direction)
    }

    fn validate(&self) -> Result<(), String> {
        self.params.validate()
    }
}

impl std::fmt::Display for Fb8Distribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self.family_name();
        write!(f, "{}(κ = {:.1}, β = {:.1}", name, self.kappa(), self.beta())?;
        match name {
            "FB6" => write!(f, ", η = {:.1}", self.eta())?,
            "FB8" => write!(
                f,
                ", η = {:.1}, ν = ({:.3}, {:.3}, {:.3})",
                self.eta(),
                self.nu.x,
                self.nu.y,
                self.nu.z
            )?,
            _ => {}
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn frame_is_right_handed_orthonormal() {
        for &(t, p, s) in &[(0.0, 0.0, 0.0), (0.4, -2.0, 1.3), (3.0, 0.7, -0.2)] {
            let g = frame(t, p, s);
            assert_relative_eq!(g.transpose() * g, Matrix3::identity(), epsilon = 1e-12);
            assert_relative_eq!(g.determinant(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn frame_pole_axes() {
        let g = frame(0.0, 0.0, 0.0);
        assert_relative_eq!(g.column(0).into_owned(), Vector3::z(), epsilon = 1e-15);
        assert_relative_eq!(g.column(1).into_owned(), Vector3::x(), epsilon = 1e-15);
        assert_relative_eq!(g.column(2).into_owned(), Vector3::y(), epsilon = 1e-15);
    }

    #[test]
    fn from_frame_recovers_angles() {
        let p = Fb8Params {
            theta: 1.1,
            phi: -0.6,
            psi: 2.2,
            kappa: 5.0,
            beta: 1.0,
            eta: 0.3,
            alpha: 0.8,
            rho: -1.4,
        };
        let q = Fb8Params::from_frame(&p.gamma(), &p.nu(), p.kappa, p.beta, p.eta);
        assert_relative_eq!(q.theta, p.theta, epsilon = 1e-12);
        assert_relative_eq!(q.phi, p.phi, epsilon = 1e-12);
        assert_relative_eq!(q.psi, p.psi, epsilon = 1e-12);
        assert_relative_eq!(q.alpha, p.alpha, epsilon = 1e-12);
        assert_relative_eq!(q.rho, p.rho, epsilon = 1e-12);
    }

    #[test]
    fn kent_density_peaks_on_mean_axis() {
        let d = Fb8Distribution::new(Fb8Params::kent(0.7, 0.2, 0.0, 30.0, 5.0));
        let mean = d.mean_axis();
        let off = (mean + d.gamma().column(1).into_owned() * 0.2).normalize();
        assert!(d.pdf(&mean) > d.pdf(&off));
        assert!(d.pdf(&mean) > d.pdf(&-mean));
        assert_eq!(d.family_name(), "FB5");
    }

    #[test]
    fn family_labels() {
        let mut p = Fb8Params::kent(0.0, 0.0, 0.0, 3.0, 1.0);
        p.eta = -1.0;
        assert_eq!(Fb8Distribution::new(p).family_name(), "FB4");
        p.eta = 0.5;
        assert_eq!(Fb8Distribution::new(p).family_name(), "FB6");
        p.alpha = 0.3;
        let d = Fb8Distribution::new(p);
        assert_eq!(d.family_name(), "FB8");
        assert!(d.to_string().starts_with("FB8(κ = 3.0, β = 1.0, η = 0.5, ν = ("));
    }

    #[test]
    fn json_round_trip_preserves_density() {
        let d = Fb8Distribution::new(Fb8Params {
            theta: 0.9,
            phi: 1.2,
            psi: -0.4,
            kappa: 12.0,
            beta: 3.0,
            eta: 0.6,
            alpha: 0.5,
            rho: 2.0,
        });
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"kappa\":12.0"));
        let back: Fb8Distribution = serde_json::from_str(&json).unwrap();
        let x = Vector3::new(0.3, -0.5, 0.8).normalize();
        assert_relative_eq!(back.log_pdf(&x), d.log_pdf(&x), epsilon = 1e-12);
        assert_relative_eq!(back.log_normalizer(), d.log_normalizer(), epsilon = 1e-12);
    }

    #[test]
    fn log_likelihood_matches_pointwise_sum() {
        let d = Fb8Distribution::new(Fb8Params {
            theta: 0.3,
            phi: 0.1,
            psi: 0.5,
            kappa: 8.0,
            beta: 2.0,
            eta: 0.4,
            alpha: 0.6,
            rho: 0.9,
        });
        let xs = vec![
            Vector3::new(0.1, 0.2, 0.97).normalize(),
            Vector3::new(-0.3, 0.1, 0.9).normalize(),
            Vector3::new(0.5, 0.5, 0.5).normalize(),
        ];
        let stats = SufficientStats::from_samples(&xs);
        let pointwise: f64 = xs.iter().map(|x| d.log_pdf(x)).sum();
        assert_relative_eq!(d.log_likelihood(&stats), pointwise, epsilon = 1e-10);
    }
}
