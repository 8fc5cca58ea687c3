//! Normalizing constant of the FB8 density.
//!
//! The constant is rotation invariant, so everything happens in the model
//! frame. When every local maximum of the exponent `g` is sharp enough, the
//! constant is the sum of Laplace approximations at the maxima:
//!
//!   c ≈ Σₘ 2π e^{g(m)} / √det H(m)
//!
//! with H the negated tangent-plane Hessian of `g`. Otherwise it is computed
//! by quadrature, with the sphere parameterised around the density mode `m`:
//!
//!   y(u, ω) = (1 − u) m + √(u (2 − u)) (cos ω a + sin ω b),   u ∈ [0, 2]
//!
//! for which the area element is simply `du dω`. The `u` range is covered by
//! Gauss–Legendre panels whose widths grow geometrically away from the mode
//! (capped for very concentrated densities); `ω` uses the periodic trapezoid
//! rule with a step count proportional to the ring radius. Rings whose
//! exponent bound lies far below the mode are skipped. Sums are accumulated
//! relative to the exponent at the mode, so large κ does not overflow.

use std::f64::consts::{PI, TAU};

use nalgebra::Vector3;

use super::fb8::exponent;
use crate::sphere::orthonormal_basis;

/// 8-point Gauss–Legendre nodes on [−1, 1].
const GL_NODES: [f64; 8] = [
    -0.960_289_856_497_536_2,
    -0.796_666_477_413_626_7,
    -0.525_532_409_916_329_0,
    -0.183_434_642_495_649_8,
    0.183_434_642_495_649_8,
    0.525_532_409_916_329_0,
    0.796_666_477_413_626_7,
    0.960_289_856_497_536_2,
];

/// 8-point Gauss–Legendre weights on [−1, 1].
const GL_WEIGHTS: [f64; 8] = [
    0.101_228_536_290_376_3,
    0.222_381_034_453_374_5,
    0.313_706_645_877_887_3,
    0.362_683_783_378_362_0,
    0.362_683_783_378_362_0,
    0.313_706_645_877_887_3,
    0.222_381_034_453_374_5,
    0.101_228_536_290_376_3,
];

const MIN_AZIMUTH_STEPS: usize = 64;
const MAX_AZIMUTH_STEPS: usize = 1024;
const MAX_PANEL_WIDTH: f64 = 0.5;
const MIN_PANEL_WIDTH: f64 = 0.02;

/// Largest leading-order Laplace error in `ln c` accepted at a mode.
const LAPLACE_TOLERANCE: f64 = 2e-3;
/// Rings bounded this far below the mode exponent are skipped.
const NEGLIGIBLE_EXPONENT: f64 = 60.0;
/// Relative curvature below which a stationary point is a saddle or minimum.
const SADDLE_TOLERANCE: f64 = 1e-6;
/// Refined points closer than this are the same mode.
const MERGE_DISTANCE: f64 = 1e-3;
/// Grid local maxima refined into modes, best first.
const MAX_GRID_SEEDS: usize = 8;
const ASCENT_ITERS: usize = 200;

const GRID_THETA: usize = 12;
const GRID_PHI: usize = 24;

/// `ln c(κ, β, η, ν)` where `c = ∫ exp(κ ν·y + β (y₂² − η y₃²)) dy`.
pub(crate) fn log_normalizer(kappa: f64, beta: f64, eta: f64, nu: &Vector3<f64>) -> f64 {
    let modes = local_modes(kappa, beta, eta, nu);
    laplace_log_normalizer(&modes, kappa, beta, eta, nu)
        .unwrap_or_else(|| quadrature_log_normalizer(&modes[0].0, kappa, beta, eta, nu))
}

/// Effective concentration; sets the angular length scale of peaks.
fn concentration(kappa: f64, beta: f64, eta: f64) -> f64 {
    kappa.abs() + 2.0 * beta.abs() * (1.0 + eta.abs())
}

/// Bilinear form of the quadratic part, `β (v₂ w₂ − η v₃ w₃)`.
fn quad(beta: f64, eta: f64, v: &Vector3<f64>, w: &Vector3<f64>) -> f64 {
    beta * (v.y * w.y - eta * v.z * w.z)
}

fn gradient(kappa: f64, beta: f64, eta: f64, nu: &Vector3<f64>, y: &Vector3<f64>) -> Vector3<f64> {
    nu * kappa + Vector3::new(0.0, 2.0 * beta * y.y, -2.0 * beta * eta * y.z)
}

/// Sum of Laplace approximations over the maxima in `modes`.
///
/// The error at a mode comes from the area element and the quartic term,
/// about `1/λ + g_r/λ²` for the smallest tangent curvature `λ` and the
/// radial gradient `g_r`. `None` when some maximum exceeds
/// [`LAPLACE_TOLERANCE`] or is not yet stationary.
fn laplace_log_normalizer(
    modes: &[(Vector3<f64>, f64)],
    kappa: f64,
    beta: f64,
    eta: f64,
    nu: &Vector3<f64>,
) -> Option<f64> {
    let conc = concentration(kappa, beta, eta);
    let mut terms = Vec::with_capacity(modes.len());
    for (m, value) in modes {
        let (a, b) = orthonormal_basis(m);
        let grad = gradient(kappa, beta, eta, nu, m);
        let radial = grad.dot(m);
        let h_aa = radial - 2.0 * quad(beta, eta, &a, &a);
        let h_bb = radial - 2.0 * quad(beta, eta, &b, &b);
        let h_ab = -2.0 * quad(beta, eta, &a, &b);
        let det = h_aa * h_bb - h_ab * h_ab;
        let lambda_min =
            0.5 * (h_aa + h_bb) - (0.25 * (h_aa - h_bb).powi(2) + h_ab * h_ab).sqrt();

        let tangent_grad = (grad - m * radial).norm();
        if tangent_grad > MERGE_DISTANCE * lambda_min.abs().max(1.0) {
            return None;
        }
        if lambda_min < -SADDLE_TOLERANCE * conc {
            continue;
        }
        let error = 1.0 / lambda_min + radial.abs() / lambda_min.powi(2);
        if lambda_min <= 0.0 || error > LAPLACE_TOLERANCE {
            return None;
        }
        terms.push(value + TAU.ln() - 0.5 * det.ln());
    }

    let top = terms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !top.is_finite() {
        return None;
    }
    let sum: f64 = terms.iter().map(|t| (t - top).exp()).sum();
    Some(top + sum.ln())
}

/// Upper bound of the exponent over the ring at `u`, by Cauchy–Schwarz on
/// the azimuthal terms.
struct RingBound {
    lin_axial: f64,
    lin_ring: f64,
    quad_axial: f64,
    quad_cross: f64,
    quad_ring: f64,
}

impl RingBound {
    fn new(
        m: &Vector3<f64>,
        a: &Vector3<f64>,
        b: &Vector3<f64>,
        kappa: f64,
        beta: f64,
        eta: f64,
        nu: &Vector3<f64>,
    ) -> Self {
        let aa = quad(beta, eta, a, a);
        let bb = quad(beta, eta, b, b);
        let ab = quad(beta, eta, a, b);
        Self {
            lin_axial: kappa * nu.dot(m),
            lin_ring: kappa.abs() * nu.dot(a).hypot(nu.dot(b)),
            quad_axial: quad(beta, eta, m, m),
            quad_cross: quad(beta, eta, m, a).hypot(quad(beta, eta, m, b)),
            quad_ring: 0.5 * (aa + bb) + (0.25 * (aa - bb).powi(2) + ab * ab).sqrt(),
        }
    }

    fn at(&self, u: f64, radial: f64) -> f64 {
        let s = 1.0 - u;
        s * self.lin_axial
            + radial * self.lin_ring
            + s * s * self.quad_axial
            + 2.0 * s.abs() * radial * self.quad_cross
            + radial * radial * self.quad_ring
    }
}

fn quadrature_log_normalizer(
    mode: &Vector3<f64>,
    kappa: f64,
    beta: f64,
    eta: f64,
    nu: &Vector3<f64>,
) -> f64 {
    let g = |y: &Vector3<f64>| exponent(y, kappa, beta, eta, nu);
    let (a, b) = orthonormal_basis(mode);
    let shift = g(mode);
    let bound = RingBound::new(mode, &a, &b, kappa, beta, eta, nu);

    let conc = concentration(kappa, beta, eta);
    let scale = conc.max(1e-12).sqrt();
    let max_width = (4.0 / scale).clamp(MIN_PANEL_WIDTH, MAX_PANEL_WIDTH);
    let first_width = (1.0 / (1.0 + conc)).min(max_width);

    let mut sum = 0.0;
    for (lo, hi) in panels(first_width, max_width) {
        let half = 0.5 * (hi - lo);
        let mid = 0.5 * (hi + lo);
        for (node, weight) in GL_NODES.iter().zip(GL_WEIGHTS.iter()) {
            let u = mid + half * node;
            let radial = (u * (2.0 - u)).max(0.0).sqrt();
            if bound.at(u, radial) - shift < -NEGLIGIBLE_EXPONENT {
                continue;
            }
            // Even count keeps antipodal ring points paired.
            let n_az = ((TAU * radial * scale).ceil() as usize)
                .clamp(MIN_AZIMUTH_STEPS, MAX_AZIMUTH_STEPS)
                .next_multiple_of(2);
            let dw = TAU / n_az as f64;
            let axial = mode * (1.0 - u);
            let ring_sum: f64 = (0..n_az)
                .map(|k| {
                    let (s, c) = (k as f64 * dw).sin_cos();
                    (g(&(axial + (a * c + b * s) * radial)) - shift).exp()
                })
                .sum();
            sum += weight * half * ring_sum * dw;
        }
    }

    if sum > 0.0 && sum.is_finite() {
        shift + sum.ln()
    } else {
        f64::INFINITY
    }
}

/// Integration panels over `u ∈ [0, 2]`, refined geometrically towards both
/// the mode (`u = 0`) and its antipode (`u = 2`).
fn panels(first_width: f64, max_width: f64) -> Vec<(f64, f64)> {
    let mut edges = vec![0.0];
    let mut x = 0.0;
    let mut width = first_width;
    while x < 1.0 {
        x = (x + width).min(1.0);
        edges.push(x);
        width = (width * 2.0).min(max_width);
    }

    let mut out: Vec<(f64, f64)> = edges.windows(2).map(|w| (w[0], w[1])).collect();
    let mirrored: Vec<(f64, f64)> = out.iter().rev().map(|&(lo, hi)| (2.0 - hi, 2.0 - lo)).collect();
    out.extend(mirrored);
    out
}

/// Direction (model frame) maximizing the FB8 exponent.
///
/// For girdle-shaped densities any point on the ridge is returned.
pub(crate) fn find_mode(kappa: f64, beta: f64, eta: f64, nu: &Vector3<f64>) -> Vector3<f64> {
    local_modes(kappa, beta, eta, nu)[0].0
}

/// Stationary points of the exponent reached by ascent, highest first.
///
/// Seeds are ±ν and the best local maxima of a coarse grid, each refined by
/// damped projected gradient ascent. A seed sitting on a saddle stays there,
/// so callers classify the points by curvature. Never empty.
fn local_modes(kappa: f64, beta: f64, eta: f64, nu: &Vector3<f64>) -> Vec<(Vector3<f64>, f64)> {
    let g = |y: &Vector3<f64>| exponent(y, kappa, beta, eta, nu);

    let grid: Vec<Vector3<f64>> = (0..GRID_THETA * GRID_PHI)
        .map(|k| {
            let theta = ((k / GRID_PHI) as f64 + 0.5) * PI / GRID_THETA as f64;
            let phi = (k % GRID_PHI) as f64 * TAU / GRID_PHI as f64;
            let (st, ct) = theta.sin_cos();
            let (sp, cp) = phi.sin_cos();
            Vector3::new(ct, st * cp, st * sp)
        })
        .collect();
    let values: Vec<f64> = grid.iter().map(|y| g(y)).collect();
    let at = |i: usize, j: usize| values[i * GRID_PHI + j % GRID_PHI];

    let mut grid_maxima: Vec<usize> = (0..grid.len())
        .filter(|&k| {
            let (i, j) = (k / GRID_PHI, k % GRID_PHI);
            (i.saturating_sub(1)..=(i + 1).min(GRID_THETA - 1))
                .all(|ii| (j + GRID_PHI - 1..=j + GRID_PHI + 1).all(|jj| at(ii, jj) <= values[k]))
        })
        .collect();
    grid_maxima.sort_by(|&p, &q| values[q].total_cmp(&values[p]));
    grid_maxima.truncate(MAX_GRID_SEEDS);

    let mut seeds = vec![*nu, -nu];
    seeds.extend(grid_maxima.into_iter().map(|k| grid[k]));

    let conc = concentration(kappa, beta, eta);
    let mut modes: Vec<(Vector3<f64>, f64)> = Vec::with_capacity(seeds.len());
    for seed in seeds {
        let (m, value) = if conc > 0.0 {
            ascend(kappa, beta, eta, nu, seed, conc)
        } else {
            (seed, g(&seed))
        };
        if modes.iter().all(|(p, _)| (p - m).norm() > MERGE_DISTANCE) {
            modes.push((m, value));
        }
    }
    modes.sort_by(|p, q| q.1.total_cmp(&p.1));
    modes
}

/// Damped projected gradient ascent of the exponent from `start`.
fn ascend(
    kappa: f64,
    beta: f64,
    eta: f64,
    nu: &Vector3<f64>,
    start: Vector3<f64>,
    conc: f64,
) -> (Vector3<f64>, f64) {
    let g = |y: &Vector3<f64>| exponent(y, kappa, beta, eta, nu);
    let max_step = 1.0 / conc;
    let mut best = start;
    let mut best_val = g(&best);
    let mut step = max_step;
    for _ in 0..ASCENT_ITERS {
        let candidate = (best + gradient(kappa, beta, eta, nu, &best) * step).normalize();
        let val = g(&candidate);
        if val > best_val {
            let moved = (candidate - best).norm();
            best = candidate;
            best_val = val;
            if moved < 1e-12 {
                break;
            }
            step = (2.0 * step).min(max_step);
        } else {
            step *= 0.5;
            if step < 1e-14 * max_step {
                break;
            }
        }
    }
    (best, best_val)
}
