//! Shared synthetic data for unit tests: seeded direction samplers and a
//! small pose corpus.

use nalgebra::Vector3;
use rand::Rng;
use serde_json::json;

use crate::pose::Pose;
use crate::skeleton::Skeleton;
use crate::sphere::orthonormal_basis;

/// Standard normal draw (Box–Muller).
pub(crate) fn gaussian(rng: &mut impl Rng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Unit directions around `axis` with isotropic tangent-plane spread
/// `sigma` (radians).
pub(crate) fn sample_cone(
    rng: &mut impl Rng,
    axis: &Vector3<f64>,
    sigma: f64,
    n: usize,
) -> Vec<Vector3<f64>> {
    let (a, b) = orthonormal_basis(axis);
    (0..n)
        .map(|_| (axis + a * (sigma * gaussian(rng)) + b * (sigma * gaussian(rng))).normalize())
        .collect()
}

/// Unit directions around `axis` spread `sigma_major` along `major`
/// (orthogonal to `axis`) and `sigma_minor` across it.
pub(crate) fn sample_anisotropic_cone(
    rng: &mut impl Rng,
    axis: &Vector3<f64>,
    major: &Vector3<f64>,
    sigma_major: f64,
    sigma_minor: f64,
    n: usize,
) -> Vec<Vector3<f64>> {
    let minor = axis.cross(major).normalize();
    (0..n)
        .map(|_| {
            (axis
                + major * (sigma_major * gaussian(rng))
                + minor * (sigma_minor * gaussian(rng)))
            .normalize()
        })
        .collect()
}

/// Three-joint leg skeleton with two bones: knee->hip, ankle->knee.
pub(crate) fn leg_skeleton() -> Skeleton {
    Skeleton::new(
        "leg",
        &["hip", "knee", "ankle"],
        &[("knee", "hip"), ("ankle", "knee")],
    )
    .expect("leg skeleton is valid")
}

/// Leg poses whose thigh points roughly +z and shin roughly +z with a
/// forward lean, jittered by `sigma`.
pub(crate) fn leg_corpus(rng: &mut impl Rng, n: usize, sigma: f64) -> Vec<Pose> {
    let thigh_axis = Vector3::z();
    let shin_axis = Vector3::new(0.3, 0.0, 1.0).normalize();
    let thighs = sample_cone(rng, &thigh_axis, sigma, n);
    let shins = sample_cone(rng, &shin_axis, sigma, n);
    thighs
        .iter()
        .zip(&shins)
        .enumerate()
        .map(|(i, (thigh, shin))| {
            // Bone vectors are parent - child, so walk down from the hip.
            let hip = Vector3::new(0.1, 0.2, 1.0);
            let knee = hip - thigh * 0.45;
            let ankle = knee - shin * 0.4;
            Pose::new(
                vec![
                    [hip.x, hip.y, hip.z],
                    [knee.x, knee.y, knee.z],
                    [ankle.x, ankle.y, ankle.z],
                ],
                json!(format!("pose_{i}")),
                json!({ "frame": i }),
            )
        })
        .collect()
}
