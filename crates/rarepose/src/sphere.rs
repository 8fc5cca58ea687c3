//! Spherical coordinates for bone vectors.
//!
//! Convention used throughout the crate:
//! - inclination `theta` in degrees, measured from +z, in [0, 180];
//! - azimuth `phi` in degrees, measured from +x towards +y, in (-180, 180].
//!
//! A zero-length vector has no direction. Conversion returns `None` for it,
//! which downstream stages treat as "skip this bone".

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Polar representation of a 3D vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spherical {
    /// Euclidean length of the source vector.
    pub radius: f64,
    /// Inclination from +z, degrees.
    pub theta: f64,
    /// Azimuth from +x, degrees.
    pub phi: f64,
}

impl Spherical {
    /// Convert a Cartesian vector.
    ///
    /// Returns `None` when the vector is zero or has non-finite components.
    pub fn from_cartesian(v: [f64; 3]) -> Option<Self> {
        let [x, y, z] = v;
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return None;
        }
        let radius = x.hypot(y).hypot(z);
        if radius <= 0.0 || !radius.is_finite() {
            return None;
        }
        let theta = (z / radius).clamp(-1.0, 1.0).acos().to_degrees();
        let phi = y.atan2(x).to_degrees();
        Some(Self { radius, theta, phi })
    }

    /// Unit-radius point at the given angles (degrees).
    pub fn from_angles(theta_deg: f64, phi_deg: f64) -> Self {
        Self {
            radius: 1.0,
            theta: theta_deg,
            phi: phi_deg,
        }
    }

    /// Unit direction with these angles; the radius is ignored.
    pub fn unit_vector(&self) -> Vector3<f64> {
        let (st, ct) = self.theta.to_radians().sin_cos();
        let (sp, cp) = self.phi.to_radians().sin_cos();
        Vector3::new(st * cp, st * sp, ct)
    }

    /// Cartesian vector with this radius and direction.
    pub fn to_cartesian(&self) -> [f64; 3] {
        let u = self.unit_vector() * self.radius;
        [u.x, u.y, u.z]
    }
}

/// Unit direction of a Cartesian vector, or `None` for a degenerate vector.
pub fn unit_direction(v: [f64; 3]) -> Option<Vector3<f64>> {
    let s = Spherical::from_cartesian(v)?;
    Some(Vector3::new(v[0], v[1], v[2]) / s.radius)
}

/// Orthonormal completion of a unit vector: returns `(a, b)` with
/// `a ⟂ n`, `b = n × a`.
pub(crate) fn orthonormal_basis(n: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    // Pick the coordinate axis least aligned with n.
    let helper = if n.x.abs() <= n.y.abs() && n.x.abs() <= n.z.abs() {
        Vector3::x()
    } else if n.y.abs() <= n.z.abs() {
        Vector3::y()
    } else {
        Vector3::z()
    };
    let a = (helper - n * n.dot(&helper)).normalize();
    let b = n.cross(&a);
    (a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::prelude::*;

    #[test]
    fn axis_vectors_have_expected_angles() {
        let z = Spherical::from_cartesian([0.0, 0.0, 2.0]).unwrap();
        assert_relative_eq!(z.radius, 2.0);
        assert_relative_eq!(z.theta, 0.0);

        let x = Spherical::from_cartesian([1.0, 0.0, 0.0]).unwrap();
        assert_relative_eq!(x.theta, 90.0, epsilon = 1e-12);
        assert_relative_eq!(x.phi, 0.0);

        let neg_y = Spherical::from_cartesian([0.0, -3.0, 0.0]).unwrap();
        assert_relative_eq!(neg_y.phi, -90.0, epsilon = 1e-12);

        let neg_x = Spherical::from_cartesian([-1.0, 0.0, 0.0]).unwrap();
        assert_relative_eq!(neg_x.phi, 180.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_vector_is_skipped() {
        assert!(Spherical::from_cartesian([0.0, 0.0, 0.0]).is_none());
        assert!(unit_direction([0.0, 0.0, 0.0]).is_none());
    }

    #[test]
    fn extreme_magnitudes_keep_their_direction() {
        let tiny = unit_direction([3e-170, 0.0, 4e-170]).unwrap();
        assert_relative_eq!(tiny, Vector3::new(0.6, 0.0, 0.8), epsilon = 1e-12);

        let huge = Spherical::from_cartesian([0.0, 3e200, 4e200]).unwrap();
        assert_relative_eq!(huge.radius, 5e200, max_relative = 1e-12);
        assert_relative_eq!(huge.theta, 0.6f64.asin().to_degrees(), epsilon = 1e-9);
        let dir = unit_direction([0.0, 3e200, 4e200]).unwrap();
        assert_relative_eq!(dir, Vector3::new(0.0, 0.6, 0.8), epsilon = 1e-12);
    }

    #[test]
    fn non_finite_vector_is_skipped() {
        assert!(Spherical::from_cartesian([f64::NAN, 0.0, 1.0]).is_none());
        assert!(Spherical::from_cartesian([f64::INFINITY, 0.0, 1.0]).is_none());
    }

    #[test]
    fn unit_vectors_survive_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let v = Vector3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            if v.norm() < 1e-3 {
                continue;
            }
            let v = v.normalize();
            let s = Spherical::from_cartesian([v.x, v.y, v.z]).unwrap();
            assert!((0.0..=180.0).contains(&s.theta));
            assert!(s.phi > -180.0 && s.phi <= 180.0);
            let back = s.unit_vector();
            assert_relative_eq!(back, v, epsilon = 1e-12);
        }
    }

    #[test]
    fn cartesian_keeps_radius() {
        let s = Spherical::from_cartesian([3.0, -4.0, 12.0]).unwrap();
        assert_relative_eq!(s.radius, 13.0, epsilon = 1e-12);
        let [x, y, z] = s.to_cartesian();
        assert_relative_eq!(x, 3.0, epsilon = 1e-12);
        assert_relative_eq!(y, -4.0, epsilon = 1e-12);
        assert_relative_eq!(z, 12.0, epsilon = 1e-12);
    }

    #[test]
    fn basis_is_orthonormal() {
        for n in [
            Vector3::x(),
            Vector3::y(),
            Vector3::z(),
            Vector3::new(1.0, 2.0, -0.5).normalize(),
        ] {
            let (a, b) = orthonormal_basis(&n);
            assert_relative_eq!(a.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(b.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(a.dot(&n), 0.0, epsilon = 1e-12);
            assert_relative_eq!(b.dot(&n), 0.0, epsilon = 1e-12);
            assert_relative_eq!(a.dot(&b), 0.0, epsilon = 1e-12);
        }
    }
}
