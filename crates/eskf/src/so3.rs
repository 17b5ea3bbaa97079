//! Rotation helpers on SO(3) and covariance hygiene.

use nalgebra::{Matrix3, SMatrix, UnitQuaternion, Vector3};

/// Skew-symmetric matrix such that `skew(a) * b == a.cross(&b)`
#[rustfmt::skip]
#[inline]
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y,
                 v.z, 0.0, -v.x,
                 -v.y, v.x, 0.0)
}

/// Exponential map: rotation vector → unit quaternion
#[inline]
pub fn exp(rotation_vector: &Vector3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_scaled_axis(*rotation_vector)
}

/// Logarithmic map: unit quaternion → rotation vector
#[inline]
pub fn log(q: &UnitQuaternion<f64>) -> Vector3<f64> {
    q.scaled_axis()
}

/// Replace `m` with `(m + mᵀ) / 2`
#[inline]
pub fn symmetrize<const N: usize>(m: &mut SMatrix<f64, N, N>) {
    *m = (*m + m.transpose()) * 0.5;
}
