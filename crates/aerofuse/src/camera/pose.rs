use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// Tolerance for the orthonormality check of a built rotation matrix.
pub const ROTATION_TOLERANCE: f64 = 1e-9;

/// Exterior orientation of one exposure: projection center and
/// omega/phi/kappa angles in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub omega: f64,
    pub phi: f64,
    pub kappa: f64,
}

impl Pose {
    pub fn new(position: [f64; 3], angles: [f64; 3]) -> Self {
        Self {
            x: position[0],
            y: position[1],
            z: position[2],
            omega: angles[0],
            phi: angles[1],
            kappa: angles[2],
        }
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Rotation matrix, checked for orthonormality.
    pub fn rotation(&self) -> Result<Matrix3<f64>, GeometryError> {
        let m = rotation_matrix(self.omega, self.phi, self.kappa);
        check_orthonormal(&m)?;
        Ok(m)
    }
}

/// Photogrammetric omega/phi/kappa rotation (world → camera).
pub fn rotation_matrix(omega: f64, phi: f64, kappa: f64) -> Matrix3<f64> {
    let (so, co) = omega.sin_cos();
    let (sp, cp) = phi.sin_cos();
    let (sk, ck) = kappa.sin_cos();
    #[rustfmt::skip]
    let m = Matrix3::new(
        cp * ck,  co * sk + so * sp * ck, so * sk - co * sp * ck,
        -cp * sk, co * ck - so * sp * sk, so * ck + co * sp * sk,
        sp,       -so * cp,               co * cp,
    );
    m
}

/// `det(M) = 1` and `M·Mᵗ = I` within [`ROTATION_TOLERANCE`].
pub fn check_orthonormal(m: &Matrix3<f64>) -> Result<(), GeometryError> {
    let det = m.determinant();
    let deviation = (m * m.transpose() - Matrix3::identity()).abs().max();
    if !det.is_finite()
        || !deviation.is_finite()
        || (det - 1.0).abs() > ROTATION_TOLERANCE
        || deviation > ROTATION_TOLERANCE
    {
        return Err(GeometryError::DegenerateRotation { det, deviation });
    }
    Ok(())
}
