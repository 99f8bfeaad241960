//! Collinearity transforms between world and image coordinates.
//!
//! Image coordinates have their origin at the image center with +x to the
//! right and +y up, in pixels.

use nalgebra::{Matrix3, Vector3};

use super::Intrinsics;
use crate::error::GeometryError;

const MIN_DENOMINATOR: f64 = 1e-9;

/// World `(X, Y, Z)` → image `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForwardTransform {
    origin: Vector3<f64>,
    rotation: Matrix3<f64>,
    intrinsics: Intrinsics,
}

impl ForwardTransform {
    pub(crate) fn new(origin: Vector3<f64>, rotation: Matrix3<f64>, intrinsics: Intrinsics) -> Self {
        Self {
            origin,
            rotation,
            intrinsics,
        }
    }

    pub fn project(&self, world: [f64; 3]) -> Result<[f64; 2], GeometryError> {
        let d = Vector3::new(world[0], world[1], world[2]) - self.origin;
        let m = &self.rotation;
        let denom = m.row(2).dot(&d.transpose());
        if !denom.is_finite() || denom.abs() < MIN_DENOMINATOR {
            return Err(GeometryError::NotProjectable { denominator: denom });
        }
        let k = &self.intrinsics;
        let x = (k.ppx - k.f * m.row(0).dot(&d.transpose()) / denom) * k.scale_x;
        let y = (k.ppy - k.f * m.row(1).dot(&d.transpose()) / denom) * k.scale_y;
        if !x.is_finite() || !y.is_finite() {
            return Err(GeometryError::NotProjectable { denominator: denom });
        }
        Ok([x, y])
    }

    /// Project every point; failures are reported per point.
    pub fn project_many(&self, world: &[[f64; 3]]) -> Vec<Result<[f64; 2], GeometryError>> {
        world.iter().map(|p| self.project(*p)).collect()
    }
}

/// Image `(x, y)` plus known world height `Z` → world `(X, Y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverseTransform {
    origin: Vector3<f64>,
    rotation_t: Matrix3<f64>,
    intrinsics: Intrinsics,
}

impl InverseTransform {
    pub(crate) fn new(origin: Vector3<f64>, rotation: Matrix3<f64>, intrinsics: Intrinsics) -> Self {
        Self {
            origin,
            rotation_t: rotation.transpose(),
            intrinsics,
        }
    }

    pub fn unproject(&self, image: [f64; 2], z: f64) -> Result<[f64; 2], GeometryError> {
        let k = &self.intrinsics;
        let diff = Vector3::new(image[0] / k.scale_x - k.ppx, image[1] / k.scale_y - k.ppy, -k.f);
        let mt = &self.rotation_t;
        let d = mt.row(2).dot(&diff.transpose());
        if !d.is_finite() || d.abs() < MIN_DENOMINATOR {
            return Err(GeometryError::NotProjectable { denominator: d });
        }
        let dz = z - self.origin.z;
        let x = self.origin.x + dz * mt.row(0).dot(&diff.transpose()) / d;
        let y = self.origin.y + dz * mt.row(1).dot(&diff.transpose()) / d;
        if !x.is_finite() || !y.is_finite() {
            return Err(GeometryError::NotProjectable { denominator: d });
        }
        Ok([x, y])
    }

    /// Unproject parallel arrays of image coordinates and heights.
    ///
    /// Slices must have equal length; extra elements of longer slices are ignored.
    pub fn unproject_many(
        &self,
        xs: &[f64],
        ys: &[f64],
        zs: &[f64],
    ) -> Vec<Result<[f64; 2], GeometryError>> {
        xs.iter()
            .zip(ys)
            .zip(zs)
            .map(|((&x, &y), &z)| self.unproject([x, y], z))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::camera::{CameraId, CameraModel, CameraPosition, CameraSpec, Pose};
    use crate::error::GeometryError;
    use approx::assert_relative_eq;

    fn camera(f: f64, scale: f64) -> CameraModel {
        CameraModel::new(&CameraSpec {
            cam_id: CameraId::new(0, CameraPosition::Nadir),
            f,
            ppx: 0.0,
            ppy: 0.0,
            width_px: 1000,
            height_px: 1000,
            width_mm: 1000.0 / scale,
            height_mm: 1000.0 / scale,
        })
        .unwrap()
    }

    #[test]
    fn nadir_point_below_camera_maps_to_center() {
        let cam = camera(0.05, 1000.0);
        let pose = Pose::new([0.0, 0.0, 100.0], [0.0, 0.0, 0.0]);
        let fwd = cam.forward(&pose).unwrap();
        let [x, y] = fwd.project([0.0, 0.0, 0.0]).unwrap();
        assert_relative_eq!(x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(y, 0.0, epsilon = 1e-12);

        let inv = cam.inverse(&pose).unwrap();
        let [wx, wy] = inv.unproject([0.0, 0.0], 0.0).unwrap();
        assert_relative_eq!(wx, 0.0, epsilon = 1e-12);
        assert_relative_eq!(wy, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn east_and_north_map_to_right_and_up() {
        let cam = camera(100.0, 20.0);
        let pose = Pose::new([500.0, 500.0, 1000.0], [0.0, 0.0, 0.0]);
        let fwd = cam.forward(&pose).unwrap();
        let [x, y] = fwd.project([510.0, 520.0, 0.0]).unwrap();
        assert_relative_eq!(x, 100.0 * 10.0 / 1000.0 * 20.0, epsilon = 1e-9);
        assert_relative_eq!(y, 100.0 * 20.0 / 1000.0 * 20.0, epsilon = 1e-9);
    }

    #[test]
    fn forward_inverse_round_trip_oblique() {
        let cam = camera(120.0, 190.0);
        let poses = [
            Pose::new([1000.0, 2000.0, 1500.0], [0.02, -0.01, 0.3]),
            Pose::new([1000.0, 2000.0, 1500.0], [0.7, 0.05, -1.2]),
            Pose::new([-300.0, 4000.0, 900.0], [-0.1, 0.75, 2.9]),
        ];
        let points = [
            [1010.0, 2020.0, 12.0],
            [1100.0, 1800.0, 40.5],
            [900.0, 2100.0, -3.0],
        ];
        for pose in &poses {
            let fwd = cam.forward(pose).unwrap();
            let inv = cam.inverse(pose).unwrap();
            for p in &points {
                let Ok(img) = fwd.project(*p) else { continue };
                let [x, y] = inv.unproject(img, p[2]).unwrap();
                assert_relative_eq!(x, p[0], max_relative = 1e-6);
                assert_relative_eq!(y, p[1], max_relative = 1e-6);
            }
        }
    }

    #[test]
    fn point_on_camera_plane_is_not_projectable() {
        let cam = camera(0.05, 1000.0);
        let pose = Pose::new([0.0, 0.0, 100.0], [0.0, 0.0, 0.0]);
        let fwd = cam.forward(&pose).unwrap();
        let results = fwd.project_many(&[[10.0, 0.0, 100.0], [0.0, 0.0, 0.0]]);
        assert!(matches!(results[0], Err(GeometryError::NotProjectable { .. })));
        assert!(results[1].is_ok());
    }

    #[test]
    fn batch_unproject_keeps_per_point_results() {
        let cam = camera(0.05, 1000.0);
        let pose = Pose::new([0.0, 0.0, 100.0], [0.0, 0.0, 0.0]);
        let inv = cam.inverse(&pose).unwrap();
        let out = inv.unproject_many(&[0.0, 5.0], &[0.0, -5.0], &[0.0, 10.0]);
        assert_eq!(out.len(), 2);
        let [x, y] = out[1].unwrap();
        // 5 px / 1000 px/unit = 0.005 units on a 0.05 focal length, 90 m below.
        assert_relative_eq!(x, 9.0, epsilon = 1e-9);
        assert_relative_eq!(y, -9.0, epsilon = 1e-9);
    }
}
