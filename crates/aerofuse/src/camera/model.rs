use serde::{Deserialize, Serialize};

use super::{CameraId, ForwardTransform, InverseTransform, Pose};
use crate::error::{Error, GeometryError, Result};

/// Camera entry as written in the configuration file.
///
/// Focal length, principal point and sensor size share one unit (millimeters
/// in practice); the pixel scale is derived from sensor size and resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSpec {
    pub cam_id: CameraId,
    /// Focal length.
    pub f: f64,
    /// Principal point offset along x.
    #[serde(rename = "PPx")]
    pub ppx: f64,
    /// Principal point offset along y.
    #[serde(rename = "PPy")]
    pub ppy: f64,
    pub width_px: u32,
    pub height_px: u32,
    pub width_mm: f64,
    pub height_mm: f64,
}

/// Interior orientation needed by the transforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub f: f64,
    pub ppx: f64,
    pub ppy: f64,
    /// Pixels per sensor unit along x.
    pub scale_x: f64,
    /// Pixels per sensor unit along y.
    pub scale_y: f64,
}

/// Validated, immutable interior orientation of one physical camera.
///
/// Shared via `Arc` by every [`crate::ImageRecord`] taken with the camera.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraModel {
    id: CameraId,
    intrinsics: Intrinsics,
    width_px: u32,
    height_px: u32,
    width_mm: f64,
    height_mm: f64,
}

impl CameraModel {
    pub fn new(spec: &CameraSpec) -> Result<Self> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(spec.f) {
            return Err(Error::InvalidInput(format!(
                "camera {}: focal length must be finite and > 0, got {}",
                spec.cam_id, spec.f
            )));
        }
        if !positive(spec.width_mm) || !positive(spec.height_mm) {
            return Err(Error::InvalidInput(format!(
                "camera {}: sensor size must be finite and > 0, got {}x{}",
                spec.cam_id, spec.width_mm, spec.height_mm
            )));
        }
        if spec.width_px == 0 || spec.height_px == 0 {
            return Err(Error::InvalidInput(format!(
                "camera {}: resolution must be > 0, got {}x{}",
                spec.cam_id, spec.width_px, spec.height_px
            )));
        }
        if !spec.ppx.is_finite() || !spec.ppy.is_finite() {
            return Err(Error::InvalidInput(format!(
                "camera {}: principal point must be finite",
                spec.cam_id
            )));
        }
        Ok(Self {
            id: spec.cam_id,
            intrinsics: Intrinsics {
                f: spec.f,
                ppx: spec.ppx,
                ppy: spec.ppy,
                scale_x: spec.width_px as f64 / spec.width_mm,
                scale_y: spec.height_px as f64 / spec.height_mm,
            },
            width_px: spec.width_px,
            height_px: spec.height_px,
            width_mm: spec.width_mm,
            height_mm: spec.height_mm,
        })
    }

    pub fn id(&self) -> CameraId {
        self.id
    }

    pub fn intrinsics(&self) -> Intrinsics {
        self.intrinsics
    }

    pub fn focal_length(&self) -> f64 {
        self.intrinsics.f
    }

    pub fn scale_x(&self) -> f64 {
        self.intrinsics.scale_x
    }

    pub fn scale_y(&self) -> f64 {
        self.intrinsics.scale_y
    }

    /// Image resolution `(width, height)` in pixels.
    pub fn resolution(&self) -> (u32, u32) {
        (self.width_px, self.height_px)
    }

    /// Sensor size `(width, height)`.
    pub fn sensor_size(&self) -> (f64, f64) {
        (self.width_mm, self.height_mm)
    }

    /// World → image transform for an exposure taken at `pose`.
    pub fn forward(&self, pose: &Pose) -> std::result::Result<ForwardTransform, GeometryError> {
        Ok(ForwardTransform::new(pose.position(), pose.rotation()?, self.intrinsics))
    }

    /// Image + height → world transform for an exposure taken at `pose`.
    pub fn inverse(&self, pose: &Pose) -> std::result::Result<InverseTransform, GeometryError> {
        Ok(InverseTransform::new(pose.position(), pose.rotation()?, self.intrinsics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraPosition;
    use approx::assert_relative_eq;

    fn spec() -> CameraSpec {
        CameraSpec {
            cam_id: CameraId::new(0, CameraPosition::Nadir),
            f: 100.0,
            ppx: 0.1,
            ppy: -0.2,
            width_px: 10_000,
            height_px: 8_000,
            width_mm: 50.0,
            height_mm: 40.0,
        }
    }

    #[test]
    fn derives_pixel_scale() {
        let cam = CameraModel::new(&spec()).unwrap();
        assert_relative_eq!(cam.scale_x(), 200.0);
        assert_relative_eq!(cam.scale_y(), 200.0);
        assert_eq!(cam.resolution(), (10_000, 8_000));
    }

    #[test]
    fn rejects_invalid_intrinsics() {
        let mut s = spec();
        s.f = 0.0;
        assert!(matches!(CameraModel::new(&s), Err(Error::InvalidInput(_))));

        let mut s = spec();
        s.width_mm = f64::NAN;
        assert!(CameraModel::new(&s).is_err());

        let mut s = spec();
        s.height_px = 0;
        assert!(CameraModel::new(&s).is_err());

        let mut s = spec();
        s.ppx = f64::INFINITY;
        assert!(CameraModel::new(&s).is_err());
    }

    #[test]
    fn deserializes_config_field_names() {
        let json = r#"{"cam_id":"Cam1F","f":123.9,"PPx":0.08,"PPy":-0.1,
            "width_px":14144,"height_px":10560,"width_mm":53.04,"height_mm":39.6}"#;
        let s: CameraSpec = serde_json::from_str(json).unwrap();
        assert_eq!(s.cam_id.to_string(), "Cam1F");
        assert_relative_eq!(s.ppx, 0.08);
        assert_eq!(s.width_px, 14144);
    }
}
