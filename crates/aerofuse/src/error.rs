//! Error types shared by every stage of the tile pipeline.

use thiserror::Error;

use crate::camera::CameraId;
use crate::tile::TileKey;

/// Point-level geometry failures.
///
/// These are produced per point by the batch transforms and are skipped by
/// callers; they never abort a tile on their own.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeometryError {
    /// The point lies on (or numerically next to) the camera plane, or the
    /// result is not finite.
    #[error("point is not projectable (denominator {denominator:.3e})")]
    NotProjectable { denominator: f64 },
    /// The rotation matrix built from the pose angles is not orthonormal.
    #[error("rotation matrix is not orthonormal (det {det:.12}, max |M·Mᵗ − I| {deviation:.3e})")]
    DegenerateRotation { det: f64, deviation: f64 },
    /// Corner correspondences do not define a projective mapping.
    #[error("homography is degenerate")]
    DegenerateHomography,
}

/// Errors surfaced by the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// No image of `camera` covers `tile`. Fatal for the tile.
    #[error("no image from camera {camera} covers tile {tile}")]
    Coverage { tile: TileKey, camera: CameraId },

    /// Too few usable samples or observations. The camera is skipped for the tile.
    #[error("camera {camera}: insufficient signal ({found} < {needed})")]
    InsufficientSignal {
        camera: CameraId,
        found: usize,
        needed: usize,
    },

    #[error("cannot resolve camera for {0:?}")]
    UnresolvedCamera(String),

    /// Elevation or orthophoto service failure after all retries.
    #[error("service error: {0}")]
    Service(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraPosition;

    #[test]
    fn coverage_error_names_tile_and_camera() {
        let err = Error::Coverage {
            tile: TileKey { x: 1000, y: 2000 },
            camera: CameraId::new(2, CameraPosition::Back),
        };
        let msg = err.to_string();
        assert!(msg.contains("1000_2000"), "{msg}");
        assert!(msg.contains("Cam2B"), "{msg}");
    }

    #[test]
    fn geometry_errors_convert() {
        let err: Error = GeometryError::NotProjectable { denominator: 0.0 }.into();
        assert!(matches!(err, Error::Geometry(_)));
    }
}
