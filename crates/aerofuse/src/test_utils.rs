//! Synthetic cameras and records shared by the unit tests.

use std::sync::Arc;

use crate::camera::{CameraId, CameraModel, CameraPosition, CameraSpec, Pose};
use crate::geometry::Footprint;
use crate::record::{ImageCatalog, ImageRecord};

pub(crate) const NADIR: CameraId = CameraId::new(0, CameraPosition::Nadir);
pub(crate) const BACK: CameraId = CameraId::new(1, CameraPosition::Back);

/// 1000×1000 px camera, 50×50 sensor units, focal length 100.
///
/// From 1000 m a 50 m tile spans 100 px.
pub(crate) fn camera_spec(id: CameraId) -> CameraSpec {
    CameraSpec {
        cam_id: id,
        f: 100.0,
        ppx: 0.0,
        ppy: 0.0,
        width_px: 1000,
        height_px: 1000,
        width_mm: 50.0,
        height_mm: 50.0,
    }
}

pub(crate) fn camera(id: CameraId) -> Arc<CameraModel> {
    Arc::new(CameraModel::new(&camera_spec(id)).unwrap())
}

/// Ground square seen by a straight-down exposure at `pose` over flat z = 0.
pub(crate) fn nadir_footprint(pose: &Pose) -> Footprint {
    let half = 0.25 * pose.z;
    Footprint::new(vec![
        [pose.x - half, pose.y - half],
        [pose.x + half, pose.y - half],
        [pose.x + half, pose.y + half],
        [pose.x - half, pose.y + half],
    ])
}

/// Straight-down record at `(x, y, 1000)`.
pub(crate) fn nadir_record(name: &str, xy: [f64; 2]) -> ImageRecord {
    let pose = Pose::new([xy[0], xy[1], 1000.0], [0.0; 3]);
    ImageRecord::new(name, format!("{name}.png"), pose, camera(NADIR), Some(nadir_footprint(&pose))).unwrap()
}

/// Record 1000 m up, tilted by `[omega, phi]` radians so its optical axis
/// meets the ground at `target`.
pub(crate) fn oblique_record(name: &str, target: [f64; 2], angles: [f64; 2]) -> ImageRecord {
    let [omega, phi] = angles;
    let x = target[0] + 1000.0 * phi.tan() / omega.cos();
    let y = target[1] - 1000.0 * omega.tan();
    let pose = Pose::new([x, y, 1000.0], [omega, phi, 0.0]);
    let footprint = Footprint::new(vec![
        [target[0] - 500.0, target[1] - 500.0],
        [target[0] + 500.0, target[1] - 500.0],
        [target[0] + 500.0, target[1] + 500.0],
        [target[0] - 500.0, target[1] + 500.0],
    ]);
    ImageRecord::new(name, format!("{name}.png"), pose, camera(BACK), Some(footprint)).unwrap()
}

/// Catalog holding the nadir camera and one straight-down record per entry.
pub(crate) fn nadir_catalog(entries: &[(&str, [f64; 2])]) -> ImageCatalog {
    let mut catalog = ImageCatalog::new([CameraModel::new(&camera_spec(NADIR)).unwrap()]);
    let cam = catalog.camera(NADIR).unwrap().clone();
    for (name, xy) in entries {
        let pose = Pose::new([xy[0], xy[1], 1000.0], [0.0; 3]);
        catalog.push(ImageRecord::new(*name, format!("{name}.png"), pose, cam.clone(), Some(nadir_footprint(&pose))).unwrap());
    }
    catalog
}
