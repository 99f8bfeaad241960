//! Per-tile, per-camera best-image selection.
//!
//! For each camera the candidate whose projected tile corners sit closest to
//! the image center wins; the score is `|minx| + |miny| + |maxx| + |maxy|` of
//! the projected bounds.

use std::collections::BTreeMap;

use crate::camera::CameraId;
use crate::error::{Error, Result};
use crate::record::{ImageCatalog, ImageRecord};
use crate::terrain::ElevationSource;
use crate::tile::{CameraAssignment, Tile};

/// Chosen image for one camera on one tile.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub record: &'a ImageRecord,
    pub assignment: CameraAssignment,
}

/// Image bounds `[minx, miny, maxx, maxy]` of the projected corners, or
/// `None` when any corner is not projectable.
pub fn projected_bounds(record: &ImageRecord, corners: &[[f64; 3]]) -> Option<[f64; 4]> {
    let mut b = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
    for c in corners {
        let [x, y] = record.forward().project(*c).ok()?;
        b = [b[0].min(x), b[1].min(y), b[2].max(x), b[3].max(y)];
    }
    Some(b)
}

pub fn center_score(bounds: &[f64; 4]) -> f64 {
    bounds.iter().map(|v| v.abs()).sum()
}

/// Strict-minimum score over `candidates`; the first one wins ties.
pub fn best_candidate<'a>(
    candidates: impl IntoIterator<Item = &'a ImageRecord>,
    corners: &[[f64; 3]],
) -> Option<(&'a ImageRecord, [f64; 4])> {
    let mut best: Option<(&ImageRecord, [f64; 4], f64)> = None;
    for record in candidates {
        let Some(bounds) = projected_bounds(record, corners) else {
            tracing::debug!(image = record.name(), "tile corner not projectable, skipping candidate");
            continue;
        };
        let score = center_score(&bounds);
        if best.as_ref().map_or(true, |(_, _, s)| score < *s) {
            best = Some((record, bounds, score));
        }
    }
    best.map(|(r, b, _)| (r, b))
}

pub struct TileSelector<'a> {
    catalog: &'a ImageCatalog,
    elevation: &'a dyn ElevationSource,
}

impl<'a> TileSelector<'a> {
    pub fn new(catalog: &'a ImageCatalog, elevation: &'a dyn ElevationSource) -> Self {
        Self { catalog, elevation }
    }

    /// Tile corners TL, TR, BR, BL with terrain heights.
    pub fn corners(&self, tile: &Tile) -> Result<[[f64; 3]; 4]> {
        let heights = self.elevation.heights_for_points(&tile.bbox().corners())?;
        if heights.missing > 0 {
            tracing::warn!(tile = %tile.key, missing = heights.missing, "corner heights unavailable, using 0");
        }
        heights
            .samples
            .try_into()
            .map_err(|_| Error::Service(format!("tile {}: expected 4 corner heights", tile.key)))
    }

    /// Best image per camera, in the order of `cameras`.
    ///
    /// A camera without any candidate is a coverage error for the tile.
    pub fn select(&self, tile: &Tile, cameras: &[CameraId]) -> Result<BTreeMap<CameraId, Selection<'a>>> {
        let corners = self.corners(tile)?;
        let bbox = tile.bbox();
        let mut out = BTreeMap::new();
        for &camera in cameras {
            let (record, bounds) = best_candidate(self.catalog.covering(camera, &bbox), &corners)
                .ok_or(Error::Coverage { tile: tile.key, camera })?;
            tracing::debug!(tile = %tile.key, %camera, image = record.name(), "selected image");
            out.insert(
                camera,
                Selection {
                    record,
                    assignment: CameraAssignment::new(record.name(), bounds, tile.raster_px),
                },
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraPosition, Pose};
    use crate::terrain::StaticElevation;
    use crate::test_utils::{nadir_catalog, nadir_footprint};
    use crate::tile::{TileConfig, TileKey};

    const NADIR: CameraId = CameraId::new(0, CameraPosition::Nadir);

    fn tile() -> Tile {
        Tile::new(TileKey { x: 1000, y: 2000 }, &TileConfig { size_m: 50, raster_px: 64 })
    }

    #[test]
    fn picks_the_most_central_image() {
        let catalog = nadir_catalog(&[
            ("off_center_Cam0N", [1150.0, 2025.0]),
            ("centered_Cam0N", [1025.0, 2025.0]),
            ("far_Cam0N", [900.0, 2100.0]),
        ]);
        let terrain = StaticElevation::flat(0.0);
        let selector = TileSelector::new(&catalog, &terrain);
        let sel = selector.select(&tile(), &[NADIR]).unwrap();
        let chosen = &sel[&NADIR];
        assert_eq!(chosen.record.name(), "centered_Cam0N");
        // Symmetric bounds around the image center.
        let [minx, miny, maxx, maxy] = chosen.assignment.bbox_ic;
        approx::assert_relative_eq!(minx, -maxx, epsilon = 1e-9);
        approx::assert_relative_eq!(miny, -maxy, epsilon = 1e-9);
    }

    #[test]
    fn ties_keep_the_first_candidate() {
        let catalog = nadir_catalog(&[
            ("first_Cam0N", [1025.0, 2025.0]),
            ("second_Cam0N", [1025.0, 2025.0]),
        ]);
        let terrain = StaticElevation::flat(0.0);
        let selector = TileSelector::new(&catalog, &terrain);
        for _ in 0..3 {
            let sel = selector.select(&tile(), &[NADIR]).unwrap();
            assert_eq!(sel[&NADIR].record.name(), "first_Cam0N");
        }
    }

    #[test]
    fn camera_without_covering_image_is_a_coverage_error() {
        let catalog = nadir_catalog(&[("elsewhere_Cam0N", [5000.0, 5000.0])]);
        let terrain = StaticElevation::flat(0.0);
        let selector = TileSelector::new(&catalog, &terrain);
        match selector.select(&tile(), &[NADIR]) {
            Err(Error::Coverage { tile, camera }) => {
                assert_eq!(tile, TileKey { x: 1000, y: 2000 });
                assert_eq!(camera, NADIR);
            }
            other => panic!("expected coverage error, got {other:?}"),
        }
    }

    #[test]
    fn unprojectable_corner_skips_candidate() {
        let mut catalog = nadir_catalog(&[("good_Cam0N", [1100.0, 2100.0])]);
        // Camera sitting at ground level on the tile corner plane.
        let cam = catalog.camera(NADIR).unwrap().clone();
        let pose = Pose::new([1025.0, 2025.0, 0.0], [0.0; 3]);
        let fp = nadir_footprint(&Pose::new([1025.0, 2025.0, 1000.0], [0.0; 3]));
        catalog.push(ImageRecord::new("flat_Cam0N", "x.png", pose, cam, Some(fp)).unwrap());

        let terrain = StaticElevation::flat(0.0);
        let selector = TileSelector::new(&catalog, &terrain);
        let sel = selector.select(&tile(), &[NADIR]).unwrap();
        assert_eq!(sel[&NADIR].record.name(), "good_Cam0N");
    }
}
