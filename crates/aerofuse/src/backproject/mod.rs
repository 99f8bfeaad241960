//! Back-projection of per-camera detection masks onto the ground.
//!
//! The terrain height cloud is projected into the tile-aligned mask frame
//! (`row = maxy − y_ic`, `col = x_ic − minx`), filtered for neighbor
//! consistency and rasterized into a z-grid. Each mask pixel is then
//! unprojected with the height under it.

mod filter;
mod zgrid;

pub use filter::{filter_height_values, LocalSample, NeighborWindow};
pub use zgrid::{build_z_grid, fill_missing, median_filter};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::Raster;
use crate::record::ImageRecord;
use crate::tile::CameraAssignment;

/// Back-projection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackProjectConfig {
    /// Pixels with score above this become observations. `None` uses every
    /// pixel, so zero scores count as negative evidence.
    pub detection_threshold: Option<f32>,
    /// Neighbor window half-width at the reference mask size.
    pub neighbor_window_px: f64,
    /// Mask size the neighbor window is specified for.
    pub neighbor_reference_px: f64,
    /// Samples with more neighbors than this are checked against the neighbor mean.
    pub max_neighbors: usize,
    /// Median window rows of the z-grid smoothing.
    pub median_rows: usize,
    /// Median window columns of the z-grid smoothing.
    pub median_cols: usize,
    /// Minimum surviving height samples and observations per camera.
    pub min_observations: usize,
}

impl Default for BackProjectConfig {
    fn default() -> Self {
        Self {
            detection_threshold: None,
            neighbor_window_px: 10.0,
            neighbor_reference_px: 500.0,
            max_neighbors: 5,
            median_rows: 15,
            median_cols: 5,
            min_observations: 4,
        }
    }
}

/// Ground position of one mask pixel with its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub x: f64,
    pub y: f64,
    pub score: f32,
}

/// Result of back-projecting one camera on one tile.
#[derive(Debug, Clone, Default)]
pub struct BackProjection {
    pub observations: Vec<Observation>,
    /// Height samples the forward transform could not project.
    pub unprojectable_samples: usize,
    /// Height samples removed by the neighbor filter.
    pub filtered_samples: usize,
    /// Mask pixels the inverse transform could not unproject.
    pub unprojectable_pixels: usize,
}

/// Resize a raw mask to the crop box and cut out the tile-aligned window.
pub fn tile_mask(raw: &Raster<f32>, assignment: &CameraAssignment) -> Raster<f32> {
    let size = assignment.cropbox_size as usize;
    let resized = raw.resize_bilinear(size, size);
    let (x0, y0, _, _) = assignment.inner_window();
    let (w, h) = assignment.mask_size();
    resized.window(y0 as i64, x0 as i64, w, h, 0.0)
}

/// Forward-project height samples into the mask frame of `assignment`.
///
/// Returns the local samples and the number of unprojectable ones.
pub fn project_height_cloud(
    record: &ImageRecord,
    assignment: &CameraAssignment,
    samples: &[[f64; 3]],
) -> (Vec<LocalSample>, usize) {
    let [minx, _, _, maxy] = assignment.rounded_bbox();
    let mut skipped = 0usize;
    let local = record
        .forward()
        .project_many(samples)
        .into_iter()
        .zip(samples)
        .filter_map(|(res, s)| match res {
            Ok([x, y]) => Some([maxy - y, x - minx, s[2]]),
            Err(_) => {
                skipped += 1;
                None
            }
        })
        .collect();
    (local, skipped)
}

#[derive(Debug, Clone, Default)]
pub struct DetectionBackProjector {
    config: BackProjectConfig,
}

impl DetectionBackProjector {
    pub fn new(config: BackProjectConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BackProjectConfig {
        &self.config
    }

    /// Back-project a raw detection mask of `record` onto the ground.
    ///
    /// `raw_mask` is framed like the crop box (any size; it is resized to
    /// `cropbox_size²`). `height_samples` are world `(x, y, z)` points
    /// covering the tile.
    pub fn project(
        &self,
        record: &ImageRecord,
        assignment: &CameraAssignment,
        raw_mask: &Raster<f32>,
        height_samples: &[[f64; 3]],
    ) -> Result<BackProjection> {
        let cfg = &self.config;
        let camera = record.camera_id();
        let mask = tile_mask(raw_mask, assignment);
        let (mask_w, mask_h) = (mask.width(), mask.height());

        let (cloud, unprojectable_samples) = project_height_cloud(record, assignment, height_samples);
        let window = NeighborWindow::scaled(
            cfg.neighbor_window_px,
            cfg.neighbor_reference_px,
            mask_w,
            mask_h,
            cfg.max_neighbors,
        );
        let kept = filter_height_values(&cloud, &window);
        let filtered_samples = cloud.len() - kept.len();
        if kept.len() < cfg.min_observations {
            return Err(Error::InsufficientSignal {
                camera,
                found: kept.len(),
                needed: cfg.min_observations,
            });
        }
        let zgrid = build_z_grid(&kept, mask_w, mask_h, cfg.median_rows, cfg.median_cols);

        let [minx, _, _, maxy] = assignment.rounded_bbox();
        let inverse = record.inverse();
        let mut observations = Vec::new();
        let mut unprojectable_pixels = 0usize;
        for i in 0..mask_h {
            for j in 0..mask_w {
                let score = mask.get(i, j);
                if cfg.detection_threshold.is_some_and(|t| score <= t) {
                    continue;
                }
                let image = [j as f64 + minx, maxy - i as f64];
                match inverse.unproject(image, zgrid.get(i, j) as f64) {
                    Ok([x, y]) => observations.push(Observation { x, y, score }),
                    Err(_) => unprojectable_pixels += 1,
                }
            }
        }

        tracing::debug!(
            %camera,
            image = record.name(),
            samples = cloud.len(),
            filtered_samples,
            unprojectable_samples,
            unprojectable_pixels,
            observations = observations.len(),
            "back-projected mask"
        );

        if observations.len() < cfg.min_observations {
            return Err(Error::InsufficientSignal {
                camera,
                found: observations.len(),
                needed: cfg.min_observations,
            });
        }

        Ok(BackProjection {
            observations,
            unprojectable_samples,
            filtered_samples,
            unprojectable_pixels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{ElevationSource, StaticElevation};
    use crate::test_utils::{nadir_record, oblique_record, NADIR};
    use crate::tile::{Tile, TileConfig, TileKey};

    fn assign(record: &ImageRecord) -> (CameraAssignment, Tile) {
        let tile = Tile::new(TileKey { x: 1000, y: 2000 }, &TileConfig { size_m: 50, raster_px: 64 });
        let corners: Vec<[f64; 3]> = tile.bbox().corners().iter().map(|c| [c[0], c[1], 0.0]).collect();
        let bounds = crate::select::projected_bounds(record, &corners).unwrap();
        (CameraAssignment::new(record.name(), bounds, tile.raster_px), tile)
    }

    fn setup() -> (ImageRecord, CameraAssignment, Tile) {
        let record = nadir_record("a_Cam0N", [1025.0, 2025.0]);
        let (assignment, tile) = assign(&record);
        (record, assignment, tile)
    }

    #[test]
    fn nadir_tile_maps_onto_full_mask() {
        let (_, a, _) = setup();
        // 50 m at 1000 m altitude, f = 100, 20 px per unit → 100 px.
        assert_eq!(a.cropbox_size, 100);
        assert_eq!(a.mask_size(), (100, 100));
    }

    #[test]
    fn observations_land_on_the_masked_half() {
        let (record, a, tile) = setup();
        let raw = Raster::from_fn(100, 100, |_, col| if col < 50 { 1.0f32 } else { 0.0 });
        let heights = StaticElevation::flat(0.0)
            .heights_for_area(&tile.bbox(), 64)
            .unwrap();
        let bp = DetectionBackProjector::new(BackProjectConfig {
            detection_threshold: Some(0.5),
            ..BackProjectConfig::default()
        })
        .project(&record, &a, &raw, &heights.samples())
        .unwrap();

        assert_eq!(bp.observations.len(), 50 * 100);
        for o in &bp.observations {
            assert!(o.x >= 999.99 && o.x < 1025.0, "x = {}", o.x);
            assert!(o.y > 2000.0 && o.y <= 2050.01, "y = {}", o.y);
            assert_eq!(o.score, 1.0);
        }
    }

    #[test]
    fn without_threshold_every_pixel_is_an_observation() {
        let (record, a, tile) = setup();
        let raw = Raster::filled(100, 100, 0.0f32);
        let heights = StaticElevation::flat(0.0)
            .heights_for_area(&tile.bbox(), 64)
            .unwrap();
        let bp = DetectionBackProjector::default()
            .project(&record, &a, &raw, &heights.samples())
            .unwrap();
        assert_eq!(bp.observations.len(), 100 * 100);
        assert_eq!(bp.unprojectable_samples, 0);
    }

    #[test]
    fn too_few_height_samples_is_insufficient_signal() {
        let (record, a, _) = setup();
        let raw = Raster::filled(100, 100, 1.0f32);
        let samples = [[1010.0, 2010.0, 0.0], [1020.0, 2020.0, 0.0]];
        match DetectionBackProjector::default().project(&record, &a, &raw, &samples) {
            Err(Error::InsufficientSignal { camera, found, needed }) => {
                assert_eq!(camera, NADIR);
                assert_eq!(found, 2);
                assert_eq!(needed, 4);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_mask_above_threshold_is_insufficient_signal() {
        let (record, a, tile) = setup();
        let raw = Raster::filled(100, 100, 0.1f32);
        let heights = StaticElevation::flat(0.0)
            .heights_for_area(&tile.bbox(), 64)
            .unwrap();
        let projector = DetectionBackProjector::new(BackProjectConfig {
            detection_threshold: Some(0.5),
            ..BackProjectConfig::default()
        });
        assert!(matches!(
            projector.project(&record, &a, &raw, &heights.samples()),
            Err(Error::InsufficientSignal { found: 0, .. })
        ));
    }

    #[test]
    fn height_cloud_lands_in_mask_frame() {
        let (record, a, _) = setup();
        let (local, skipped) = project_height_cloud(&record, &a, &[[1000.0, 2050.0, 0.0], [1050.0, 2000.0, 0.0]]);
        assert_eq!(skipped, 0);
        approx::assert_relative_eq!(local[0][0], 0.0, epsilon = 1e-9);
        approx::assert_relative_eq!(local[0][1], 0.0, epsilon = 1e-9);
        approx::assert_relative_eq!(local[1][0], 100.0, epsilon = 1e-9);
        approx::assert_relative_eq!(local[1][1], 100.0, epsilon = 1e-9);
    }

    #[test]
    fn tilted_pose_lit_pixels_return_to_their_ground_points() {
        let record = oblique_record("a_Cam1B", [1025.0, 2025.0], [0.1, 0.3]);
        let [cx, cy] = record.forward().project([1025.0, 2025.0, 0.0]).unwrap();
        approx::assert_abs_diff_eq!(cx, 0.0, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(cy, 0.0, epsilon = 1e-6);

        let (a, tile) = assign(&record);
        assert!(a.dx > 0.0 || a.dy > 0.0, "tilted tile should not fill the crop box");
        let [minx, _, _, maxy] = a.rounded_bbox();
        let (x0, y0, _, _) = a.inner_window();
        let size = a.cropbox_size as usize;

        let targets = [
            [1003.4, 2004.1],
            [1010.3, 2035.7],
            [1025.0, 2025.0],
            [1040.2, 2008.9],
            [1046.6, 2047.2],
        ];
        let mut raw = Raster::filled(size, size, 0.0f32);
        for &[x, y] in &targets {
            let [ix, iy] = record.forward().project([x, y, 0.0]).unwrap();
            let col = (ix - minx).round() as usize + x0 as usize;
            let row = (maxy - iy).round() as usize + y0 as usize;
            raw.set(row, col, 1.0);
        }

        let heights = StaticElevation::flat(0.0)
            .heights_for_area(&tile.bbox(), 64)
            .unwrap();
        let bp = DetectionBackProjector::new(BackProjectConfig {
            detection_threshold: Some(0.5),
            ..BackProjectConfig::default()
        })
        .project(&record, &a, &raw, &heights.samples())
        .unwrap();

        assert_eq!(bp.observations.len(), targets.len());
        assert_eq!(bp.unprojectable_pixels, 0);
        // Half a pixel of rounding is well under a metre on the ground.
        for &[x, y] in &targets {
            let nearest = bp
                .observations
                .iter()
                .map(|o| (o.x - x).hypot(o.y - y))
                .fold(f64::INFINITY, f64::min);
            assert!(nearest < 1.0, "({x}, {y}) is {nearest} m from any observation");
        }
    }
}
