//! Per-tile accumulation of back-projected detections from all cameras.
//!
//! Entry points:
//! - [`FusionRaster::accumulate`] for sparse observations of one camera.
//! - [`FusionRaster::accumulate_nadir`] for the rectified nadir mask.
//! - [`FusionRaster::finish`] for confidence, smoothing and thresholds.

mod nadir;
mod smooth;

pub use nadir::{rectify_nadir, NadirRectification};
pub use smooth::{gaussian_kernel, smooth, threshold, SmoothingConfig};

use serde::{Deserialize, Serialize};

use crate::backproject::Observation;
use crate::geometry::GridTransform;
use crate::raster::Raster;
use crate::tile::Tile;

/// Fusion and finalization parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Rectified nadir values above this contribute `v²` to the sum.
    pub nadir_threshold: f32,
    /// Cutoffs of the thresholded output rasters.
    pub thresholds: Vec<f32>,
    pub smoothing: SmoothingConfig,
    /// Skip tiles where no mask has a pixel above `presence_threshold`.
    pub skip_empty_tiles: bool,
    pub presence_threshold: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            nadir_threshold: 0.5,
            thresholds: vec![0.3, 0.4, 0.5, 0.6, 0.7],
            smoothing: SmoothingConfig::default(),
            skip_empty_tiles: true,
            presence_threshold: 0.5,
        }
    }
}

/// Finished rasters of one tile.
#[derive(Debug, Clone)]
pub struct FusionOutput {
    pub confidence: Raster<f32>,
    pub smoothed: Raster<f32>,
    pub thresholded: Vec<(f32, Raster<bool>)>,
}

/// Running confidence sum and observation count at tile resolution.
#[derive(Debug, Clone)]
pub struct FusionRaster {
    transform: GridTransform,
    sum: Raster<f32>,
    count: Raster<u16>,
}

impl FusionRaster {
    pub fn new(tile: &Tile) -> Self {
        let transform = tile.transform();
        Self {
            transform,
            sum: Raster::filled(transform.width, transform.height, 0.0),
            count: Raster::filled(transform.width, transform.height, 0),
        }
    }

    pub fn sum(&self) -> &Raster<f32> {
        &self.sum
    }

    pub fn count(&self) -> &Raster<u16> {
        &self.count
    }

    /// Add one camera's observations. Points outside the tile are dropped;
    /// a cell hit several times keeps the maximum score.
    ///
    /// Returns the number of cells observed.
    pub fn accumulate(&mut self, observations: &[Observation]) -> usize {
        let mut layer = vec![f32::NEG_INFINITY; self.sum.len()];
        for o in observations {
            let Some((row, col)) = self.transform.cell(o.x, o.y) else {
                continue;
            };
            let i = self.sum.index(row, col);
            if o.score > layer[i] {
                layer[i] = o.score;
            }
        }
        let mut observed = 0;
        let sum = self.sum.data_mut();
        let count = self.count.data_mut();
        for (i, v) in layer.into_iter().enumerate() {
            if v == f32::NEG_INFINITY {
                continue;
            }
            sum[i] += v;
            count[i] = count[i].saturating_add(1);
            observed += 1;
        }
        observed
    }

    /// Add the rectified nadir mask: every valid cell counts once and values
    /// above `threshold` add `v²`.
    pub fn accumulate_nadir(&mut self, rect: &NadirRectification, threshold: f32) -> usize {
        let mut observed = 0;
        let sum = self.sum.data_mut();
        let count = self.count.data_mut();
        for (i, (&v, &ok)) in rect.values.data().iter().zip(rect.valid.data()).enumerate() {
            if !ok {
                continue;
            }
            if v > threshold {
                sum[i] += v * v;
            }
            count[i] = count[i].saturating_add(1);
            observed += 1;
        }
        observed
    }

    /// `sum / count`, 0 where nothing was observed.
    pub fn confidence(&self) -> Raster<f32> {
        Raster::from_fn(self.sum.width(), self.sum.height(), |r, c| match self.count.get(r, c) {
            0 => 0.0,
            n => self.sum.get(r, c) / n as f32,
        })
    }

    pub fn finish(&self, config: &FusionConfig) -> FusionOutput {
        let confidence = self.confidence();
        let smoothed = smooth(&confidence, &self.count, &config.smoothing);
        let thresholded = threshold(&smoothed, &config.thresholds);
        FusionOutput {
            confidence,
            smoothed,
            thresholded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{TileConfig, TileKey};
    use approx::assert_relative_eq;

    fn tile() -> Tile {
        Tile::new(TileKey { x: 0, y: 0 }, &TileConfig { size_m: 10, raster_px: 10 })
    }

    fn obs(x: f64, y: f64, score: f32) -> Observation {
        Observation { x, y, score }
    }

    #[test]
    fn keeps_per_camera_maximum_and_counts_once() {
        let mut f = FusionRaster::new(&tile());
        let n = f.accumulate(&[obs(0.2, 9.8, 0.3), obs(0.7, 9.1, 0.9), obs(5.5, 5.5, 0.0)]);
        assert_eq!(n, 2);
        assert_relative_eq!(f.sum().get(0, 0), 0.9);
        assert_eq!(f.count().get(0, 0), 1);
        assert_eq!(f.count().get(4, 5), 1);
        assert_eq!(f.sum().get(4, 5), 0.0);
    }

    #[test]
    fn drops_points_outside_tile() {
        let mut f = FusionRaster::new(&tile());
        let n = f.accumulate(&[obs(-0.1, 5.0, 1.0), obs(5.0, 10.5, 1.0), obs(10.0, 5.0, 1.0)]);
        assert_eq!(n, 0);
        assert!(f.count().data().iter().all(|&c| c == 0));
    }

    #[test]
    fn camera_order_does_not_matter() {
        let a = [obs(1.5, 1.5, 0.2), obs(3.5, 8.5, 0.9), obs(1.6, 1.4, 0.4)];
        let b = [obs(1.5, 1.5, 0.8), obs(7.5, 2.5, 0.1)];
        let c = [obs(3.5, 8.5, 0.5), obs(9.9, 0.1, 1.0)];

        let mut f1 = FusionRaster::new(&tile());
        for cam in [&a[..], &b[..], &c[..]] {
            f1.accumulate(cam);
        }
        let mut f2 = FusionRaster::new(&tile());
        for cam in [&c[..], &a[..], &b[..]] {
            f2.accumulate(cam);
        }
        assert_eq!(f1.count(), f2.count());
        for (x, y) in f1.sum().data().iter().zip(f2.sum().data()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-6);
        }
        let conf = f1.confidence();
        assert_relative_eq!(conf.get(8, 1), 0.6, epsilon = 1e-6);
    }

    #[test]
    fn nadir_values_add_squares_above_threshold() {
        let mut f = FusionRaster::new(&tile());
        let values = Raster::from_fn(10, 10, |r, _| if r == 0 { 0.8 } else { 0.4 });
        let mut valid = Raster::filled(10, 10, true);
        valid.set(9, 9, false);
        let n = f.accumulate_nadir(&NadirRectification { values, valid }, 0.5);
        assert_eq!(n, 99);
        assert_relative_eq!(f.sum().get(0, 3), 0.64);
        assert_eq!(f.sum().get(5, 3), 0.0);
        assert_eq!(f.count().get(5, 3), 1);
        assert_eq!(f.count().get(9, 9), 0);
    }

    #[test]
    fn finish_produces_all_thresholds() {
        let mut f = FusionRaster::new(&tile());
        let all: Vec<_> = (0..10)
            .flat_map(|r| (0..10).map(move |c| obs(c as f64 + 0.5, 9.5 - r as f64, 1.0)))
            .collect();
        f.accumulate(&all);
        let out = f.finish(&FusionConfig::default());
        assert_eq!(out.thresholded.len(), 5);
        assert!(out.smoothed.data().iter().all(|&v| (v - 1.0).abs() < 1e-6));
        assert!(out.thresholded.iter().all(|(_, r)| r.data().iter().all(|&b| b)));
    }
}
