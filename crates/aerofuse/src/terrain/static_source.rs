use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::geometry::{GridTransform, WorldBox};
use crate::raster::Raster;

use super::{AsciiGrid, ElevationSource, HeightGrid, PointHeights};

type HeightFn = dyn Fn(f64, f64) -> Option<f64> + Send + Sync;

/// Offline elevation source backed by a closure or a loaded ASCII grid.
#[derive(Clone)]
pub struct StaticElevation {
    lookup: Arc<HeightFn>,
}

impl fmt::Debug for StaticElevation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticElevation").finish_non_exhaustive()
    }
}

impl StaticElevation {
    pub fn from_fn(f: impl Fn(f64, f64) -> Option<f64> + Send + Sync + 'static) -> Self {
        Self { lookup: Arc::new(f) }
    }

    pub fn flat(z: f64) -> Self {
        Self::from_fn(move |_, _| Some(z))
    }

    /// Nearest-cell lookup; outside the grid counts as missing.
    pub fn from_grid(grid: AsciiGrid) -> Self {
        Self::from_fn(move |x, y| grid.value_at(x, y))
    }

    fn height(&self, x: f64, y: f64, missing: &mut usize) -> f64 {
        match (self.lookup)(x, y).filter(|z| z.is_finite()) {
            Some(z) => z,
            None => {
                *missing += 1;
                0.0
            }
        }
    }
}

impl ElevationSource for StaticElevation {
    fn heights_for_points(&self, points: &[[f64; 2]]) -> Result<PointHeights> {
        let mut missing = 0;
        let samples = points
            .iter()
            .map(|&[x, y]| [x, y, self.height(x, y, &mut missing)])
            .collect();
        Ok(PointHeights { samples, missing })
    }

    fn heights_for_area(&self, bbox: &WorldBox, resolution: usize) -> Result<HeightGrid> {
        let t = GridTransform::for_box(bbox, resolution, resolution);
        let mut missing = 0;
        let heights = Raster::from_fn(resolution, resolution, |row, col| {
            let [x, y] = t.xy(row, col);
            self.height(x, y, &mut missing) as f32
        });
        Ok(HeightGrid {
            bbox: *bbox,
            heights,
            missing,
        })
    }
}
