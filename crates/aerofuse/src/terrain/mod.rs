//! Terrain heights: point queries for tile corners and dense grids for the
//! back-projection height cloud.
//!
//! Missing heights fall back to 0. The number of fallback samples is always
//! reported so callers can log it.

mod ascii_grid;
mod remote;
mod static_source;

pub use ascii_grid::AsciiGrid;
pub use remote::{ElevationConfig, HttpElevationService};
pub use static_source::StaticElevation;

use crate::error::Result;
use crate::geometry::{GridTransform, WorldBox};
use crate::raster::Raster;

/// `(x, y, z)` samples returned by a point query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointHeights {
    pub samples: Vec<[f64; 3]>,
    /// Samples whose height was unavailable and set to 0.
    pub missing: usize,
}

/// Single-band elevation raster over a world box.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightGrid {
    pub bbox: WorldBox,
    pub heights: Raster<f32>,
    /// Cells whose height was unavailable and set to 0.
    pub missing: usize,
}

impl HeightGrid {
    pub fn transform(&self) -> GridTransform {
        GridTransform::for_box(&self.bbox, self.heights.width(), self.heights.height())
    }

    /// Cell-center world coordinate.
    pub fn xy(&self, row: usize, col: usize) -> [f64; 2] {
        self.transform().xy(row, col)
    }

    /// Floor cell index of a world coordinate.
    pub fn rowcol(&self, x: f64, y: f64) -> (i64, i64) {
        self.transform().rowcol(x, y)
    }

    /// Height at the cell holding `(x, y)`, clamped into the grid.
    pub fn height_at_clamped(&self, x: f64, y: f64) -> f64 {
        let (row, col) = self.transform().clamped_cell(x, y);
        self.heights.get(row, col) as f64
    }

    /// Flatten into `(x, y, z)` cell-center samples.
    pub fn samples(&self) -> Vec<[f64; 3]> {
        let t = self.transform();
        let mut out = Vec::with_capacity(self.heights.len());
        for row in 0..self.heights.height() {
            for col in 0..self.heights.width() {
                let [x, y] = t.xy(row, col);
                out.push([x, y, self.heights.get(row, col) as f64]);
            }
        }
        out
    }
}

/// Source of terrain heights.
pub trait ElevationSource: Send + Sync {
    fn heights_for_points(&self, points: &[[f64; 2]]) -> Result<PointHeights>;

    /// Dense `resolution × resolution` grid over `bbox`.
    fn heights_for_area(&self, bbox: &WorldBox, resolution: usize) -> Result<HeightGrid>;
}
