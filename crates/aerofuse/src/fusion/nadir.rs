//! Rectification of the nadir camera's mask onto the tile grid.
//!
//! The four tile corners are projected into the image and a homography from
//! output raster corners to mask pixels is fitted; every output cell center is
//! then sampled bilinearly from the mask.

use crate::error::Result;
use crate::homography::{estimate_homography, project};
use crate::raster::Raster;
use crate::record::ImageRecord;
use crate::terrain::HeightGrid;
use crate::tile::{CameraAssignment, Tile};

/// Dense rectified nadir mask at tile resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct NadirRectification {
    pub values: Raster<f32>,
    /// Cells that map inside the mask.
    pub valid: Raster<bool>,
}

impl NadirRectification {
    pub fn sharp(&self, threshold: f32) -> Raster<bool> {
        self.values.map(|v| v > threshold)
    }
}

/// Rectify a tile-aligned nadir mask (`mask_w × mask_h`, see
/// [`crate::backproject::tile_mask`]) onto the tile grid.
pub fn rectify_nadir(
    tile: &Tile,
    heights: &HeightGrid,
    record: &ImageRecord,
    assignment: &CameraAssignment,
    mask: &Raster<f32>,
) -> Result<NadirRectification> {
    let b = tile.bbox();
    let n = tile.resolution();
    let world = [
        [b.min_x, b.max_y],
        [b.min_x, b.min_y],
        [b.max_x, b.min_y],
        [b.max_x, b.max_y],
    ];
    let [minx, miny, _, _] = assignment.rounded_bbox();
    let mask_h = mask.height() as f64;

    let mut dst = [[0.0; 2]; 4];
    for (d, [x, y]) in dst.iter_mut().zip(world) {
        let z = heights.height_at_clamped(x, y);
        let [ix, iy] = record.forward().project([x, y, z])?;
        *d = [ix - minx, mask_h - (iy - miny)];
    }
    let side = n as f64;
    let src = [[0.0, 0.0], [0.0, side], [side, side], [side, 0.0]];
    let h = estimate_homography(&src, &dst)?;

    let mut valid = Raster::filled(n, n, false);
    let values = Raster::from_fn(n, n, |r, c| {
        let [u, v] = project(&h, c as f64 + 0.5, r as f64 + 0.5);
        match mask.sample_bilinear(u - 0.5, v - 0.5) {
            Some(s) => {
                valid.set(r, c, true);
                s
            }
            None => 0.0,
        }
    });
    Ok(NadirRectification { values, valid })
}
