//! Composition of per-tile rasters into one area raster.
//!
//! Tile keys are lower-left corners: the column index is `(x − min_x) / side`
//! and the row index `(max_y − y) / side`, so larger northings land higher.
//! Cells no tile wrote hold `NaN`.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::geometry::WorldBox;
use crate::raster::Raster;
use crate::tile::TileKey;

/// Composed raster with its world placement.
#[derive(Debug, Clone)]
pub struct AreaRaster {
    /// World box covered by the raster.
    pub bbox: WorldBox,
    pub tiles_x: usize,
    pub tiles_y: usize,
    pub data: Raster<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileMosaicker {
    size_m: u32,
    tile_px: usize,
}

impl TileMosaicker {
    pub fn new(size_m: u32, tile_px: usize) -> Self {
        Self { size_m, tile_px }
    }

    /// Compose tiles; `None` when there are none.
    ///
    /// Every tile must be `tile_px × tile_px` and lie on the `size_m` grid of
    /// the minimum key. Duplicate keys: the last one wins.
    pub fn compose<I>(&self, tiles: I) -> Result<Option<AreaRaster>>
    where
        I: IntoIterator<Item = (TileKey, Raster<f32>)>,
    {
        self.compose_over(&[], tiles)
    }

    /// Like [`compose`](Self::compose), with the raster also spanning every
    /// key of `extent`. Extent tiles without data stay `NaN`; still `None`
    /// when no tile has data.
    pub fn compose_over<I>(&self, extent: &[TileKey], tiles: I) -> Result<Option<AreaRaster>>
    where
        I: IntoIterator<Item = (TileKey, Raster<f32>)>,
    {
        let mut by_key: BTreeMap<TileKey, Raster<f32>> = BTreeMap::new();
        for (key, raster) in tiles {
            if raster.width() != self.tile_px || raster.height() != self.tile_px {
                return Err(Error::InvalidInput(format!(
                    "tile {key} is {}x{}, expected {}x{}",
                    raster.width(),
                    raster.height(),
                    self.tile_px,
                    self.tile_px
                )));
            }
            if by_key.insert(key, raster).is_some() {
                tracing::warn!(tile = %key, "duplicate tile in mosaic, keeping the last one");
            }
        }
        let Some(first) = by_key.keys().next() else {
            return Ok(None);
        };

        let side = self.size_m.max(1) as i64;
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
        for k in by_key.keys().chain(extent) {
            min_x = min_x.min(k.x);
            max_x = max_x.max(k.x);
            min_y = min_y.min(k.y);
            max_y = max_y.max(k.y);
        }
        for k in by_key.keys().chain(extent) {
            if (k.x - min_x) % side != 0 || (max_y - k.y) % side != 0 {
                return Err(Error::InvalidInput(format!(
                    "tile {k} is not on the {side} m grid anchored at {min_x}_{min_y}"
                )));
            }
        }
        let tiles_x = ((max_x - min_x) / side + 1) as usize;
        let tiles_y = ((max_y - min_y) / side + 1) as usize;
        let px = self.tile_px;

        let mut data = Raster::filled(tiles_x * px, tiles_y * px, f32::NAN);
        for (k, raster) in &by_key {
            let col0 = ((k.x - min_x) / side) as usize * px;
            let row0 = ((max_y - k.y) / side) as usize * px;
            for r in 0..px {
                for c in 0..px {
                    data.set(row0 + r, col0 + c, raster.get(r, c));
                }
            }
        }

        Ok(Some(AreaRaster {
            bbox: WorldBox::new(
                min_x as f64,
                min_y as f64,
                (max_x + side) as f64,
                (max_y + side) as f64,
            ),
            tiles_x,
            tiles_y,
            data,
        }))
    }
}
