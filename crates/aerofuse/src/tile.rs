//! Ground tiles, per-camera crop assignments and the on-disk tile descriptor.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::camera::CameraId;
use crate::error::{Error, Result};
use crate::geometry::{GridTransform, WorldBox};

/// Tile size and output raster resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    /// Side length of a tile in world units.
    pub size_m: u32,
    /// Output raster resolution (square).
    pub raster_px: u32,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            size_m: 50,
            raster_px: 512,
        }
    }
}

/// Lower-left world corner of a tile; also its directory name `<x>_<y>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub x: i64,
    pub y: i64,
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.x, self.y)
    }
}

impl FromStr for TileKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::InvalidInput(format!("not a tile key: {s:?}"));
        let (x, y) = s.split_once('_').ok_or_else(bad)?;
        Ok(Self {
            x: x.parse().map_err(|_| bad())?,
            y: y.parse().map_err(|_| bad())?,
        })
    }
}

/// Square ground tile with its output raster grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    pub key: TileKey,
    pub size_m: u32,
    pub raster_px: u32,
}

impl Tile {
    pub fn new(key: TileKey, config: &TileConfig) -> Self {
        Self {
            key,
            size_m: config.size_m,
            raster_px: config.raster_px,
        }
    }

    pub fn bbox(&self) -> WorldBox {
        let (x, y, s) = (self.key.x as f64, self.key.y as f64, self.size_m as f64);
        WorldBox::new(x, y, x + s, y + s)
    }

    pub fn transform(&self) -> GridTransform {
        let n = self.raster_px as usize;
        GridTransform::for_box(&self.bbox(), n, n)
    }

    pub fn resolution(&self) -> usize {
        self.raster_px as usize
    }
}

/// Keys of every tile whose square touches `area`, on a grid anchored at
/// the floored area minimum.
pub fn tiles_covering(area: &WorldBox, size_m: u32) -> Vec<TileKey> {
    let step = size_m.max(1) as i64;
    let x0 = area.min_x.floor() as i64;
    let y0 = area.min_y.floor() as i64;
    let x1 = area.max_x.ceil() as i64;
    let y1 = area.max_y.ceil() as i64;
    let mut keys = Vec::new();
    let mut x = x0;
    while x < x1 {
        let mut y = y0;
        while y < y1 {
            keys.push(TileKey { x, y });
            y += step;
        }
        x += step;
    }
    keys
}

/// Pixel crop window in the full image (origin top-left, exclusive right/bottom).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl CropWindow {
    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }
}

/// Image chosen for one camera on one tile plus its crop geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraAssignment {
    pub image_name: String,
    /// Unrounded image-coordinate bounds of the tile corners `[minx, miny, maxx, maxy]`.
    pub bbox_ic: [f64; 4],
    pub cropbox_size: u32,
    pub dx: f64,
    pub dy: f64,
}

impl CameraAssignment {
    /// Derive crop geometry from the projected tile bounds.
    pub fn new(image_name: impl Into<String>, bbox_ic: [f64; 4], raster_px: u32) -> Self {
        let [minx, miny, maxx, maxy] = bbox_ic.map(f64::round);
        let w = maxx - minx;
        let h = maxy - miny;
        let cropbox_size = (raster_px as f64).max(w).max(h) as u32;
        Self {
            image_name: image_name.into(),
            bbox_ic,
            cropbox_size,
            dx: (cropbox_size as f64 - w) / 2.0,
            dy: (cropbox_size as f64 - h) / 2.0,
        }
    }

    /// Rounded image bounds `[minx, miny, maxx, maxy]`.
    pub fn rounded_bbox(&self) -> [f64; 4] {
        self.bbox_ic.map(f64::round)
    }

    /// Crop window in the full image of a `width × height` camera.
    pub fn crop_window(&self, image_size: (u32, u32)) -> CropWindow {
        let [minx, miny, maxx, maxy] = self.rounded_bbox().map(|v| v as i64);
        let half_w = (image_size.0 / 2) as i64;
        let half_h = (image_size.1 / 2) as i64;
        let pad_lo_x = self.dx.floor() as i64;
        let pad_hi_x = self.dx.ceil() as i64;
        let pad_lo_y = self.dy.floor() as i64;
        let pad_hi_y = self.dy.ceil() as i64;
        CropWindow {
            left: minx + half_w - pad_lo_x,
            right: maxx + half_w + pad_hi_x,
            top: half_h - maxy - pad_lo_y,
            bottom: half_h - miny + pad_hi_y,
        }
    }

    /// Inner window of the crop box holding the tile: `(x0, y0, x1, y1)`.
    pub fn inner_window(&self) -> (u32, u32, u32, u32) {
        let s = self.cropbox_size;
        (
            self.dx.floor() as u32,
            self.dy.floor() as u32,
            s - self.dx.ceil() as u32,
            s - self.dy.ceil() as u32,
        )
    }

    /// Size `(mask_w, mask_h)` of the tile-aligned mask.
    pub fn mask_size(&self) -> (usize, usize) {
        let (x0, y0, x1, y1) = self.inner_window();
        ((x1 - x0) as usize, (y1 - y0) as usize)
    }
}

/// Persisted selection result of one tile (`<area>/<x>_<y>/info.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileDescriptor {
    pub x: i64,
    pub y: i64,
    pub image_info: BTreeMap<CameraId, CameraAssignment>,
}

impl TileDescriptor {
    pub fn key(&self) -> TileKey {
        TileKey { x: self.x, y: self.y }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Write as pretty JSON; without `overwrite` an existing file is an error.
    pub fn save(&self, path: &Path, overwrite: bool) -> Result<()> {
        let mut opts = OpenOptions::new();
        opts.write(true);
        if overwrite {
            opts.create(true).truncate(true);
        } else {
            opts.create_new(true);
        }
        let file = opts.open(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraPosition;

    #[test]
    fn tile_key_parses_directory_names() {
        let key: TileKey = "1000_2000".parse().unwrap();
        assert_eq!(key, TileKey { x: 1000, y: 2000 });
        assert_eq!(key.to_string(), "1000_2000");
        let neg: TileKey = "-50_-100".parse().unwrap();
        assert_eq!(neg, TileKey { x: -50, y: -100 });
        assert!("1000".parse::<TileKey>().is_err());
        assert!("a_b".parse::<TileKey>().is_err());
    }

    #[test]
    fn tiles_cover_area_on_size_grid() {
        let keys = tiles_covering(&WorldBox::new(1000.2, 2000.0, 1090.0, 2050.0), 50);
        assert_eq!(
            keys,
            vec![TileKey { x: 1000, y: 2000 }, TileKey { x: 1050, y: 2000 }]
        );
    }

    #[test]
    fn crop_window_is_square_and_padded() {
        let cases = [
            [-120.4, 30.2, 380.6, 470.1],
            [10.0, 10.0, 20.0, 20.0],
            [-3000.5, -2000.2, -2400.7, -1500.5],
        ];
        for bbox in cases {
            let a = CameraAssignment::new("img", bbox, 512);
            let win = a.crop_window((14144, 10560));
            assert_eq!(win.width(), a.cropbox_size as i64, "{bbox:?}");
            assert_eq!(win.height(), a.cropbox_size as i64, "{bbox:?}");
            let [minx, miny, maxx, maxy] = a.rounded_bbox();
            assert_eq!(a.mask_size(), ((maxx - minx) as usize, (maxy - miny) as usize));
        }
    }

    #[test]
    fn crop_geometry_matches_hand_computation() {
        // w = 501, h = 440 → cropbox 512, dx = 5.5, dy = 36.
        let a = CameraAssignment::new("img", [-120.4, 30.2, 380.6, 470.1], 512);
        assert_eq!(a.cropbox_size, 512);
        assert_eq!(a.dx, 5.5);
        assert_eq!(a.dy, 36.0);
        let win = a.crop_window((1000, 800));
        assert_eq!(win, CropWindow { left: 375, right: 887, top: -106, bottom: 406 });
        assert_eq!(a.inner_window(), (5, 36, 506, 476));
    }

    #[test]
    fn large_footprint_grows_cropbox() {
        let a = CameraAssignment::new("img", [0.0, 0.0, 700.0, 650.0], 512);
        assert_eq!(a.cropbox_size, 700);
        assert_eq!(a.dx, 0.0);
        assert_eq!(a.dy, 25.0);
    }

    #[test]
    fn descriptor_round_trips_through_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.json");
        let mut image_info = BTreeMap::new();
        image_info.insert(
            CameraId::new(0, CameraPosition::Nadir),
            CameraAssignment::new("a_Cam0N", [-10.0, -12.0, 240.0, 250.0], 512),
        );
        let desc = TileDescriptor { x: 1000, y: 2000, image_info };
        desc.save(&path, false).unwrap();
        assert!(desc.save(&path, false).is_err());
        desc.save(&path, true).unwrap();
        let back = TileDescriptor::load(&path).unwrap();
        assert_eq!(back, desc);
        assert_eq!(back.key(), TileKey { x: 1000, y: 2000 });
    }
}
