use std::path::Path;

use super::analyze::threshold_file_name;
use super::{Pipeline, TileOutcome, RESULTS_DIR};
use crate::error::Result;
use crate::io::{load_area_raster, save_area_raster};
use crate::mosaic::{AreaRaster, TileMosaicker};
use crate::raster::Raster;
use crate::tile::TileKey;

const CONFIDENCE_FILE: &str = "confidence.png";
const SMOOTH_FILE: &str = "smooth.png";

impl Pipeline {
    fn mosaicker(&self) -> TileMosaicker {
        TileMosaicker::new(self.config.tile.size_m, self.config.tile.raster_px as usize)
    }

    /// Mosaic in-memory tile outcomes into `out_dir`.
    ///
    /// Writes `confidence.png` from the smoothed rasters and one
    /// `thresh_<t>.png` per threshold. The mosaic spans every prepared tile;
    /// skipped tiles stay transparent.
    pub fn compose(&self, outcomes: &[TileOutcome], out_dir: &Path) -> Result<Vec<AreaRaster>> {
        let extent = match self.prepared_tiles() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(folder = %self.folder.display(), "cannot list prepared tiles: {e}");
                Vec::new()
            }
        };
        let finished: Vec<_> = outcomes
            .iter()
            .filter_map(|o| o.output.as_ref().map(|out| (o.key, out)))
            .collect();
        let mosaicker = self.mosaicker();
        let mut written = Vec::new();

        let smoothed = finished.iter().map(|(k, out)| (*k, out.smoothed.clone()));
        if let Some(area) = mosaicker.compose_over(&extent, smoothed)? {
            write_area(out_dir, CONFIDENCE_FILE, &area)?;
            written.push(area);
        }
        for &t in &self.config.fusion.thresholds {
            let layers = finished.iter().filter_map(|(k, out)| {
                out.thresholded
                    .iter()
                    .find(|(level, _)| *level == t)
                    .map(|(_, mask)| (*k, bool_layer(mask)))
            });
            if let Some(area) = mosaicker.compose_over(&extent, layers)? {
                write_area(out_dir, &threshold_file_name(t), &area)?;
                written.push(area);
            }
        }
        Ok(written)
    }

    /// Mosaic the results already written under each prepared tile.
    pub fn compose_from_disk(&self, out_dir: &Path) -> Result<Vec<AreaRaster>> {
        let keys = self.prepared_tiles()?;
        let mosaicker = self.mosaicker();
        let mut written = Vec::new();

        let mut files = vec![(SMOOTH_FILE.to_string(), CONFIDENCE_FILE.to_string())];
        files.extend(self.config.fusion.thresholds.iter().map(|&t| {
            let name = threshold_file_name(t);
            (name.clone(), name)
        }));
        for (source, target) in files {
            let tiles = self.load_tile_results(&keys, &source)?;
            if let Some(area) = mosaicker.compose_over(&keys, tiles)? {
                write_area(out_dir, &target, &area)?;
                written.push(area);
            }
        }
        Ok(written)
    }

    fn load_tile_results(&self, keys: &[TileKey], file: &str) -> Result<Vec<(TileKey, Raster<f32>)>> {
        let mut tiles = Vec::new();
        for &key in keys {
            let path = self.tile_dir(key).join(RESULTS_DIR).join(file);
            if path.is_file() {
                tiles.push((key, load_area_raster(&path)?));
            } else {
                tracing::debug!(tile = %key, file, "no result to compose");
            }
        }
        Ok(tiles)
    }
}

fn bool_layer(mask: &Raster<bool>) -> Raster<f32> {
    mask.map(|v| if v { 1.0 } else { 0.0 })
}

fn write_area(out_dir: &Path, name: &str, area: &AreaRaster) -> Result<()> {
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(name);
    save_area_raster(&path, &area.data)?;
    tracing::info!(
        path = %path.display(),
        tiles_x = area.tiles_x,
        tiles_y = area.tiles_y,
        "wrote mosaic"
    );
    Ok(())
}
