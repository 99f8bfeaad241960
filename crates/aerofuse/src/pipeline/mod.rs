//! Tile pipeline orchestration.
//!
//! Entry points:
//! - [`Pipeline::prepare_area`] / [`Pipeline::prepare_tile`]: select the best
//!   image per camera and write crops plus `info.json` for every tile.
//! - [`Pipeline::analyze_area`] / [`Pipeline::analyze_tile`]: fuse detection
//!   masks into per-tile confidence rasters.
//! - [`Pipeline::compose`] / [`Pipeline::compose_from_disk`]: mosaic tile
//!   results into area rasters.
//!
//! Tiles are independent and processed in parallel; each writes only into
//! its own directory.

mod analyze;
mod compose;
mod prepare;

pub use analyze::{AnalyzeReport, TileOutcome};

use std::path::{Path, PathBuf};

use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::record::ImageCatalog;
use crate::terrain::{ElevationSource, HttpElevationService};
use crate::tile::{tiles_covering, Tile, TileKey};

pub const DESCRIPTOR_FILE: &str = "info.json";
pub const IMAGES_DIR: &str = "images";
pub const MASKS_DIR: &str = "masks";
pub const RESULTS_DIR: &str = "results";

pub struct Pipeline {
    config: AnalysisConfig,
    catalog: ImageCatalog,
    elevation: Box<dyn ElevationSource>,
    folder: PathBuf,
    overwrite: bool,
}

impl Pipeline {
    pub fn new(config: AnalysisConfig, catalog: ImageCatalog, elevation: Box<dyn ElevationSource>) -> Self {
        let folder = config.area_folder();
        Self {
            config,
            catalog,
            elevation,
            folder,
            overwrite: false,
        }
    }

    /// Load the image catalog and connect to the configured elevation service.
    pub fn from_config(config: AnalysisConfig) -> Result<Self> {
        let catalog = config.load_catalog()?;
        let elevation = HttpElevationService::new(config.elevation.clone());
        Ok(Self::new(config, catalog, Box::new(elevation)))
    }

    /// Replace existing tile descriptors during preparation.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Use another area folder than the configured one.
    pub fn with_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ImageCatalog {
        &self.catalog
    }

    pub fn elevation(&self) -> &dyn ElevationSource {
        self.elevation.as_ref()
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn tile(&self, key: TileKey) -> Tile {
        Tile::new(key, &self.config.tile)
    }

    pub fn tile_dir(&self, key: TileKey) -> PathBuf {
        self.folder.join(key.to_string())
    }

    /// Tiles touching the configured area.
    pub fn area_tiles(&self) -> Result<Vec<TileKey>> {
        let area = self
            .config
            .area
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("no area configured".into()))?;
        let bounds = area
            .bounds()
            .ok_or_else(|| Error::InvalidInput("area polygon has no vertices".into()))?;
        Ok(tiles_covering(&bounds, self.config.tile.size_m)
            .into_iter()
            .filter(|k| area.intersects(&self.tile(*k).bbox()))
            .collect())
    }

    /// Tiles with a descriptor in the area folder, sorted.
    pub fn prepared_tiles(&self) -> Result<Vec<TileKey>> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.folder)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() || !entry.path().join(DESCRIPTOR_FILE).is_file() {
                continue;
            }
            match entry.file_name().to_str().map(str::parse::<TileKey>) {
                Some(Ok(key)) => keys.push(key),
                _ => tracing::debug!(dir = %entry.path().display(), "not a tile directory"),
            }
        }
        keys.sort();
        Ok(keys)
    }
}
