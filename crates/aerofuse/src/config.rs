//! Run configuration loaded from a JSON file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backproject::BackProjectConfig;
use crate::camera::{CameraId, CameraModel, CameraSpec};
use crate::error::{Error, Result};
use crate::fusion::FusionConfig;
use crate::geometry::{Footprint, WorldBox};
use crate::ortho::OrthophotoConfig;
use crate::record::{ImageCatalog, ImageIndex};
use crate::terrain::ElevationConfig;
use crate::tile::TileConfig;

/// Area of interest: a bounding box object or a polygon vertex list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AreaSpec {
    Box(WorldBox),
    Polygon(Footprint),
}

impl AreaSpec {
    pub fn bounds(&self) -> Option<WorldBox> {
        match self {
            Self::Box(b) => Some(*b),
            Self::Polygon(p) => p.bounds(),
        }
    }

    pub fn intersects(&self, tile: &WorldBox) -> bool {
        match self {
            Self::Box(b) => b.intersects(tile),
            Self::Polygon(p) => p.intersects_box(tile),
        }
    }
}

/// Top-level configuration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Area folder holding one `<x>_<y>` directory per tile.
    pub folder: PathBuf,
    /// Cameras in selection order.
    pub cameras: Vec<CameraSpec>,
    /// Image index files.
    pub image_index: Vec<PathBuf>,
    #[serde(default)]
    pub area: Option<AreaSpec>,
    /// Camera rectified as nadir; defaults to the first camera in nadir position.
    #[serde(default)]
    pub nadir_camera: Option<CameraId>,
    #[serde(default)]
    pub tile: TileConfig,
    #[serde(default)]
    pub backprojection: BackProjectConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub elevation: ElevationConfig,
    #[serde(default)]
    pub orthophoto: OrthophotoConfig,
    /// Directory relative paths resolve against (the config file's directory).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl AnalysisConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&data)?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cameras.is_empty() {
            return Err(Error::InvalidInput("no cameras configured".into()));
        }
        let mut seen = BTreeSet::new();
        for cam in &self.cameras {
            if !seen.insert(cam.cam_id) {
                return Err(Error::InvalidInput(format!("camera {} configured twice", cam.cam_id)));
            }
        }
        if let Some(nadir) = self.nadir_camera {
            if !seen.contains(&nadir) {
                return Err(Error::InvalidInput(format!("nadir camera {nadir} is not configured")));
            }
        }
        if self.tile.size_m == 0 || self.tile.raster_px == 0 {
            return Err(Error::InvalidInput("tile size and raster resolution must be > 0".into()));
        }
        let k = self.fusion.smoothing.kernel_size;
        if k == 0 || k % 2 == 0 {
            return Err(Error::InvalidInput(format!("smoothing kernel size must be odd, got {k}")));
        }
        if self.fusion.thresholds.iter().any(|t| !(0.0..=1.0).contains(t)) {
            return Err(Error::InvalidInput("thresholds must lie in [0, 1]".into()));
        }
        Ok(())
    }

    /// Resolve a possibly relative path against the config directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn area_folder(&self) -> PathBuf {
        self.resolve(&self.folder)
    }

    pub fn camera_ids(&self) -> Vec<CameraId> {
        self.cameras.iter().map(|c| c.cam_id).collect()
    }

    pub fn camera_models(&self) -> Result<Vec<CameraModel>> {
        self.cameras.iter().map(CameraModel::new).collect()
    }

    pub fn nadir_camera_id(&self) -> Option<CameraId> {
        self.nadir_camera
            .or_else(|| self.camera_ids().into_iter().find(|id| id.is_nadir()))
    }

    /// Build the catalog from every configured image index.
    pub fn load_catalog(&self) -> Result<ImageCatalog> {
        let mut catalog = ImageCatalog::new(self.camera_models()?);
        for index_path in &self.image_index {
            let path = self.resolve(index_path);
            let index = ImageIndex::from_json_file(&path)?;
            let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
            let skipped = catalog.add_index(&index, &base)?;
            tracing::info!(
                index = %path.display(),
                images = index.images.len() - skipped,
                skipped,
                "loaded image index"
            );
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraPosition;

    const MINIMAL: &str = r#"{
        "folder": "area",
        "cameras": [
            {"cam_id": "Cam0N", "f": 100.0, "PPx": 0.0, "PPy": 0.0,
             "width_px": 1000, "height_px": 1000, "width_mm": 50.0, "height_mm": 50.0},
            {"cam_id": "Cam1B", "f": 120.0, "PPx": 0.0, "PPy": 0.0,
             "width_px": 1000, "height_px": 800, "width_mm": 50.0, "height_mm": 40.0}
        ],
        "image_index": ["index.json"]
    }"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg: AnalysisConfig = serde_json::from_str(MINIMAL).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.tile, TileConfig::default());
        assert_eq!(cfg.fusion.thresholds, vec![0.3, 0.4, 0.5, 0.6, 0.7]);
        assert_eq!(cfg.backprojection.min_observations, 4);
        assert_eq!(cfg.nadir_camera_id(), Some(CameraId::new(0, CameraPosition::Nadir)));
        assert_eq!(cfg.camera_models().unwrap().len(), 2);
    }

    #[test]
    fn area_accepts_box_or_polygon() {
        let b: AreaSpec =
            serde_json::from_str(r#"{"min_x": 0, "min_y": 0, "max_x": 100, "max_y": 50}"#).unwrap();
        assert_eq!(b.bounds(), Some(WorldBox::new(0.0, 0.0, 100.0, 50.0)));
        let p: AreaSpec = serde_json::from_str("[[0, 0], [100, 0], [0, 50]]").unwrap();
        assert!(matches!(p, AreaSpec::Polygon(_)));
        assert!(p.intersects(&WorldBox::new(10.0, 10.0, 20.0, 20.0)));
        assert!(!p.intersects(&WorldBox::new(80.0, 40.0, 90.0, 50.0)));
    }

    #[test]
    fn validation_rejects_bad_settings() {
        let mut cfg: AnalysisConfig = serde_json::from_str(MINIMAL).unwrap();
        cfg.nadir_camera = Some(CameraId::new(5, CameraPosition::Nadir));
        assert!(cfg.validate().is_err());

        let mut cfg: AnalysisConfig = serde_json::from_str(MINIMAL).unwrap();
        cfg.fusion.smoothing.kernel_size = 6;
        assert!(cfg.validate().is_err());

        let mut cfg: AnalysisConfig = serde_json::from_str(MINIMAL).unwrap();
        let dup = cfg.cameras[0].clone();
        cfg.cameras.push(dup);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn loads_catalog_relative_to_config_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), MINIMAL).unwrap();
        std::fs::write(
            dir.path().join("index.json"),
            r#"{"images": [{"image_name": "x_Cam1B_1", "image_path": "x.jpg",
                "x": 0.0, "y": 0.0, "height": 900.0, "omega": 0.0, "phi": 0.7, "kappa": 0.0}]}"#,
        )
        .unwrap();
        let cfg = AnalysisConfig::from_json_file(&dir.path().join("config.json")).unwrap();
        assert_eq!(cfg.area_folder(), dir.path().join("area"));
        let catalog = cfg.load_catalog().unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.records()[0].path(), dir.path().join("x.jpg"));
    }
}
