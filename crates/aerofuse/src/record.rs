//! Image records and the catalog of all exposures taken during a run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::camera::{CameraId, CameraModel, ForwardTransform, InverseTransform, Pose};
use crate::error::{Error, GeometryError, Result};
use crate::geometry::{Footprint, WorldBox};

/// One exposure: pose, shared camera and eagerly built transforms.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    name: String,
    path: PathBuf,
    pose: Pose,
    camera: Arc<CameraModel>,
    footprint: Option<Footprint>,
    forward: ForwardTransform,
    inverse: InverseTransform,
}

impl ImageRecord {
    /// Fails when the pose rotation is degenerate.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        pose: Pose,
        camera: Arc<CameraModel>,
        footprint: Option<Footprint>,
    ) -> std::result::Result<Self, GeometryError> {
        let forward = camera.forward(&pose)?;
        let inverse = camera.inverse(&pose)?;
        Ok(Self {
            name: name.into(),
            path: path.into(),
            pose,
            camera,
            footprint,
            forward,
            inverse,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    pub fn camera_id(&self) -> CameraId {
        self.camera.id()
    }

    pub fn footprint(&self) -> Option<&Footprint> {
        self.footprint.as_ref()
    }

    pub fn forward(&self) -> &ForwardTransform {
        &self.forward
    }

    pub fn inverse(&self) -> &InverseTransform {
        &self.inverse
    }

    /// Records without a footprint never cover anything.
    pub fn covers(&self, area: &WorldBox) -> bool {
        self.footprint.as_ref().is_some_and(|f| f.intersects_box(area))
    }
}

/// Unit of the orientation angles in an image index file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleUnit {
    #[default]
    Radians,
    Degrees,
}

/// One entry of an image index file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub image_name: String,
    pub image_path: PathBuf,
    /// Explicit camera; resolved from `image_name` when absent.
    #[serde(default)]
    pub cam_id: Option<CameraId>,
    pub x: f64,
    pub y: f64,
    pub height: f64,
    pub omega: f64,
    pub phi: f64,
    pub kappa: f64,
    #[serde(default)]
    pub footprint: Option<Vec<[f64; 2]>>,
}

/// Image index file: a list of entries plus the angle unit they use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageIndex {
    #[serde(default)]
    pub angle_unit: AngleUnit,
    pub images: Vec<IndexEntry>,
}

impl ImageIndex {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let index: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(index)
    }
}

/// All image records of a run plus the cameras they were taken with.
#[derive(Debug, Clone, Default)]
pub struct ImageCatalog {
    cameras: BTreeMap<CameraId, Arc<CameraModel>>,
    camera_order: Vec<CameraId>,
    records: Vec<ImageRecord>,
}

impl ImageCatalog {
    /// Cameras keep the given order; it is the order used during selection.
    pub fn new(cameras: impl IntoIterator<Item = CameraModel>) -> Self {
        let mut catalog = Self::default();
        for cam in cameras {
            let id = cam.id();
            if catalog.cameras.insert(id, Arc::new(cam)).is_none() {
                catalog.camera_order.push(id);
            }
        }
        catalog
    }

    pub fn camera_ids(&self) -> &[CameraId] {
        &self.camera_order
    }

    pub fn camera(&self, id: CameraId) -> Option<&Arc<CameraModel>> {
        self.cameras.get(&id)
    }

    /// Camera of an image, from its name token.
    pub fn resolve_camera(&self, image_name: &str) -> Result<&Arc<CameraModel>> {
        let id = CameraId::find_in(image_name)
            .ok_or_else(|| Error::UnresolvedCamera(image_name.to_string()))?;
        self.cameras
            .get(&id)
            .ok_or_else(|| Error::UnresolvedCamera(format!("{image_name} ({id} is not configured)")))
    }

    pub fn push(&mut self, record: ImageRecord) {
        self.records.push(record);
    }

    /// Add every entry of an index; relative image paths resolve against `base_dir`.
    ///
    /// Names without a camera token are an error. Entries of cameras that are
    /// not configured are skipped and counted in the return value.
    pub fn add_index(&mut self, index: &ImageIndex, base_dir: &Path) -> Result<usize> {
        let mut skipped = 0usize;
        for entry in &index.images {
            let id = match entry.cam_id {
                Some(id) => id,
                None => CameraId::find_in(&entry.image_name)
                    .ok_or_else(|| Error::UnresolvedCamera(entry.image_name.clone()))?,
            };
            let Some(camera) = self.cameras.get(&id).cloned() else {
                skipped += 1;
                continue;
            };
            let to_rad = |a: f64| match index.angle_unit {
                AngleUnit::Radians => a,
                AngleUnit::Degrees => a.to_radians(),
            };
            let pose = Pose::new(
                [entry.x, entry.y, entry.height],
                [to_rad(entry.omega), to_rad(entry.phi), to_rad(entry.kappa)],
            );
            let footprint = entry.footprint.clone().map(Footprint::new);
            let path = if entry.image_path.is_absolute() {
                entry.image_path.clone()
            } else {
                base_dir.join(&entry.image_path)
            };
            let record = ImageRecord::new(entry.image_name.clone(), path, pose, camera, footprint)
                .map_err(|e| Error::InvalidInput(format!("image {}: {e}", entry.image_name)))?;
            self.records.push(record);
        }
        if skipped > 0 {
            tracing::debug!(skipped, "index entries of unconfigured cameras skipped");
        }
        Ok(skipped)
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ImageRecord> {
        self.records.iter().find(|r| r.name() == name)
    }

    pub fn for_camera(&self, id: CameraId) -> impl Iterator<Item = &ImageRecord> + '_ {
        self.records.iter().filter(move |r| r.camera_id() == id)
    }

    /// Records of `id` whose footprint intersects `area`, in catalog order.
    pub fn covering(&self, id: CameraId, area: &WorldBox) -> impl Iterator<Item = &ImageRecord> + '_ {
        let area = *area;
        self.for_camera(id).filter(move |r| r.covers(&area))
    }
}
