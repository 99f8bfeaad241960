//! aerofuse — photogrammetric projection and multi-view fusion of building
//! detection masks from oblique aerial imagery.
//!
//! An area is cut into square ground tiles. For every tile the pipeline
//! stages are:
//!
//! 1. **Select** – per camera, pick the image whose projected tile is closest
//!    to the image center and derive the crop geometry.
//! 2. **Prepare** – write tile crops and the `info.json` descriptor; an
//!    external detector produces one mask per crop.
//! 3. **Back-project** – lift each oblique mask onto the ground through a
//!    terrain-derived z-grid.
//! 4. **Fuse** – rectify the nadir mask, accumulate every camera into a
//!    confidence raster, smooth and threshold it.
//! 5. **Compose** – mosaic tile results into area rasters.
//!
//! # Public API
//! - [`Pipeline`] and [`AnalysisConfig`] as primary entry points
//! - [`CameraModel`], [`Pose`] and the collinearity transforms for
//!   standalone projection
//! - [`ElevationSource`] for plugging in terrain heights

pub mod backproject;
pub mod camera;
pub mod config;
pub mod error;
pub mod fusion;
pub mod geometry;
pub mod homography;
pub mod http;
pub mod io;
pub mod mosaic;
pub mod ortho;
pub mod pipeline;
pub mod raster;
pub mod record;
pub mod select;
pub mod terrain;
pub mod tile;

#[cfg(test)]
pub(crate) mod test_utils;

pub use backproject::{BackProjectConfig, BackProjection, DetectionBackProjector, Observation};
pub use camera::{CameraId, CameraModel, CameraPosition, CameraSpec, ForwardTransform, InverseTransform, Pose};
pub use config::{AnalysisConfig, AreaSpec};
pub use error::{Error, GeometryError, Result};
pub use fusion::{FusionConfig, FusionOutput, FusionRaster};
pub use geometry::{Footprint, GridTransform, WorldBox};
pub use mosaic::{AreaRaster, TileMosaicker};
pub use ortho::{OrthophotoConfig, OrthophotoService};
pub use pipeline::{AnalyzeReport, Pipeline, TileOutcome};
pub use raster::Raster;
pub use record::{ImageCatalog, ImageIndex, ImageRecord};
pub use select::TileSelector;
pub use terrain::{ElevationSource, HeightGrid, HttpElevationService, StaticElevation};
pub use tile::{CameraAssignment, Tile, TileConfig, TileDescriptor, TileKey};
