use std::collections::BTreeMap;
use std::path::Path;

use rayon::prelude::*;

use super::{Pipeline, DESCRIPTOR_FILE, MASKS_DIR, RESULTS_DIR};
use crate::backproject::{tile_mask, DetectionBackProjector};
use crate::camera::CameraId;
use crate::error::{Error, Result};
use crate::fusion::{rectify_nadir, FusionOutput, FusionRaster, NadirRectification};
use crate::io::{load_mask, save_bool_raster, save_heights, save_unit_raster};
use crate::raster::Raster;
use crate::tile::{TileDescriptor, TileKey};

/// Result of analyzing one tile.
#[derive(Debug, Clone)]
pub struct TileOutcome {
    pub key: TileKey,
    /// `None` when the tile was skipped for lack of detections.
    pub output: Option<FusionOutput>,
    pub cameras_used: Vec<CameraId>,
    /// Cameras left out of the fusion, with the reason.
    pub cameras_skipped: Vec<(CameraId, String)>,
}

/// Outcomes of an area run; failed tiles are listed separately.
#[derive(Debug, Default)]
pub struct AnalyzeReport {
    pub outcomes: Vec<TileOutcome>,
    pub failures: Vec<(TileKey, Error)>,
}

impl Pipeline {
    /// Fuse the detection masks of one prepared tile and write its results.
    pub fn analyze_tile(&self, key: TileKey) -> Result<TileOutcome> {
        let dir = self.tile_dir(key);
        let descriptor = TileDescriptor::load(&dir.join(DESCRIPTOR_FILE))?;
        let tile = self.tile(key);
        let fusion_cfg = &self.config.fusion;
        let mut outcome = TileOutcome {
            key,
            output: None,
            cameras_used: Vec::new(),
            cameras_skipped: Vec::new(),
        };

        let mut masks = BTreeMap::new();
        for (&camera, assignment) in &descriptor.image_info {
            let path = dir.join(MASKS_DIR).join(format!("{}.png", assignment.image_name));
            if !path.is_file() {
                tracing::warn!(tile = %key, %camera, path = %path.display(), "mask missing, skipping camera");
                outcome.cameras_skipped.push((camera, "mask missing".into()));
                continue;
            }
            masks.insert(camera, load_mask(&path)?);
        }

        if fusion_cfg.skip_empty_tiles && !has_detections(masks.values(), fusion_cfg.presence_threshold) {
            tracing::info!(tile = %key, "no detections, skipping tile");
            return Ok(outcome);
        }

        let heights = self.elevation.heights_for_area(&tile.bbox(), tile.resolution())?;
        if heights.missing > 0 {
            tracing::warn!(tile = %key, missing = heights.missing, "tile heights unavailable, using 0");
        }
        let samples = heights.samples();

        let nadir = self.config.nadir_camera_id();
        let projector = DetectionBackProjector::new(self.config.backprojection.clone());
        let mut fusion = FusionRaster::new(&tile);
        let mut nadir_result: Option<NadirRectification> = None;

        for (camera, raw) in &masks {
            let assignment = &descriptor.image_info[camera];
            let record = self.catalog.get(&assignment.image_name).ok_or_else(|| {
                Error::InvalidInput(format!("image {} is not in the catalog", assignment.image_name))
            })?;

            if Some(*camera) == nadir {
                let mask = tile_mask(raw, assignment);
                match rectify_nadir(&tile, &heights, record, assignment, &mask) {
                    Ok(rect) => {
                        let cells = fusion.accumulate_nadir(&rect, fusion_cfg.nadir_threshold);
                        tracing::debug!(tile = %key, %camera, cells, "rectified nadir mask");
                        nadir_result = Some(rect);
                        outcome.cameras_used.push(*camera);
                    }
                    Err(e @ Error::Geometry(_)) => {
                        tracing::warn!(
                            tile = %key,
                            %camera,
                            image = record.name(),
                            "nadir rectification failed: {e}, skipping camera"
                        );
                        outcome.cameras_skipped.push((*camera, e.to_string()));
                    }
                    Err(e) => return Err(e),
                }
                continue;
            }

            match projector.project(record, assignment, raw, &samples) {
                Ok(bp) => {
                    let cells = fusion.accumulate(&bp.observations);
                    tracing::debug!(tile = %key, %camera, cells, "accumulated camera");
                    outcome.cameras_used.push(*camera);
                }
                Err(e @ (Error::InsufficientSignal { .. } | Error::Geometry(_))) => {
                    tracing::warn!(tile = %key, %camera, image = record.name(), "{e}, skipping camera");
                    outcome.cameras_skipped.push((*camera, e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        let output = fusion.finish(fusion_cfg);
        self.write_results(&dir.join(RESULTS_DIR), &output, nadir_result.as_ref(), &heights)?;
        tracing::info!(
            tile = %key,
            cameras = outcome.cameras_used.len(),
            skipped = outcome.cameras_skipped.len(),
            "analyzed tile"
        );
        outcome.output = Some(output);
        Ok(outcome)
    }

    fn write_results(
        &self,
        dir: &Path,
        output: &FusionOutput,
        nadir: Option<&NadirRectification>,
        heights: &crate::terrain::HeightGrid,
    ) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        save_unit_raster(&dir.join("confidence.png"), &output.confidence)?;
        save_unit_raster(&dir.join("smooth.png"), &output.smoothed)?;
        for (t, raster) in &output.thresholded {
            save_bool_raster(&dir.join(threshold_file_name(*t)), raster)?;
        }
        if let Some(rect) = nadir {
            save_unit_raster(&dir.join("nadir_result.png"), &rect.values)?;
            save_bool_raster(
                &dir.join("nadir_result_sharp.png"),
                &rect.sharp(self.config.fusion.nadir_threshold),
            )?;
        }
        save_heights(&dir.join("heights.png"), heights)?;
        Ok(())
    }

    /// Analyze every prepared tile in parallel and mosaic the results into
    /// `<folder>/mosaic`.
    pub fn analyze_area(&self) -> Result<AnalyzeReport> {
        let keys = self.prepared_tiles()?;
        tracing::info!(tiles = keys.len(), folder = %self.folder.display(), "analyzing area");
        let results: Vec<(TileKey, Result<TileOutcome>)> = keys
            .par_iter()
            .map(|&key| (key, self.analyze_tile(key)))
            .collect();

        let mut report = AnalyzeReport::default();
        for (key, res) in results {
            match res {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(tile = %key, "analysis failed: {e}");
                    report.failures.push((key, e));
                }
            }
        }
        self.compose(&report.outcomes, &self.folder.join("mosaic"))?;
        Ok(report)
    }
}

/// `thresh_<t>.png`, e.g. `thresh_0.5.png`.
pub(crate) fn threshold_file_name(t: f32) -> String {
    format!("thresh_{t}.png")
}

fn has_detections<'a>(masks: impl IntoIterator<Item = &'a Raster<f32>>, threshold: f32) -> bool {
    masks
        .into_iter()
        .any(|m| m.data().iter().any(|&v| v > threshold))
}
