use rayon::prelude::*;

use super::{Pipeline, DESCRIPTOR_FILE, IMAGES_DIR, MASKS_DIR};
use crate::error::Result;
use crate::io::crop_to_tile;
use crate::select::TileSelector;
use crate::tile::{TileDescriptor, TileKey};

impl Pipeline {
    /// Select images for one tile, write their crops and the descriptor.
    pub fn prepare_tile(&self, key: TileKey) -> Result<TileDescriptor> {
        let tile = self.tile(key);
        let selector = TileSelector::new(&self.catalog, self.elevation.as_ref());
        let selections = selector.select(&tile, &self.config.camera_ids())?;

        let dir = self.tile_dir(key);
        std::fs::create_dir_all(dir.join(IMAGES_DIR))?;
        std::fs::create_dir_all(dir.join(MASKS_DIR))?;

        let mut image_info = std::collections::BTreeMap::new();
        for (camera, sel) in selections {
            let window = sel.assignment.crop_window(sel.record.camera().resolution());
            let source = image::open(sel.record.path())?.into_rgb8();
            let crop = crop_to_tile(&source, window, tile.raster_px);
            crop.save(dir.join(IMAGES_DIR).join(format!("{}.png", sel.record.name())))?;
            tracing::debug!(
                tile = %key,
                %camera,
                image = sel.record.name(),
                cropbox = sel.assignment.cropbox_size,
                "wrote crop"
            );
            image_info.insert(camera, sel.assignment);
        }

        let descriptor = TileDescriptor {
            x: key.x,
            y: key.y,
            image_info,
        };
        descriptor.save(&dir.join(DESCRIPTOR_FILE), self.overwrite)?;
        tracing::info!(tile = %key, cameras = descriptor.image_info.len(), "prepared tile");
        Ok(descriptor)
    }

    /// Prepare every tile of the configured area in parallel.
    ///
    /// The first failing tile aborts the run.
    pub fn prepare_area(&self) -> Result<Vec<TileDescriptor>> {
        let keys = self.area_tiles()?;
        tracing::info!(tiles = keys.len(), folder = %self.folder.display(), "preparing area");
        std::fs::create_dir_all(&self.folder)?;
        keys.par_iter()
            .map(|&key| {
                self.prepare_tile(key)
                    .inspect_err(|e| tracing::error!(tile = %key, "preparation failed: {e}"))
            })
            .collect()
    }
}
