//! Raster ↔ image file conversion and image cropping.

use std::path::Path;

use image::{imageops, GrayAlphaImage, GrayImage, LumaA, RgbImage};

use crate::error::Result;
use crate::raster::Raster;
use crate::terrain::HeightGrid;
use crate::tile::CropWindow;

/// Load a single-channel mask; 8-bit values map to [0, 1].
pub fn load_mask(path: &Path) -> Result<Raster<f32>> {
    let img = image::open(path)?.into_luma8();
    Ok(gray_to_raster(&img))
}

pub fn gray_to_raster(img: &GrayImage) -> Raster<f32> {
    let (w, h) = img.dimensions();
    Raster::from_fn(w as usize, h as usize, |r, c| {
        img.get_pixel(c as u32, r as u32).0[0] as f32 / 255.0
    })
}

/// Values in [0, 1] (clamped) as 8-bit grayscale.
pub fn unit_to_gray(raster: &Raster<f32>) -> GrayImage {
    GrayImage::from_fn(raster.width() as u32, raster.height() as u32, |x, y| {
        let v = raster.get(y as usize, x as usize);
        let v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        image::Luma([(v * 255.0).round() as u8])
    })
}

pub fn bool_to_gray(raster: &Raster<bool>) -> GrayImage {
    GrayImage::from_fn(raster.width() as u32, raster.height() as u32, |x, y| {
        image::Luma([if raster.get(y as usize, x as usize) { 255 } else { 0 }])
    })
}

pub fn save_unit_raster(path: &Path, raster: &Raster<f32>) -> Result<()> {
    unit_to_gray(raster).save(path)?;
    Ok(())
}

pub fn save_bool_raster(path: &Path, raster: &Raster<bool>) -> Result<()> {
    bool_to_gray(raster).save(path)?;
    Ok(())
}

/// Area raster with `NaN` cells rendered fully transparent.
pub fn save_area_raster(path: &Path, raster: &Raster<f32>) -> Result<()> {
    let img = GrayAlphaImage::from_fn(raster.width() as u32, raster.height() as u32, |x, y| {
        let v = raster.get(y as usize, x as usize);
        if v.is_nan() {
            LumaA([0, 0])
        } else {
            LumaA([(v.clamp(0.0, 1.0) * 255.0).round() as u8, 255])
        }
    });
    img.save(path)?;
    Ok(())
}

/// Load an area raster written by [`save_area_raster`] or a plain grayscale
/// tile image; transparent pixels become `NaN`.
pub fn load_area_raster(path: &Path) -> Result<Raster<f32>> {
    let img = image::open(path)?.into_luma_alpha8();
    let (w, h) = img.dimensions();
    Ok(Raster::from_fn(w as usize, h as usize, |r, c| {
        let LumaA([v, a]) = *img.get_pixel(c as u32, r as u32);
        if a == 0 {
            f32::NAN
        } else {
            v as f32 / 255.0
        }
    }))
}

/// Heights normalized by the maximum height (all-zero when max ≤ 0).
pub fn save_heights(path: &Path, heights: &HeightGrid) -> Result<()> {
    let max = heights.heights.max_value();
    let scaled = if max.is_finite() && max > 0.0 {
        heights.heights.map(|v| v / max)
    } else {
        heights.heights.map(|_| 0.0)
    };
    save_unit_raster(path, &scaled)
}

/// Cut `window` out of `image`; pixels outside the source are black.
pub fn crop_padded(image: &RgbImage, window: CropWindow) -> RgbImage {
    let mut out = RgbImage::new(window.width().max(0) as u32, window.height().max(0) as u32);
    imageops::replace(&mut out, image, -window.left, -window.top);
    out
}

/// Crop and, when the crop is not `size × size`, resize with a triangle filter.
pub fn crop_to_tile(image: &RgbImage, window: CropWindow, size: u32) -> RgbImage {
    let crop = crop_padded(image, window);
    if crop.width() == size && crop.height() == size {
        crop
    } else {
        imageops::resize(&crop, size, size, imageops::FilterType::Triangle)
    }
}
