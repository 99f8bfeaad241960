//! Count-weighted Gaussian smoothing and thresholding of the confidence raster.

use serde::{Deserialize, Serialize};

use crate::raster::Raster;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Kernel side length (odd).
    pub kernel_size: usize,
    pub sigma: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            kernel_size: 7,
            sigma: 2.5,
        }
    }
}

/// 2-D Gaussian kernel normalized to a maximum of 1.
pub fn gaussian_kernel(size: usize, sigma: f64) -> Raster<f32> {
    let size = size.max(1);
    let center = (size as f64 - 1.0) / 2.0;
    let s2 = 2.0 * sigma * sigma;
    let k = Raster::from_fn(size, size, |r, c| {
        let (dr, dc) = (r as f64 - center, c as f64 - center);
        if s2 > 0.0 {
            (-(dr * dr + dc * dc) / s2).exp() as f32
        } else if dr == 0.0 && dc == 0.0 {
            1.0
        } else {
            0.0
        }
    });
    let max = k.max_value();
    if max > 0.0 {
        k.map(|v| v / max)
    } else {
        k
    }
}

/// Smooth `confidence` with weights `kernel × count` over each neighborhood.
///
/// Cells whose weight sum is zero (no observations nearby) are 0.
pub fn smooth(confidence: &Raster<f32>, count: &Raster<u16>, config: &SmoothingConfig) -> Raster<f32> {
    let kernel = gaussian_kernel(config.kernel_size, config.sigma);
    let half = (kernel.width() / 2) as i64;
    Raster::from_fn(confidence.width(), confidence.height(), |r, c| {
        let mut weight_sum = 0.0f64;
        let mut acc = 0.0f64;
        for kr in 0..kernel.height() {
            for kc in 0..kernel.width() {
                let rr = r as i64 + kr as i64 - half;
                let cc = c as i64 + kc as i64 - half;
                let Some(n) = count.get_checked(rr, cc) else {
                    continue;
                };
                if n == 0 {
                    continue;
                }
                let w = kernel.get(kr, kc) as f64 * n as f64;
                weight_sum += w;
                acc += w * confidence.get(rr as usize, cc as usize) as f64;
            }
        }
        if weight_sum > 0.0 {
            (acc / weight_sum) as f32
        } else {
            0.0
        }
    })
}

/// One boolean raster per cutoff: `value >= cutoff`.
pub fn threshold(values: &Raster<f32>, cutoffs: &[f32]) -> Vec<(f32, Raster<bool>)> {
    cutoffs
        .iter()
        .map(|&t| (t, values.map(|v| v >= t)))
        .collect()
}
