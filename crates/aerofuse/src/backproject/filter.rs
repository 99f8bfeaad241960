//! Neighbor-consistency filter on the projected height cloud.
//!
//! A sample is discarded when it has more than `max_neighbors` neighbors
//! inside its window (itself excluded) and its height is strictly above the
//! neighbors' mean. Sparse samples are always kept.

use std::collections::HashMap;

/// `[row, col, z]` in the tile-local mask frame.
pub type LocalSample = [f64; 3];

/// Window half-widths and neighbor limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborWindow {
    pub half_rows: f64,
    pub half_cols: f64,
    pub max_neighbors: usize,
}

impl NeighborWindow {
    /// Half-widths scaled with the mask size: `base · mask_h / reference`
    /// rows and `base · mask_w / reference` columns.
    pub fn scaled(base: f64, reference: f64, mask_w: usize, mask_h: usize, max_neighbors: usize) -> Self {
        Self {
            half_rows: base * mask_h as f64 / reference,
            half_cols: base * mask_w as f64 / reference,
            max_neighbors,
        }
    }
}

/// Samples that pass the filter, in input order.
pub fn filter_height_values(samples: &[LocalSample], window: &NeighborWindow) -> Vec<LocalSample> {
    if samples.is_empty() {
        return Vec::new();
    }
    let cell_r = window.half_rows.max(1e-9);
    let cell_c = window.half_cols.max(1e-9);
    let bucket = |s: &LocalSample| ((s[0] / cell_r).floor() as i64, (s[1] / cell_c).floor() as i64);

    let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, s) in samples.iter().enumerate() {
        grid.entry(bucket(s)).or_default().push(i);
    }

    samples
        .iter()
        .enumerate()
        .filter(|&(i, s)| {
            let (br, bc) = bucket(s);
            let mut count = 0usize;
            let mut z_sum = 0.0;
            for dr in -1..=1 {
                for dc in -1..=1 {
                    let Some(members) = grid.get(&(br + dr, bc + dc)) else {
                        continue;
                    };
                    for &j in members {
                        if j == i {
                            continue;
                        }
                        let o = &samples[j];
                        if (o[0] - s[0]).abs() <= window.half_rows && (o[1] - s[1]).abs() <= window.half_cols {
                            count += 1;
                            z_sum += o[2];
                        }
                    }
                }
            }
            count <= window.max_neighbors || s[2] <= z_sum / count as f64
        })
        .map(|(_, s)| *s)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> NeighborWindow {
        NeighborWindow::scaled(10.0, 500.0, 500, 500, 5)
    }

    #[test]
    fn window_scales_with_mask_size() {
        let w = NeighborWindow::scaled(10.0, 500.0, 250, 1000, 5);
        assert_eq!(w.half_rows, 20.0);
        assert_eq!(w.half_cols, 5.0);
    }

    #[test]
    fn isolated_point_survives_next_to_consistent_cluster() {
        // 11 samples at z = 10 packed within a few pixels, one far away at z = 50.
        let mut samples: Vec<LocalSample> = (0..11)
            .map(|k| [100.0 + (k % 4) as f64, 100.0 + (k / 4) as f64, 10.0])
            .collect();
        samples.push([300.0, 300.0, 50.0]);

        let kept = filter_height_values(&samples, &window());
        assert_eq!(kept.len(), 12);
        assert!(kept.contains(&[300.0, 300.0, 50.0]));
    }

    #[test]
    fn elevated_outlier_inside_dense_cluster_is_removed() {
        let mut samples: Vec<LocalSample> = (0..11)
            .map(|k| [100.0 + (k % 4) as f64, 100.0 + (k / 4) as f64, 10.0])
            .collect();
        samples.push([101.5, 101.5, 40.0]);

        let kept = filter_height_values(&samples, &window());
        assert_eq!(kept.len(), 11);
        assert!(kept.iter().all(|s| s[2] == 10.0));
    }

    #[test]
    fn lower_point_in_cluster_is_kept() {
        let mut samples: Vec<LocalSample> = (0..8).map(|k| [50.0 + k as f64, 50.0, 20.0]).collect();
        samples.push([53.5, 50.5, 5.0]);
        let kept = filter_height_values(&samples, &window());
        assert!(kept.contains(&[53.5, 50.5, 5.0]));
        // The low point drags the mean below the rest of the cluster.
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn sparse_neighborhood_is_never_filtered() {
        let samples: Vec<LocalSample> = (0..6).map(|k| [k as f64, 0.0, k as f64 * 100.0]).collect();
        assert_eq!(filter_height_values(&samples, &window()).len(), 6);
    }

    #[test]
    fn window_edge_is_inclusive() {
        let mut samples: Vec<LocalSample> = (0..6).map(|_| [10.0, 10.0, 0.0]).collect();
        samples.push([20.0, 20.0, 1.0]);
        let kept = filter_height_values(&samples, &window());
        assert!(!kept.contains(&[20.0, 20.0, 1.0]));
    }
}
