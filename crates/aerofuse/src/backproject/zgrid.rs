//! Dense per-pixel height grid in the tile-local mask frame.

use crate::raster::Raster;

use super::filter::LocalSample;

/// Build a `height × width` z-grid from local samples.
///
/// Each cell takes the maximum z of the samples falling in it; empty cells
/// are filled by repeated averaging of filled 8-neighbors (unreachable cells
/// become 0), then a `median_rows × median_cols` median filter is applied.
pub fn build_z_grid(
    samples: &[LocalSample],
    width: usize,
    height: usize,
    median_rows: usize,
    median_cols: usize,
) -> Raster<f32> {
    let mut grid = Raster::filled(width, height, f32::NAN);
    for s in samples {
        let (row, col) = (s[0].floor(), s[1].floor());
        if row < 0.0 || col < 0.0 || row >= height as f64 || col >= width as f64 {
            continue;
        }
        let (row, col) = (row as usize, col as usize);
        let z = s[2] as f32;
        let cur = grid.get(row, col);
        if cur.is_nan() || z > cur {
            grid.set(row, col, z);
        }
    }
    fill_missing(&mut grid);
    median_filter(&grid, median_rows, median_cols)
}

/// Fill NaN cells from the mean of their finite 8-neighbors, one ring per
/// pass, until nothing changes; remaining NaN cells become 0.
pub fn fill_missing(grid: &mut Raster<f32>) {
    let (w, h) = (grid.width() as i64, grid.height() as i64);
    let mut pending: Vec<(usize, usize)> = (0..grid.height())
        .flat_map(|r| (0..grid.width()).map(move |c| (r, c)))
        .filter(|&(r, c)| grid.get(r, c).is_nan())
        .collect();

    while !pending.is_empty() {
        let mut updates = Vec::new();
        let mut still = Vec::new();
        for &(r, c) in &pending {
            let mut sum = 0.0f32;
            let mut n = 0u32;
            for dr in -1..=1i64 {
                for dc in -1..=1i64 {
                    if dr == 0 && dc == 0 {
                        continue;
                    }
                    let (nr, nc) = (r as i64 + dr, c as i64 + dc);
                    if nr < 0 || nc < 0 || nr >= h || nc >= w {
                        continue;
                    }
                    let v = grid.get(nr as usize, nc as usize);
                    if !v.is_nan() {
                        sum += v;
                        n += 1;
                    }
                }
            }
            if n > 0 {
                updates.push((r, c, sum / n as f32));
            } else {
                still.push((r, c));
            }
        }
        if updates.is_empty() {
            break;
        }
        for (r, c, v) in updates {
            grid.set(r, c, v);
        }
        pending = still;
    }

    for v in grid.data_mut() {
        if v.is_nan() {
            *v = 0.0;
        }
    }
}

/// Median over a `rows × cols` window clipped at the raster border.
pub fn median_filter(grid: &Raster<f32>, rows: usize, cols: usize) -> Raster<f32> {
    if rows <= 1 && cols <= 1 {
        return grid.clone();
    }
    let (hr, hc) = ((rows / 2) as i64, (cols / 2) as i64);
    let (w, h) = (grid.width() as i64, grid.height() as i64);
    let mut buf = Vec::with_capacity(rows * cols);
    Raster::from_fn(grid.width(), grid.height(), |r, c| {
        buf.clear();
        let (r, c) = (r as i64, c as i64);
        for rr in (r - hr).max(0)..=(r + hr).min(h - 1) {
            for cc in (c - hc).max(0)..=(c + hc).min(w - 1) {
                buf.push(grid.get(rr as usize, cc as usize));
            }
        }
        let mid = buf.len() / 2;
        let (_, m, _) = buf.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        *m
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn keeps_maximum_per_cell() {
        let samples = [[0.2, 0.3, 5.0], [0.7, 0.9, 9.0], [0.5, 0.5, 2.0]];
        let g = build_z_grid(&samples, 1, 1, 1, 1);
        assert_eq!(g.get(0, 0), 9.0);
    }

    #[test]
    fn fills_holes_from_neighbors() {
        let samples = [[0.0, 0.0, 4.0], [0.0, 2.0, 8.0]];
        let g = build_z_grid(&samples, 3, 1, 1, 1);
        assert_relative_eq!(g.get(0, 1), 6.0);
    }

    #[test]
    fn fill_propagates_across_rings() {
        let samples = [[0.0, 0.0, 3.0]];
        let g = build_z_grid(&samples, 5, 5, 1, 1);
        assert!(g.data().iter().all(|&v| (v - 3.0).abs() < 1e-6));
    }

    #[test]
    fn empty_cloud_gives_zero_grid() {
        let g = build_z_grid(&[], 4, 3, 15, 5);
        assert!(g.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn out_of_frame_samples_are_ignored() {
        let samples = [[-1.0, 0.0, 100.0], [0.0, 7.0, 100.0], [0.0, 0.0, 1.0]];
        let g = build_z_grid(&samples, 2, 2, 1, 1);
        assert!(g.data().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn median_removes_isolated_spike() {
        let mut g = Raster::filled(9, 20, 2.0f32);
        g.set(10, 4, 50.0);
        let m = median_filter(&g, 15, 5);
        assert_eq!(m.get(10, 4), 2.0);
        assert!(m.data().iter().all(|&v| v == 2.0));
    }
}
