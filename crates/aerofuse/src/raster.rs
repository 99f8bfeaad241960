//! Row-major 2-D grid used for masks, z-grids, confidence and boolean rasters.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T: Copy> Raster<T> {
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::InvalidInput(format!(
                "raster data has {} cells, expected {width}x{height}",
                data.len()
            )));
        }
        Ok(Self { width, height, data })
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                data.push(f(row, col));
            }
        }
        Self { width, height, data }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[self.index(row, col)]
    }

    /// Signed lookup; `None` outside the grid.
    pub fn get_checked(&self, row: i64, col: i64) -> Option<T> {
        if row < 0 || col < 0 || row >= self.height as i64 || col >= self.width as i64 {
            return None;
        }
        Some(self.get(row as usize, col as usize))
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        let i = self.index(row, col);
        self.data[i] = value;
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn map<U: Copy>(&self, f: impl Fn(T) -> U) -> Raster<U> {
        Raster {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Copy of the sub-window starting at `(row0, col0)`; cells outside the
    /// source take `fill`.
    pub fn window(&self, row0: i64, col0: i64, width: usize, height: usize, fill: T) -> Raster<T> {
        Raster::from_fn(width, height, |r, c| {
            self.get_checked(row0 + r as i64, col0 + c as i64).unwrap_or(fill)
        })
    }
}

impl Raster<f32> {
    /// Bilinear sample at continuous pixel coordinates (cell centers at
    /// integer positions). Samples outside `[-0.5, size - 0.5]` are `None`;
    /// the edge band clamps to the border cells.
    pub fn sample_bilinear(&self, col: f64, row: f64) -> Option<f32> {
        if self.is_empty() || !col.is_finite() || !row.is_finite() {
            return None;
        }
        let max_c = self.width as f64 - 0.5;
        let max_r = self.height as f64 - 0.5;
        if col < -0.5 || row < -0.5 || col > max_c || row > max_r {
            return None;
        }
        let c = col.clamp(0.0, (self.width - 1) as f64);
        let r = row.clamp(0.0, (self.height - 1) as f64);
        let c0 = c.floor() as usize;
        let r0 = r.floor() as usize;
        let c1 = (c0 + 1).min(self.width - 1);
        let r1 = (r0 + 1).min(self.height - 1);
        let fc = (c - c0 as f64) as f32;
        let fr = (r - r0 as f64) as f32;
        let top = self.get(r0, c0) * (1.0 - fc) + self.get(r0, c1) * fc;
        let bottom = self.get(r1, c0) * (1.0 - fc) + self.get(r1, c1) * fc;
        Some(top * (1.0 - fr) + bottom * fr)
    }

    /// Bilinear resize with pixel-center alignment.
    pub fn resize_bilinear(&self, width: usize, height: usize) -> Raster<f32> {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let sx = self.width as f64 / width as f64;
        let sy = self.height as f64 / height as f64;
        Raster::from_fn(width, height, |row, col| {
            let c = ((col as f64 + 0.5) * sx - 0.5).clamp(0.0, (self.width.max(1) - 1) as f64);
            let r = ((row as f64 + 0.5) * sy - 0.5).clamp(0.0, (self.height.max(1) - 1) as f64);
            self.sample_bilinear(c, r).unwrap_or(0.0)
        })
    }

    pub fn max_value(&self) -> f32 {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f32::NEG_INFINITY, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn from_vec_checks_length() {
        assert!(Raster::from_vec(2, 2, vec![0u8; 3]).is_err());
        let r = Raster::from_vec(3, 2, (0..6).collect::<Vec<i32>>()).unwrap();
        assert_eq!(r.get(1, 0), 3);
        assert_eq!(r.get_checked(2, 0), None);
        assert_eq!(r.get_checked(0, -1), None);
    }

    #[test]
    fn window_pads_outside_cells() {
        let r = Raster::from_fn(4, 4, |row, col| (row * 4 + col) as i32);
        let w = r.window(-1, 2, 3, 2, -1);
        assert_eq!(w.data(), &[-1, -1, -1, 2, 3, -1]);
    }

    #[test]
    fn bilinear_interpolates_between_centers() {
        let r = Raster::from_vec(2, 1, vec![0.0f32, 1.0]).unwrap();
        assert_relative_eq!(r.sample_bilinear(0.5, 0.0).unwrap(), 0.5);
        assert_relative_eq!(r.sample_bilinear(-0.4, 0.0).unwrap(), 0.0);
        assert_relative_eq!(r.sample_bilinear(1.4, 0.0).unwrap(), 1.0);
        assert!(r.sample_bilinear(1.6, 0.0).is_none());
        assert!(r.sample_bilinear(0.0, f64::NAN).is_none());
    }

    #[test]
    fn resize_preserves_constant_regions() {
        let r = Raster::from_fn(4, 4, |_, col| if col < 2 { 1.0f32 } else { 0.0 });
        let up = r.resize_bilinear(8, 8);
        assert_eq!((up.width(), up.height()), (8, 8));
        assert_relative_eq!(up.get(3, 0), 1.0);
        assert_relative_eq!(up.get(5, 7), 0.0);
        let same = r.resize_bilinear(4, 4);
        assert_eq!(same, r);
    }
}
