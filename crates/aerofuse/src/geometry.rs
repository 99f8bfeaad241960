//! Planar world-space primitives: axis-aligned boxes, footprint polygons and
//! the affine grid transform shared by tiles and elevation rasters.

use serde::{Deserialize, Serialize};

/// Axis-aligned box in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl WorldBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Corners in order top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [[f64; 2]; 4] {
        [
            [self.min_x, self.max_y],
            [self.max_x, self.max_y],
            [self.max_x, self.min_y],
            [self.min_x, self.min_y],
        ]
    }

    pub fn contains(&self, p: [f64; 2]) -> bool {
        p[0] >= self.min_x && p[0] <= self.max_x && p[1] >= self.min_y && p[1] <= self.max_y
    }

    pub fn intersects(&self, other: &WorldBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

/// Simple polygon (open ring) in world coordinates, e.g. an image footprint
/// or the area of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Footprint {
    vertices: Vec<[f64; 2]>,
}

impl Footprint {
    /// A closing vertex equal to the first one is dropped.
    pub fn new(mut vertices: Vec<[f64; 2]>) -> Self {
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        Self { vertices }
    }

    pub fn from_box(b: &WorldBox) -> Self {
        Self::new(b.corners().to_vec())
    }

    pub fn vertices(&self) -> &[[f64; 2]] {
        &self.vertices
    }

    pub fn is_valid(&self) -> bool {
        self.vertices.len() >= 3 && self.vertices.iter().all(|v| v[0].is_finite() && v[1].is_finite())
    }

    pub fn bounds(&self) -> Option<WorldBox> {
        let first = self.vertices.first()?;
        let init = WorldBox::new(first[0], first[1], first[0], first[1]);
        Some(self.vertices.iter().fold(init, |b, v| {
            WorldBox::new(b.min_x.min(v[0]), b.min_y.min(v[1]), b.max_x.max(v[0]), b.max_y.max(v[1]))
        }))
    }

    /// Even-odd point-in-polygon test.
    pub fn contains(&self, p: [f64; 2]) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (a, b) = (self.vertices[i], self.vertices[j]);
            if (a[1] > p[1]) != (b[1] > p[1]) {
                let x_cross = a[0] + (p[1] - a[1]) * (b[0] - a[0]) / (b[1] - a[1]);
                if p[0] < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    fn edges(&self) -> impl Iterator<Item = ([f64; 2], [f64; 2])> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// True when the polygon and the box share any point.
    pub fn intersects_box(&self, b: &WorldBox) -> bool {
        if !self.is_valid() {
            return false;
        }
        match self.bounds() {
            Some(bounds) if bounds.intersects(b) => {}
            _ => return false,
        }
        if self.vertices.iter().any(|v| b.contains(*v)) {
            return true;
        }
        let corners = b.corners();
        if corners.iter().any(|c| self.contains(*c)) {
            return true;
        }
        (0..4)
            .map(|i| (corners[i], corners[(i + 1) % 4]))
            .any(|(p, q)| self.edges().any(|(a, c)| segments_intersect(p, q, a, c)))
    }
}

fn orientation(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

fn segments_intersect(p1: [f64; 2], p2: [f64; 2], q1: [f64; 2], q2: [f64; 2]) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0)) && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// North-up affine mapping between a world box and a `width × height` grid.
///
/// `col = floor((X − left) / pixel_w)`, `row = floor((top − Y) / pixel_h)`;
/// cell centers sit at +0.5 offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTransform {
    pub left: f64,
    pub top: f64,
    pub pixel_w: f64,
    pub pixel_h: f64,
    pub width: usize,
    pub height: usize,
}

impl GridTransform {
    pub fn for_box(b: &WorldBox, width: usize, height: usize) -> Self {
        Self {
            left: b.min_x,
            top: b.max_y,
            pixel_w: b.width() / width as f64,
            pixel_h: b.height() / height as f64,
            width,
            height,
        }
    }

    /// Floor cell index; may fall outside the grid.
    pub fn rowcol(&self, x: f64, y: f64) -> (i64, i64) {
        let col = ((x - self.left) / self.pixel_w).floor() as i64;
        let row = ((self.top - y) / self.pixel_h).floor() as i64;
        (row, col)
    }

    /// Cell index when inside the grid.
    pub fn cell(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (row, col) = self.rowcol(x, y);
        if row < 0 || col < 0 || row >= self.height as i64 || col >= self.width as i64 {
            return None;
        }
        Some((row as usize, col as usize))
    }

    /// Cell index clamped into the grid.
    pub fn clamped_cell(&self, x: f64, y: f64) -> (usize, usize) {
        let (row, col) = self.rowcol(x, y);
        (
            row.clamp(0, self.height as i64 - 1) as usize,
            col.clamp(0, self.width as i64 - 1) as usize,
        )
    }

    /// World coordinate of a cell center.
    pub fn xy(&self, row: usize, col: usize) -> [f64; 2] {
        [
            self.left + (col as f64 + 0.5) * self.pixel_w,
            self.top - (row as f64 + 0.5) * self.pixel_h,
        ]
    }
}
