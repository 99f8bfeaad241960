//! Planar projective mapping between the tile raster and a mask image.
//!
//! The fit fixes `h₃₃ = 1` and solves the other eight entries in least
//! squares over conditioned coordinates. The rectification always maps the
//! raster origin to a finite mask point, so `h₃₃` never vanishes there.

use nalgebra::{DMatrix, DVector, Matrix3, Point2, Vector2};

use crate::error::GeometryError;

const MIN_W: f64 = 1e-15;

/// Smallest accepted ratio of the extreme singular values of the system.
const MIN_CONDITION: f64 = 1e-10;

/// Map `(x, y)` through `h`; points sent to infinity come back as NaN.
pub fn project(h: &Matrix3<f64>, x: f64, y: f64) -> [f64; 2] {
    let w = h * Point2::new(x, y).to_homogeneous();
    if w.z.abs() < MIN_W {
        return [f64::NAN, f64::NAN];
    }
    [w.x / w.z, w.y / w.z]
}

/// Shift to the centroid and scale to unit RMS radius.
#[derive(Debug, Clone, Copy)]
struct Conditioner {
    center: Point2<f64>,
    scale: f64,
}

impl Conditioner {
    fn fit(points: &[Point2<f64>]) -> Self {
        let n = points.len() as f64;
        let center = Point2::from(points.iter().map(|p| p.coords).sum::<Vector2<f64>>() / n);
        let rms = (points.iter().map(|p| (p - center).norm_squared()).sum::<f64>() / n).sqrt();
        let scale = if rms > MIN_W { 1.0 / rms } else { 1.0 };
        Self { center, scale }
    }

    fn apply(&self, p: &Point2<f64>) -> Point2<f64> {
        Point2::from((p - self.center) * self.scale)
    }

    fn matrix(&self) -> Matrix3<f64> {
        let s = self.scale;
        let c = self.center;
        Matrix3::new(s, 0.0, -s * c.x, 0.0, s, -s * c.y, 0.0, 0.0, 1.0)
    }

    fn inverse_matrix(&self) -> Matrix3<f64> {
        let r = 1.0 / self.scale;
        let c = self.center;
        Matrix3::new(r, 0.0, c.x, 0.0, r, c.y, 0.0, 0.0, 1.0)
    }
}

/// The two equations `u ↦ v` puts on `[h₁₁ … h₃₂]`, with right-hand sides.
fn constraints(u: &Point2<f64>, v: &Point2<f64>) -> [([f64; 8], f64); 2] {
    [
        ([u.x, u.y, 1.0, 0.0, 0.0, 0.0, -u.x * v.x, -u.y * v.x], v.x),
        ([0.0, 0.0, 0.0, u.x, u.y, 1.0, -u.x * v.y, -u.y * v.y], v.y),
    ]
}

fn to_points(pts: &[[f64; 2]]) -> Result<Vec<Point2<f64>>, GeometryError> {
    pts.iter()
        .map(|&[x, y]| {
            if x.is_finite() && y.is_finite() {
                Ok(Point2::new(x, y))
            } else {
                Err(GeometryError::DegenerateHomography)
            }
        })
        .collect()
}

/// Homography `H` with `dst ≈ project(H, src)` from at least four
/// correspondences.
pub fn estimate_homography(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Matrix3<f64>, GeometryError> {
    if src.len() < 4 || dst.len() != src.len() {
        return Err(GeometryError::DegenerateHomography);
    }
    let src = to_points(src)?;
    let dst = to_points(dst)?;
    let from = Conditioner::fit(&src);
    let to = Conditioner::fit(&dst);

    let rows = 2 * src.len();
    let mut coeffs = Vec::with_capacity(rows * 8);
    let mut rhs = Vec::with_capacity(rows);
    for (s, d) in src.iter().zip(&dst) {
        for (row, b) in constraints(&from.apply(s), &to.apply(d)) {
            coeffs.extend_from_slice(&row);
            rhs.push(b);
        }
    }
    let a = DMatrix::from_row_slice(rows, 8, &coeffs);
    let b = DVector::from_vec(rhs);

    let svd = a.svd(true, true);
    let (lo, hi) = (svd.singular_values.min(), svd.singular_values.max());
    if !(hi > 0.0) || lo / hi < MIN_CONDITION {
        return Err(GeometryError::DegenerateHomography);
    }
    let x = svd
        .solve(&b, 0.0)
        .map_err(|_| GeometryError::DegenerateHomography)?;
    let conditioned = Matrix3::new(x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7], 1.0);
    if !conditioned.iter().all(|v| v.is_finite()) || conditioned.determinant().abs() < 1e-12 {
        return Err(GeometryError::DegenerateHomography);
    }

    let h = to.inverse_matrix() * conditioned * from.matrix();
    let w = h[(2, 2)];
    Ok(if w.abs() < MIN_W { h } else { h / w })
}
