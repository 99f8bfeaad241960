use std::path::Path;

use crate::error::{Error, Result};
use crate::geometry::WorldBox;
use crate::raster::Raster;

use super::HeightGrid;

/// ESRI ASCII grid (`AAIGrid`), as returned by WCS elevation services.
///
/// Accepts `xllcorner`/`xllcenter`, `cellsize` or separate `dx`/`dy`, and an
/// optional `NODATA_value`. Rows are stored top (north) first.
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiGrid {
    pub ncols: usize,
    pub nrows: usize,
    /// West edge.
    pub xll: f64,
    /// South edge.
    pub yll: f64,
    pub dx: f64,
    pub dy: f64,
    pub nodata: Option<f64>,
    pub values: Raster<f64>,
}

impl AsciiGrid {
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let bad = |msg: String| Error::InvalidInput(format!("ASCII grid: {msg}"));
        let mut tokens = text.split_ascii_whitespace().peekable();

        let mut ncols = None;
        let mut nrows = None;
        let mut xll = None;
        let mut yll = None;
        let mut x_center = false;
        let mut y_center = false;
        let mut cellsize = None;
        let mut dx = None;
        let mut dy = None;
        let mut nodata = None;

        while let Some(&key) = tokens.peek() {
            if !key.starts_with(|c: char| c.is_ascii_alphabetic()) {
                break;
            }
            tokens.next();
            let value = tokens
                .next()
                .ok_or_else(|| bad(format!("missing value for {key}")))?;
            let num: f64 = value
                .parse()
                .map_err(|_| bad(format!("bad value {value:?} for {key}")))?;
            match key.to_ascii_lowercase().as_str() {
                "ncols" => ncols = Some(num as usize),
                "nrows" => nrows = Some(num as usize),
                "xllcorner" => xll = Some(num),
                "yllcorner" => yll = Some(num),
                "xllcenter" => {
                    xll = Some(num);
                    x_center = true;
                }
                "yllcenter" => {
                    yll = Some(num);
                    y_center = true;
                }
                "cellsize" => cellsize = Some(num),
                "dx" => dx = Some(num),
                "dy" => dy = Some(num),
                "nodata_value" => nodata = Some(num),
                other => return Err(bad(format!("unknown header key {other:?}"))),
            }
        }

        let ncols = ncols.ok_or_else(|| bad("missing ncols".into()))?;
        let nrows = nrows.ok_or_else(|| bad("missing nrows".into()))?;
        let dx = dx.or(cellsize).ok_or_else(|| bad("missing cellsize".into()))?;
        let dy = dy.or(cellsize).ok_or_else(|| bad("missing cellsize".into()))?;
        if ncols == 0 || nrows == 0 || !(dx > 0.0) || !(dy > 0.0) {
            return Err(bad(format!("degenerate grid {ncols}x{nrows}, cell {dx}x{dy}")));
        }
        let mut xll = xll.ok_or_else(|| bad("missing xllcorner".into()))?;
        let mut yll = yll.ok_or_else(|| bad("missing yllcorner".into()))?;
        if x_center {
            xll -= dx / 2.0;
        }
        if y_center {
            yll -= dy / 2.0;
        }

        let data = tokens
            .map(|t| t.parse::<f64>().map_err(|_| bad(format!("bad cell value {t:?}"))))
            .collect::<Result<Vec<_>>>()?;
        if data.len() != ncols * nrows {
            return Err(bad(format!(
                "expected {} cell values, found {}",
                ncols * nrows,
                data.len()
            )));
        }

        Ok(Self {
            ncols,
            nrows,
            xll,
            yll,
            dx,
            dy,
            nodata,
            values: Raster::from_vec(ncols, nrows, data)?,
        })
    }

    pub fn bbox(&self) -> WorldBox {
        WorldBox::new(
            self.xll,
            self.yll,
            self.xll + self.dx * self.ncols as f64,
            self.yll + self.dy * self.nrows as f64,
        )
    }

    /// Nearest-cell height; `None` outside the grid or on NODATA.
    pub fn value_at(&self, x: f64, y: f64) -> Option<f64> {
        let col = ((x - self.xll) / self.dx).floor();
        let row = ((self.yll + self.dy * self.nrows as f64 - y) / self.dy).floor();
        if !col.is_finite() || !row.is_finite() {
            return None;
        }
        let v = self.values.get_checked(row as i64, col as i64)?;
        match self.nodata {
            Some(nd) if v == nd => None,
            _ if !v.is_finite() => None,
            _ => Some(v),
        }
    }

    /// Sample onto a `resolution × resolution` grid over `bbox`; cells with no
    /// value become 0 and are counted.
    pub fn resample(&self, bbox: &WorldBox, resolution: usize) -> HeightGrid {
        let mut missing = 0usize;
        let t = crate::geometry::GridTransform::for_box(bbox, resolution, resolution);
        let heights = Raster::from_fn(resolution, resolution, |row, col| {
            let [x, y] = t.xy(row, col);
            match self.value_at(x, y) {
                Some(z) => z as f32,
                None => {
                    missing += 1;
                    0.0
                }
            }
        });
        HeightGrid {
            bbox: *bbox,
            heights,
            missing,
        }
    }
}
