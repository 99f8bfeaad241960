use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::WorldBox;
use crate::http::{HttpClient, RetryPolicy};

use super::{AsciiGrid, ElevationSource, HeightGrid, PointHeights};

/// Remote elevation services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevationConfig {
    /// Point height endpoint (`koordsys`, `punkter` query parameters).
    pub point_url: String,
    /// Optional data source passed as `datakilde`.
    pub point_source: Option<String>,
    /// WCS endpoint for area grids.
    pub raster_url: String,
    /// WCS coverage name.
    pub coverage: String,
    /// WCS output format; must produce an ESRI ASCII grid.
    pub format: String,
    /// EPSG code of world coordinates.
    pub epsg: u32,
    /// Points per point-service request.
    pub batch_size: usize,
    #[serde(flatten)]
    pub retry: RetryPolicy,
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            point_url: "https://ws.geonorge.no/hoydedata/v1/punkt".into(),
            point_source: None,
            raster_url: "https://wcs.geonorge.no/skwms1/wcs.hoyde-dtm-nhm-25832".into(),
            coverage: "nhm_dtm_topo_25832".into(),
            format: "AAIGrid".into(),
            epsg: 25832,
            batch_size: 50,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PointResponse {
    punkter: Vec<PointValue>,
}

#[derive(Debug, Deserialize)]
struct PointValue {
    x: f64,
    y: f64,
    z: Option<f64>,
}

/// Elevation from a point-height REST service and a WCS coverage.
#[derive(Debug, Clone)]
pub struct HttpElevationService {
    client: HttpClient,
    config: ElevationConfig,
}

impl HttpElevationService {
    pub fn new(config: ElevationConfig) -> Self {
        Self {
            client: HttpClient::new(config.retry),
            config,
        }
    }

    fn point_batch(&self, points: &[[f64; 2]]) -> Result<Vec<PointValue>> {
        let mut query = vec![
            ("koordsys", self.config.epsg.to_string()),
            ("punkter", serde_json::to_string(points)?),
        ];
        if let Some(source) = &self.config.point_source {
            query.push(("datakilde", source.clone()));
        }
        let resp: PointResponse = self.client.get_json(&self.config.point_url, &query)?;
        if resp.punkter.len() != points.len() {
            return Err(Error::Service(format!(
                "point service returned {} heights for {} points",
                resp.punkter.len(),
                points.len()
            )));
        }
        Ok(resp.punkter)
    }

    fn coverage_query(&self, bbox: &WorldBox, resolution: usize) -> Vec<(&'static str, String)> {
        vec![
            ("service", "wcs".into()),
            ("version", "1.0.0".into()),
            ("request", "getCoverage".into()),
            ("coverage", self.config.coverage.clone()),
            ("format", self.config.format.clone()),
            ("width", resolution.to_string()),
            ("height", resolution.to_string()),
            ("crs", format!("EPSG:{}", self.config.epsg)),
            (
                "bbox",
                format!("{},{},{},{}", bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y),
            ),
        ]
    }
}

impl ElevationSource for HttpElevationService {
    fn heights_for_points(&self, points: &[[f64; 2]]) -> Result<PointHeights> {
        let mut out = PointHeights::default();
        for chunk in points.chunks(self.config.batch_size.max(1)) {
            for v in self.point_batch(chunk)? {
                let z = match v.z.filter(|z| z.is_finite()) {
                    Some(z) => z,
                    None => {
                        out.missing += 1;
                        0.0
                    }
                };
                out.samples.push([v.x, v.y, z]);
            }
        }
        if out.missing > 0 {
            tracing::warn!(
                missing = out.missing,
                total = points.len(),
                "point heights unavailable, using 0"
            );
        }
        Ok(out)
    }

    fn heights_for_area(&self, bbox: &WorldBox, resolution: usize) -> Result<HeightGrid> {
        let query = self.coverage_query(bbox, resolution);
        let text = self.client.get_text(&self.config.raster_url, &query)?;
        let grid = AsciiGrid::parse(&text)
            .map_err(|e| Error::Service(format!("elevation coverage for {bbox:?}: {e}")))?;
        let heights = grid.resample(bbox, resolution);
        if heights.missing > 0 {
            tracing::warn!(
                missing = heights.missing,
                total = resolution * resolution,
                "elevation grid has NODATA cells, using 0"
            );
        }
        Ok(heights)
    }
}
