//! Orthophoto reference images from a WMS `GetMap` endpoint.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::WorldBox;
use crate::http::{HttpClient, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrthophotoConfig {
    pub url: String,
    pub layers: String,
    /// MIME type requested from the service.
    pub format: String,
    pub epsg: u32,
    /// Maximum accepted response size in bytes.
    pub max_bytes: u64,
    #[serde(flatten)]
    pub retry: RetryPolicy,
}

impl Default for OrthophotoConfig {
    fn default() -> Self {
        Self {
            url: "https://wms.geonorge.no/skwms1/wms.nib".into(),
            layers: "ortofoto".into(),
            format: "image/jpeg".into(),
            epsg: 25832,
            max_bytes: 64 * 1024 * 1024,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrthophotoService {
    client: HttpClient,
    config: OrthophotoConfig,
}

impl OrthophotoService {
    pub fn new(config: OrthophotoConfig) -> Self {
        Self {
            client: HttpClient::new(config.retry),
            config,
        }
    }

    fn query(&self, bbox: &WorldBox, width: u32, height: u32) -> Vec<(&'static str, String)> {
        vec![
            ("service", "WMS".into()),
            ("version", "1.3.0".into()),
            ("request", "GetMap".into()),
            ("layers", self.config.layers.clone()),
            ("styles", String::new()),
            ("format", self.config.format.clone()),
            ("crs", format!("EPSG:{}", self.config.epsg)),
            ("width", width.to_string()),
            ("height", height.to_string()),
            (
                "bbox",
                format!("{},{},{},{}", bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y),
            ),
        ]
    }

    pub fn fetch(&self, bbox: &WorldBox, width: u32, height: u32) -> Result<RgbImage> {
        let bytes = self.client.get_bytes(
            &self.config.url,
            &self.query(bbox, width, height),
            self.config.max_bytes,
        )?;
        let img = image::load_from_memory(&bytes)
            .map_err(|e| Error::Service(format!("orthophoto for {bbox:?} is not an image: {e}")))?;
        Ok(img.into_rgb8())
    }
}
