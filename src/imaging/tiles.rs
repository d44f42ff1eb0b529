//! External map mosaic synthesis.
//!
//! Fetches a 3×3 grid of Web-Mercator tiles around the requested center
//! from an OSM-compatible tile server, composes them into a mosaic, crops
//! a window centered on the exact coordinate and resamples it to the
//! requested output size.

use std::time::Duration;

use image::imageops::{self, FilterType};
use image::RgbImage;
use reqwest::header::USER_AGENT;

use crate::models::{ExternalMapSource, RequestProfile};

use super::ImagingError;

pub const TILE_SIZE: u32 = 256;
const MOSAIC_SIZE: u32 = TILE_SIZE * 3;
const CROP_HALF: i64 = 256;

/// Latitudes beyond this are clamped before projection; tan/log blow up at
/// the poles.
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

const DEFAULT_TILE_URL: &str = "https://tile.openstreetmap.org";
const TILE_USER_AGENT: &str = "satsim/0.3 (+https://localhost; contact: local-dev)";
const TILE_FETCH_TIMEOUT: Duration = Duration::from_secs(8);

/// Project a latitude/longitude to fractional Web-Mercator tile
/// coordinates at the given zoom level.
pub fn latlon_to_tile(lat: f64, lon: f64, zoom: u8) -> (f64, f64) {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let n = (1u32 << zoom) as f64;
    let x = (lon + 180.0) / 360.0 * n;
    let lat_rad = lat.to_radians();
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0 * n;
    (x, y)
}

/// Resolve the mosaic center from a command's request profile: an explicit
/// AOI center wins, otherwise the bbox midpoint.
pub fn derive_center(profile: &RequestProfile) -> Result<(f64, f64), ImagingError> {
    if let Some(center) = profile.aoi_center {
        return Ok((center.lat, center.lon));
    }
    if let Some([min_lon, min_lat, max_lon, max_lat]) = profile.aoi_bbox {
        return Ok(((min_lat + max_lat) / 2.0, (min_lon + max_lon) / 2.0));
    }
    Err(ImagingError::MissingAoi)
}

/// HTTP client for an OSM-compatible `{zoom}/{x}/{y}.png` tile server.
#[derive(Debug, Clone)]
pub struct TileClient {
    base_url: String,
    client: reqwest::Client,
}

impl TileClient {
    /// Create client from environment, falling back to the public OSM
    /// tile server (`SATSIM_TILE_URL` overrides, e.g. for tests).
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("SATSIM_TILE_URL").unwrap_or_else(|_| DEFAULT_TILE_URL.to_string());
        Self::new(base_url)
    }

    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Fetch one tile. Tile x wraps around the antimeridian; tile y is
    /// clamped to the valid range for the zoom level.
    async fn fetch_tile(&self, zoom: u8, x: i64, y: i64) -> Result<RgbImage, ImagingError> {
        let n = 1i64 << zoom;
        let wrapped_x = x.rem_euclid(n);
        let clamped_y = y.clamp(0, n - 1);
        let url = format!("{}/{}/{}/{}.png", self.base_url, zoom, wrapped_x, clamped_y);

        let bytes = self
            .client
            .get(&url)
            .header(USER_AGENT, TILE_USER_AGENT)
            .timeout(TILE_FETCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        Ok(image::load_from_memory(&bytes)?.to_rgb8())
    }

    /// Build the map image for a center coordinate: 3×3 tile mosaic,
    /// center crop, bilinear resample to `width × height`.
    ///
    /// Any tile fetch or decode failure aborts the whole operation; no
    /// partial mosaic is ever returned.
    pub async fn build_map_image(
        &self,
        center_lat: f64,
        center_lon: f64,
        zoom: u8,
        width: u32,
        height: u32,
        source: ExternalMapSource,
    ) -> Result<RgbImage, ImagingError> {
        // Single supported provider; the match keeps any future variant an
        // explicit decision here rather than a silent fallthrough.
        match source {
            ExternalMapSource::Osm => {}
        }

        let (tile_x_f, tile_y_f) = latlon_to_tile(center_lat, center_lon, zoom);
        let tile_x = tile_x_f.floor() as i64;
        let tile_y = tile_y_f.floor() as i64;

        let mut mosaic = RgbImage::new(MOSAIC_SIZE, MOSAIC_SIZE);
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let tile = self.fetch_tile(zoom, tile_x + dx, tile_y + dy).await?;
                imageops::replace(
                    &mut mosaic,
                    &tile,
                    (dx + 1) * TILE_SIZE as i64,
                    (dy + 1) * TILE_SIZE as i64,
                );
            }
        }

        // Pixel position of the true center inside the mosaic.
        let px = ((tile_x_f - tile_x as f64) * TILE_SIZE as f64) as i64 + TILE_SIZE as i64;
        let py = ((tile_y_f - tile_y as f64) * TILE_SIZE as f64) as i64 + TILE_SIZE as i64;

        let left = (px - CROP_HALF).max(0) as u32;
        let top = (py - CROP_HALF).max(0) as u32;
        let right = ((px + CROP_HALF) as u32).min(MOSAIC_SIZE);
        let bottom = ((py + CROP_HALF) as u32).min(MOSAIC_SIZE);

        let cropped = imageops::crop_imm(&mosaic, left, top, right - left, bottom - top).to_image();
        Ok(imageops::resize(&cropped, width, height, FilterType::Triangle))
    }
}
