//! Image synthesis strategies.
//!
//! Three independent strategies produce the raster for a successful
//! capture: a synthetic optical gradient, a synthetic SAR speckle image,
//! and a real-world map mosaic stitched from external tiles. All three
//! emit exactly the requested `width × height` and are saved as PNG.

pub mod tiles;

use std::io::Cursor;
use std::path::Path;

use image::{GrayImage, ImageFormat, Rgb, RgbImage};
use rand::Rng;
use thiserror::Error;

use crate::models::{Command, GenerationMode, SatelliteType};

use self::tiles::TileClient;

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("external generation requires an AOI center or bbox")]
    MissingAoi,

    #[error("external map tile fetch failed: {0}")]
    TileFetch(#[from] reqwest::Error),

    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Which synthesis strategy a command resolves to. EXTERNAL mode always
/// wins regardless of satellite type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Optical,
    Sar,
    ExternalMap,
}

impl Strategy {
    pub fn select(mode: GenerationMode, satellite_type: SatelliteType) -> Self {
        match (mode, satellite_type) {
            (GenerationMode::External, _) => Self::ExternalMap,
            (GenerationMode::Internal, SatelliteType::EoOptical) => Self::Optical,
            (GenerationMode::Internal, SatelliteType::Sar) => Self::Sar,
        }
    }
}

/// Number of cloud-overlay samples for an optical image.
pub fn cloud_sample_count(width: u32, height: u32, cloud_percent: u8) -> usize {
    ((width as f64 * height as f64) * (cloud_percent as f64 / 100.0) * 0.03) as usize
}

fn random_color<R: Rng>(rng: &mut R) -> [u16; 3] {
    [rng.gen_range(0..=255), rng.gen_range(0..=255), rng.gen_range(0..=255)]
}

/// Synthetic optical strategy: a smooth gradient blended from three random
/// base colors, with near-white pixels sprinkled in proportion to the
/// requested cloud cover.
pub fn generate_optical(width: u32, height: u32, cloud_percent: u8) -> RgbImage {
    let mut rng = rand::thread_rng();
    let mut img = RgbImage::new(width, height);

    let c1 = random_color(&mut rng);
    let c2 = random_color(&mut rng);
    let c3 = random_color(&mut rng);

    let h_span = height.saturating_sub(1).max(1) as f64;
    let w_span = width.saturating_sub(1).max(1) as f64;

    for y in 0..height {
        let t = y as f64 / h_span;
        for x in 0..width {
            let s = x as f64 / w_span;
            let r = ((1.0 - t) * c1[0] as f64 + t * c2[0] as f64 * (0.6 + 0.4 * s)) as i64 % 256;
            let g = ((1.0 - s) * c2[1] as f64 + s * c3[1] as f64 * (0.6 + 0.4 * t)) as i64 % 256;
            let b = ((1.0 - t) * c3[2] as f64 + t * c1[2] as f64 * (0.6 + 0.4 * s)) as i64 % 256;
            img.put_pixel(x, y, Rgb([r as u8, g as u8, b as u8]));
        }
    }

    for _ in 0..cloud_sample_count(width, height, cloud_percent) {
        let x = rng.gen_range(0..width);
        let y = rng.gen_range(0..height);
        let cloud = rng.gen_range(190..=255u8);
        img.put_pixel(x, y, Rgb([cloud, cloud, cloud]));
    }

    img
}

/// Synthetic SAR strategy: grayscale base intensity ramped down the image,
/// with independent uniform speckle noise per pixel.
pub fn generate_sar(width: u32, height: u32) -> GrayImage {
    let mut rng = rand::thread_rng();
    let mut img = GrayImage::new(width, height);

    let h_span = height.saturating_sub(1).max(1) as f64;

    for y in 0..height {
        let base = (70.0 + 185.0 * y as f64 / h_span) as i32;
        for x in 0..width {
            let speckle = rng.gen_range(-45..=45);
            let v = (base + speckle).clamp(0, 255) as u8;
            img.put_pixel(x, y, image::Luma([v]));
        }
    }

    img
}

/// Render the raster for a command and persist it at `output`.
pub async fn render(
    command: &Command,
    satellite_type: SatelliteType,
    tiles: &TileClient,
    output: &Path,
) -> Result<(), ImagingError> {
    let generation = &command.request_profile.generation;
    match Strategy::select(generation.mode, satellite_type) {
        Strategy::Optical => {
            generate_optical(command.width, command.height, command.cloud_percent)
                .save_with_format(output, ImageFormat::Png)?;
        }
        Strategy::Sar => {
            generate_sar(command.width, command.height).save_with_format(output, ImageFormat::Png)?;
        }
        Strategy::ExternalMap => {
            let (lat, lon) = tiles::derive_center(&command.request_profile)?;
            let img = tiles
                .build_map_image(
                    lat,
                    lon,
                    generation.external_map_zoom,
                    command.width,
                    command.height,
                    generation.external_map_source,
                )
                .await?;
            img.save_with_format(output, ImageFormat::Png)?;
        }
    }
    Ok(())
}

/// Encode an image as in-memory PNG bytes (for the stateless preview).
pub fn png_bytes(img: &RgbImage) -> Result<Vec<u8>, ImagingError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}
