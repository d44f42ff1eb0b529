//! Acquisition and product metadata synthesis.
//!
//! Pure function of the satellite type, the command parameters, a fresh
//! capture timestamp and independent random draws. A rerun produces fresh
//! values, never cached ones.

use chrono::Utc;
use rand::Rng;

use crate::models::{AcquisitionMetadata, Command, ProductMetadata, SatelliteType};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn pick<'a, R: Rng>(rng: &mut R, options: &[&'a str]) -> &'a str {
    options[rng.gen_range(0..options.len())]
}

pub fn build(satellite_type: SatelliteType, command: &Command) -> (AcquisitionMetadata, ProductMetadata) {
    let mut rng = rand::thread_rng();
    let profile = satellite_type.profile();
    let captured_at = Utc::now();
    let generation = command.request_profile.generation.clone();

    match satellite_type {
        SatelliteType::EoOptical => {
            let acquisition = AcquisitionMetadata::Optical {
                captured_at,
                sensor_mode: pick(&mut rng, profile.sensor_modes).to_string(),
                off_nadir_deg: round2(rng.gen_range(2.0..=28.0)),
                sun_elevation_deg: round2(rng.gen_range(20.0..=65.0)),
                cloud_cover_percent: command.cloud_percent,
                ground_track: pick(&mut rng, &["ASCENDING", "DESCENDING"]).to_string(),
                aoi_name: command.aoi_name.clone(),
                aoi_center: command.request_profile.aoi_center,
                aoi_bbox: command.request_profile.aoi_bbox,
                generation_mode: generation.mode,
            };
            let product = ProductMetadata::Optical {
                product_type: profile.default_product_type.to_string(),
                bands: profile
                    .default_bands_or_polarization
                    .iter()
                    .map(|b| b.to_string())
                    .collect(),
                gsd_m: round2(rng.gen_range(0.5..=1.5)),
                width_px: command.width,
                height_px: command.height,
                bit_depth: 8,
                format: "PNG".to_string(),
                image_source: generation,
            };
            (acquisition, product)
        }
        SatelliteType::Sar => {
            let acquisition = AcquisitionMetadata::Sar {
                captured_at,
                sensor_mode: pick(&mut rng, profile.sensor_modes).to_string(),
                incidence_angle_deg: round2(rng.gen_range(20.0..=45.0)),
                look_side: pick(&mut rng, &["LEFT", "RIGHT"]).to_string(),
                pass_direction: pick(&mut rng, &["ASCENDING", "DESCENDING"]).to_string(),
                polarization: pick(&mut rng, profile.default_bands_or_polarization).to_string(),
                aoi_name: command.aoi_name.clone(),
                aoi_center: command.request_profile.aoi_center,
                aoi_bbox: command.request_profile.aoi_bbox,
                generation_mode: generation.mode,
            };
            let product = ProductMetadata::Sar {
                product_type: profile.default_product_type.to_string(),
                resolution_m: round2(rng.gen_range(0.8..=3.0)),
                width_px: command.width,
                height_px: command.height,
                format: "PNG".to_string(),
                speckle_filter: pick(&mut rng, &["NONE", "LEE_3x3"]).to_string(),
                image_source: generation,
            };
            (acquisition, product)
        }
    }
}
