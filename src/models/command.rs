use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ground_station::{GroundStation, GroundStationType};
use super::satellite::SatelliteType;

/// Lifecycle state of an uplink command.
///
/// Commands move monotonically along
/// `QUEUED → ACKED → CAPTURING → DOWNLINK_READY`, or drop to `FAILED` from
/// any non-terminal state. The only reverse edge is the operator-triggered
/// rerun, which resets a `FAILED` command back to `QUEUED`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandState {
    Queued,
    Acked,
    Capturing,
    DownlinkReady,
    Failed,
}

impl CommandState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::DownlinkReady | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Background,
    Commercial,
    Urgent,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Commercial
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LookSide {
    Any,
    Left,
    Right,
}

impl Default for LookSide {
    fn default() -> Self {
        Self::Any
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PassDirection {
    Any,
    Ascending,
    Descending,
}

impl Default for PassDirection {
    fn default() -> Self {
        Self::Any
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryMethod {
    Download,
    S3,
    Webhook,
}

impl Default for DeliveryMethod {
    fn default() -> Self {
        Self::Download
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationMode {
    Internal,
    External,
}

impl Default for GenerationMode {
    fn default() -> Self {
        Self::Internal
    }
}

/// External map provider for EXTERNAL generation. OSM is the only
/// supported source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalMapSource {
    Osm,
}

impl Default for ExternalMapSource {
    fn default() -> Self {
        Self::Osm
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AoiCenter {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EoConstraints {
    pub max_cloud_cover_percent: Option<u8>,
    pub max_off_nadir_deg: Option<f64>,
    pub min_sun_elevation_deg: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarConstraints {
    pub incidence_min_deg: Option<f64>,
    pub incidence_max_deg: Option<f64>,
    pub look_side: LookSide,
    pub pass_direction: PassDirection,
    pub polarization: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOptions {
    pub method: DeliveryMethod,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub mode: GenerationMode,
    pub external_map_source: ExternalMapSource,
    pub external_map_zoom: u8,
}

/// Immutable snapshot of the submission request, captured verbatim when the
/// command is created. The ground station is embedded by value so later
/// registry edits cannot change what the command was submitted against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestProfile {
    pub ground_station: Option<GroundStation>,
    pub aoi_center: Option<AoiCenter>,
    /// `[min_lon, min_lat, max_lon, max_lat]`
    pub aoi_bbox: Option<[f64; 4]>,
    pub window_open_utc: Option<String>,
    pub window_close_utc: Option<String>,
    pub priority: TaskPriority,
    pub eo_constraints: EoConstraints,
    pub sar_constraints: SarConstraints,
    pub delivery: DeliveryOptions,
    pub generation: GenerationOptions,
}

/// Acquisition metadata synthesized after a successful capture, keyed by
/// satellite type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AcquisitionMetadata {
    Optical {
        captured_at: DateTime<Utc>,
        sensor_mode: String,
        off_nadir_deg: f64,
        sun_elevation_deg: f64,
        cloud_cover_percent: u8,
        ground_track: String,
        aoi_name: String,
        aoi_center: Option<AoiCenter>,
        aoi_bbox: Option<[f64; 4]>,
        generation_mode: GenerationMode,
    },
    Sar {
        captured_at: DateTime<Utc>,
        sensor_mode: String,
        incidence_angle_deg: f64,
        look_side: String,
        pass_direction: String,
        polarization: String,
        aoi_name: String,
        aoi_center: Option<AoiCenter>,
        aoi_bbox: Option<[f64; 4]>,
        generation_mode: GenerationMode,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductMetadata {
    Optical {
        product_type: String,
        bands: Vec<String>,
        gsd_m: f64,
        width_px: u32,
        height_px: u32,
        bit_depth: u8,
        format: String,
        image_source: GenerationOptions,
    },
    Sar {
        product_type: String,
        resolution_m: f64,
        width_px: u32,
        height_px: u32,
        format: String,
        speckle_filter: String,
        image_source: GenerationOptions,
    },
}

/// The central mutable entity: one imaging request and everything the
/// pipeline has produced for it so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub command_id: String,
    pub satellite_id: String,
    pub mission_name: String,
    pub aoi_name: String,
    pub width: u32,
    pub height: u32,
    pub cloud_percent: u8,
    pub fail_probability: f64,
    pub request_profile: RequestProfile,
    pub state: CommandState,
    pub message: Option<String>,
    pub image_path: Option<PathBuf>,
    pub acquisition_metadata: Option<AcquisitionMetadata>,
    pub product_metadata: Option<ProductMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Command {
    /// Apply a lifecycle transition, refreshing `updated_at`.
    pub fn update_state(&mut self, state: CommandState, message: impl Into<String>) {
        self.state = state;
        self.message = Some(message.into());
        self.updated_at = Utc::now();
    }
}

fn default_aoi_name() -> String {
    "unknown-aoi".to_string()
}

fn default_dimension() -> u32 {
    1024
}

fn default_cloud_percent() -> u8 {
    20
}

fn default_zoom() -> u8 {
    19
}

fn default_fail_probability() -> f64 {
    0.05
}

/// An imaging request as submitted to the uplink endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UplinkRequest {
    pub satellite_id: String,
    pub ground_station_id: Option<String>,
    pub mission_name: String,
    #[serde(default = "default_aoi_name")]
    pub aoi_name: String,
    pub aoi_center_lat: Option<f64>,
    pub aoi_center_lon: Option<f64>,
    /// `[min_lon, min_lat, max_lon, max_lat]`
    pub aoi_bbox: Option<[f64; 4]>,
    pub window_open_utc: Option<String>,
    pub window_close_utc: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(default = "default_cloud_percent")]
    pub cloud_percent: u8,
    pub max_cloud_cover_percent: Option<u8>,
    pub max_off_nadir_deg: Option<f64>,
    pub min_sun_elevation_deg: Option<f64>,
    pub incidence_min_deg: Option<f64>,
    pub incidence_max_deg: Option<f64>,
    #[serde(default)]
    pub look_side: LookSide,
    #[serde(default)]
    pub pass_direction: PassDirection,
    pub polarization: Option<String>,
    #[serde(default)]
    pub delivery_method: DeliveryMethod,
    pub delivery_path: Option<String>,
    #[serde(default)]
    pub generation_mode: GenerationMode,
    #[serde(default)]
    pub external_map_source: ExternalMapSource,
    #[serde(default = "default_zoom")]
    pub external_map_zoom: u8,
    #[serde(default = "default_fail_probability")]
    pub fail_probability: f64,
}

impl UplinkRequest {
    /// Validate the cross-field business rules before a command is created.
    pub fn validate(&self) -> Result<(), String> {
        if self.mission_name.trim().is_empty() {
            return Err("mission_name must not be empty".to_string());
        }
        if !(128..=4096).contains(&self.width) || !(128..=4096).contains(&self.height) {
            return Err("width and height must be within 128..=4096".to_string());
        }
        if self.cloud_percent > 100 {
            return Err("cloud_percent must be within 0..=100".to_string());
        }
        if !(0.0..=1.0).contains(&self.fail_probability) {
            return Err("fail_probability must be within 0.0..=1.0".to_string());
        }
        if !(1..=19).contains(&self.external_map_zoom) {
            return Err("external_map_zoom must be within 1..=19".to_string());
        }

        if self.aoi_center_lat.is_some() != self.aoi_center_lon.is_some() {
            return Err("aoi_center_lat and aoi_center_lon must be provided together".to_string());
        }
        if let (Some(lat), Some(lon)) = (self.aoi_center_lat, self.aoi_center_lon) {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                return Err("aoi_center is out of range".to_string());
            }
        }

        if let Some([min_lon, min_lat, max_lon, max_lat]) = self.aoi_bbox {
            if min_lon >= max_lon || min_lat >= max_lat {
                return Err(
                    "aoi_bbox must be [min_lon, min_lat, max_lon, max_lat] with min < max"
                        .to_string(),
                );
            }
        }

        if let (Some(open), Some(close)) = (&self.window_open_utc, &self.window_close_utc) {
            let open = DateTime::parse_from_rfc3339(open)
                .map_err(|_| "window_open_utc/window_close_utc must be ISO8601".to_string())?;
            let close = DateTime::parse_from_rfc3339(close)
                .map_err(|_| "window_open_utc/window_close_utc must be ISO8601".to_string())?;
            if open >= close {
                return Err("window_open_utc must be earlier than window_close_utc".to_string());
            }
        }

        if let (Some(min), Some(max)) = (self.incidence_min_deg, self.incidence_max_deg) {
            if min > max {
                return Err("incidence_min_deg must be <= incidence_max_deg".to_string());
            }
        }

        if matches!(self.delivery_method, DeliveryMethod::S3 | DeliveryMethod::Webhook)
            && self.delivery_path.is_none()
        {
            return Err("delivery_path is required when delivery_method is S3 or WEBHOOK".to_string());
        }

        if self.generation_mode == GenerationMode::External
            && self.aoi_center_lat.is_none()
            && self.aoi_bbox.is_none()
        {
            return Err("EXTERNAL generation requires aoi_center_lat/lon or aoi_bbox".to_string());
        }

        Ok(())
    }

    /// Freeze this request into the immutable profile stored on the command.
    pub fn to_profile(&self, ground_station: Option<GroundStation>) -> RequestProfile {
        RequestProfile {
            ground_station,
            aoi_center: match (self.aoi_center_lat, self.aoi_center_lon) {
                (Some(lat), Some(lon)) => Some(AoiCenter { lat, lon }),
                _ => None,
            },
            aoi_bbox: self.aoi_bbox,
            window_open_utc: self.window_open_utc.clone(),
            window_close_utc: self.window_close_utc.clone(),
            priority: self.priority,
            eo_constraints: EoConstraints {
                max_cloud_cover_percent: self.max_cloud_cover_percent,
                max_off_nadir_deg: self.max_off_nadir_deg,
                min_sun_elevation_deg: self.min_sun_elevation_deg,
            },
            sar_constraints: SarConstraints {
                incidence_min_deg: self.incidence_min_deg,
                incidence_max_deg: self.incidence_max_deg,
                look_side: self.look_side,
                pass_direction: self.pass_direction,
                polarization: self.polarization.clone(),
            },
            delivery: DeliveryOptions {
                method: self.delivery_method,
                path: self.delivery_path.clone(),
            },
            generation: GenerationOptions {
                mode: self.generation_mode,
                external_map_source: self.external_map_source,
                external_map_zoom: self.external_map_zoom,
            },
        }
    }
}

/// Response returned immediately from the uplink endpoint, before any
/// pipeline stage has run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UplinkResponse {
    pub command_id: String,
    pub state: CommandState,
    pub satellite_id: String,
    pub satellite_type: SatelliteType,
    pub ground_station_id: Option<String>,
    pub ground_station_name: Option<String>,
    pub ground_station_type: Option<GroundStationType>,
    pub mission_name: String,
    pub aoi_name: String,
    pub created_at: DateTime<Utc>,
}

/// Point-in-time snapshot of a command for status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandStatus {
    pub command_id: String,
    pub satellite_id: String,
    pub satellite_type: SatelliteType,
    pub ground_station_id: Option<String>,
    pub ground_station_name: Option<String>,
    pub ground_station_type: Option<GroundStationType>,
    pub mission_name: String,
    pub aoi_name: String,
    pub width: u32,
    pub height: u32,
    pub cloud_percent: u8,
    pub fail_probability: f64,
    pub state: CommandState,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Present only when the command is `DOWNLINK_READY` and the artifact
    /// still exists on disk.
    pub download_url: Option<String>,
    pub request_profile: RequestProfile,
    pub acquisition_metadata: Option<AcquisitionMetadata>,
    pub product_metadata: Option<ProductMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveLocalDownloadResponse {
    pub command_id: String,
    pub saved_path: String,
    pub file_size_bytes: u64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearImagesResponse {
    pub deleted_count: usize,
    pub cleared_command_count: usize,
    pub message: String,
}
