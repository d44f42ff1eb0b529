use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::imaging;
use crate::models::*;
use crate::pipeline;
use crate::store::{Store, StoreError};

// ============================================================
// Error Handling
// ============================================================

/// Map a store error onto the HTTP contract: missing entities are 404,
/// lifecycle conflicts are 409.
fn store_error(e: StoreError) -> (StatusCode, String) {
    let status = match e {
        StoreError::SatelliteNotFound
        | StoreError::GroundStationNotFound
        | StoreError::CommandNotFound => StatusCode::NOT_FOUND,
        StoreError::GroundStationNotOperational
        | StoreError::CommandInProgress
        | StoreError::NotRerunnable
        | StoreError::ImageNotReady => StatusCode::CONFLICT,
    };
    (status, e.to_string())
}

fn bad_request(msg: String) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg)
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Satellite registry
// ============================================================

pub async fn create_satellite(
    State(store): State<Store>,
    Json(input): Json<CreateSatelliteInput>,
) -> (StatusCode, Json<Satellite>) {
    (StatusCode::CREATED, Json(store.create_satellite(input)))
}

pub async fn list_satellites(State(store): State<Store>) -> Json<Vec<SatelliteDetail>> {
    Json(store.list_satellites())
}

pub async fn update_satellite(
    State(store): State<Store>,
    Path(id): Path<String>,
    Json(input): Json<UpdateSatelliteInput>,
) -> Result<Json<SatelliteDetail>, (StatusCode, String)> {
    store.update_satellite(&id, input).map(Json).map_err(store_error)
}

pub async fn delete_satellite(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    store.delete_satellite(&id).map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_satellite_types(
) -> Json<BTreeMap<SatelliteType, &'static SatelliteTypeProfile>> {
    Json(
        SatelliteType::ALL
            .iter()
            .map(|t| (*t, t.profile()))
            .collect(),
    )
}

pub async fn seed_satellites(State(store): State<Store>) -> Json<SeedSatellitesResponse> {
    Json(SeedSatellitesResponse {
        satellite_ids: store.seed_satellites(),
    })
}

// ============================================================
// Ground station registry
// ============================================================

pub async fn create_ground_station(
    State(store): State<Store>,
    Json(input): Json<CreateGroundStationInput>,
) -> (StatusCode, Json<GroundStation>) {
    (StatusCode::CREATED, Json(store.create_ground_station(input)))
}

pub async fn list_ground_stations(State(store): State<Store>) -> Json<Vec<GroundStation>> {
    Json(store.list_ground_stations())
}

pub async fn update_ground_station(
    State(store): State<Store>,
    Path(id): Path<String>,
    Json(input): Json<UpdateGroundStationInput>,
) -> Result<Json<GroundStation>, (StatusCode, String)> {
    store
        .update_ground_station(&id, input)
        .map(Json)
        .map_err(store_error)
}

pub async fn delete_ground_station(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    store.delete_ground_station(&id).map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn seed_ground_stations(State(store): State<Store>) -> Json<SeedGroundStationsResponse> {
    Json(SeedGroundStationsResponse {
        ground_station_ids: store.seed_ground_stations(),
    })
}

// ============================================================
// Command lifecycle
// ============================================================

/// Submit an imaging request. The command is created in `QUEUED` and one
/// pipeline execution is spawned; the response returns before any stage
/// has run. Satellite availability is checked by the pipeline itself.
pub async fn uplink_command(
    State(store): State<Store>,
    Json(req): Json<UplinkRequest>,
) -> Result<(StatusCode, Json<UplinkResponse>), (StatusCode, String)> {
    req.validate().map_err(bad_request)?;

    let (command, satellite_type) = store.submit(&req).map_err(store_error)?;
    pipeline::spawn(store, command.command_id.clone());

    let station = command.request_profile.ground_station.as_ref();
    Ok((
        StatusCode::CREATED,
        Json(UplinkResponse {
            command_id: command.command_id.clone(),
            state: command.state,
            satellite_id: command.satellite_id.clone(),
            satellite_type,
            ground_station_id: station.map(|s| s.ground_station_id.clone()),
            ground_station_name: station.map(|s| s.name.clone()),
            ground_station_type: station.map(|s| s.station_type),
            mission_name: command.mission_name.clone(),
            aoi_name: command.aoi_name.clone(),
            created_at: command.created_at,
        }),
    ))
}

pub async fn list_commands(
    State(store): State<Store>,
) -> Result<Json<Vec<CommandStatus>>, (StatusCode, String)> {
    store.list_statuses().map(Json).map_err(store_error)
}

pub async fn get_command(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> Result<Json<CommandStatus>, (StatusCode, String)> {
    store.get_status(&id).map(Json).map_err(store_error)
}

/// Rerun a `FAILED` command: clears the previous artifact and metadata,
/// resets to `QUEUED` and spawns a fresh pipeline execution.
pub async fn rerun_command(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> Result<Json<CommandStatus>, (StatusCode, String)> {
    store.rerun(&id).map_err(store_error)?;
    pipeline::spawn(store.clone(), id.clone());
    store.get_status(&id).map(Json).map_err(store_error)
}

// ============================================================
// Artifacts
// ============================================================

pub async fn download_image(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let path = store.download_path(&id).map_err(store_error)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| (StatusCode::NOT_FOUND, "Image file not found".to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{id}.png\""),
            ),
        ],
        bytes,
    ))
}

pub async fn save_local_download(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> Result<Json<SaveLocalDownloadResponse>, (StatusCode, String)> {
    let path = store.download_path(&id).map_err(store_error)?;
    let meta = tokio::fs::metadata(&path)
        .await
        .map_err(|_| (StatusCode::NOT_FOUND, "Image file not found".to_string()))?;

    Ok(Json(SaveLocalDownloadResponse {
        command_id: id,
        saved_path: path.display().to_string(),
        file_size_bytes: meta.len(),
        message: "Image is saved in the local images directory".to_string(),
    }))
}

pub async fn clear_images(State(store): State<Store>) -> Json<ClearImagesResponse> {
    Json(store.clear_images())
}

// ============================================================
// Stateless external-map preview
// ============================================================

fn default_preview_zoom() -> u8 {
    19
}

fn default_preview_dimension() -> u32 {
    768
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub lat: f64,
    pub lon: f64,
    #[serde(default = "default_preview_zoom")]
    pub zoom: u8,
    #[serde(default = "default_preview_dimension")]
    pub width: u32,
    #[serde(default = "default_preview_dimension")]
    pub height: u32,
    #[serde(default)]
    pub source: ExternalMapSource,
}

/// Build a map mosaic for arbitrary coordinates, independent of any
/// command.
pub async fn preview_external_map(
    State(store): State<Store>,
    Query(query): Query<PreviewQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !(-90.0..=90.0).contains(&query.lat) || !(-180.0..=180.0).contains(&query.lon) {
        return Err(bad_request("lat/lon out of range".to_string()));
    }
    if !(1..=19).contains(&query.zoom) {
        return Err(bad_request("zoom must be within 1..=19".to_string()));
    }
    if !(128..=4096).contains(&query.width) || !(128..=4096).contains(&query.height) {
        return Err(bad_request("width and height must be within 128..=4096".to_string()));
    }

    let image = store
        .tiles()
        .build_map_image(
            query.lat,
            query.lon,
            query.zoom,
            query.width,
            query.height,
            query.source,
        )
        .await
        .map_err(|e| {
            (
                StatusCode::BAD_GATEWAY,
                format!("External map preview failed: {e}"),
            )
        })?;

    let bytes = imaging::png_bytes(&image).map_err(|e| {
        (
            StatusCode::BAD_GATEWAY,
            format!("External map preview failed: {e}"),
        )
    })?;

    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}
