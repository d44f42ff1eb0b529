use axum::{extract::State, http::header, response::IntoResponse, routing::get, Router};
use axum_test::TestServer;
use image::{Rgb, RgbImage};

use satsim::api::{create_router, SecurityConfig};
use satsim::imaging::tiles::TileClient;
use satsim::imaging::{self, ImagingError};
use satsim::models::*;
use satsim::pipeline::{self, StageTiming};
use satsim::store::Store;

async fn tile_handler(State(tile): State<Vec<u8>>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], tile)
}

/// Local OSM-shaped tile server answering every `{z}/{x}/{y}.png` with the
/// same solid tile.
async fn spawn_tile_server() -> String {
    let tile = imaging::png_bytes(&RgbImage::from_pixel(256, 256, Rgb([40, 120, 200])))
        .expect("Failed to encode tile");

    let app = Router::new()
        .route("/{zoom}/{x}/{y_png}", get(tile_handler))
        .with_state(tile);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind tile server");
    let addr = listener.local_addr().expect("tile server addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("tile server");
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn mosaic_output_matches_requested_dimensions() {
    let base_url = spawn_tile_server().await;
    let client = TileClient::new(&base_url);

    let img = client
        .build_map_image(37.5665, 126.978, 7, 320, 240, ExternalMapSource::Osm)
        .await
        .expect("mosaic build");
    assert_eq!(img.dimensions(), (320, 240));
}

#[tokio::test]
async fn mosaic_dimensions_hold_at_crop_edges_and_low_zoom() {
    let base_url = spawn_tile_server().await;
    let client = TileClient::new(&base_url);

    // Near-polar center at zoom 1: tile y clamps and the crop window hits
    // the mosaic edge; output size must still be exact.
    let img = client
        .build_map_image(89.9, 0.0, 1, 256, 256, ExternalMapSource::Osm)
        .await
        .expect("mosaic build");
    assert_eq!(img.dimensions(), (256, 256));

    let img = client
        .build_map_image(-89.9, 179.9, 2, 200, 400, ExternalMapSource::Osm)
        .await
        .expect("mosaic build");
    assert_eq!(img.dimensions(), (200, 400));
}

#[tokio::test]
async fn tile_fetch_failure_aborts_the_whole_mosaic() {
    // Nothing listens here; the connection is refused.
    let client = TileClient::new("http://127.0.0.1:1");
    let err = client
        .build_map_image(0.0, 0.0, 3, 128, 128, ExternalMapSource::Osm)
        .await
        .unwrap_err();
    assert!(matches!(err, ImagingError::TileFetch(_)));
}

#[tokio::test]
async fn external_mode_pipeline_produces_map_artifact() {
    let base_url = spawn_tile_server().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Store::new(dir.path().join("images"))
        .expect("store")
        .with_timing(StageTiming::instant())
        .with_tile_base_url(&base_url);

    let sat = store.create_satellite(CreateSatelliteInput {
        name: "EO external".to_string(),
        satellite_type: SatelliteType::EoOptical,
        status: SatelliteStatus::Available,
    });
    let req: UplinkRequest = serde_json::from_value(serde_json::json!({
        "satellite_id": sat.satellite_id,
        "mission_name": "map-mosaic",
        "generation_mode": "EXTERNAL",
        "aoi_center_lat": 37.5665,
        "aoi_center_lon": 126.978,
        "external_map_zoom": 7,
        "width": 256,
        "height": 192,
        "fail_probability": 0.0,
    }))
    .unwrap();
    req.validate().expect("request should validate");
    let (command, _) = store.submit(&req).unwrap();

    pipeline::run(store.clone(), command.command_id.clone()).await;

    let status = store.get_status(&command.command_id).unwrap();
    assert_eq!(status.state, CommandState::DownlinkReady);

    let path = store.download_path(&command.command_id).unwrap();
    let img = image::open(&path).expect("artifact should decode");
    assert_eq!((img.width(), img.height()), (256, 192));
}

#[tokio::test]
async fn preview_endpoint_returns_png_of_requested_size() {
    let base_url = spawn_tile_server().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Store::new(dir.path().join("images"))
        .expect("store")
        .with_tile_base_url(&base_url);
    let server =
        TestServer::new(create_router(store, SecurityConfig::disabled())).expect("test server");

    let response = server
        .get("/api/v1/preview/external-map")
        .add_query_param("lat", 0.0)
        .add_query_param("lon", 0.0)
        .add_query_param("zoom", 3)
        .add_query_param("width", 128)
        .add_query_param("height", 160)
        .await;

    response.assert_status_ok();
    let bytes = response.as_bytes().to_vec();
    let img = image::load_from_memory(&bytes).expect("preview should decode");
    assert_eq!((img.width(), img.height()), (128, 160));
}

#[tokio::test]
async fn preview_rejects_out_of_range_parameters() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Store::new(dir.path().join("images")).expect("store");
    let server =
        TestServer::new(create_router(store, SecurityConfig::disabled())).expect("test server");

    let response = server
        .get("/api/v1/preview/external-map")
        .add_query_param("lat", 0.0)
        .add_query_param("lon", 0.0)
        .add_query_param("zoom", 25)
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);

    let response = server
        .get("/api/v1/preview/external-map")
        .add_query_param("lat", 123.0)
        .add_query_param("lon", 0.0)
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn preview_maps_tile_failure_to_bad_gateway() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Store::new(dir.path().join("images"))
        .expect("store")
        .with_tile_base_url("http://127.0.0.1:1");
    let server =
        TestServer::new(create_router(store, SecurityConfig::disabled())).expect("test server");

    let response = server
        .get("/api/v1/preview/external-map")
        .add_query_param("lat", 0.0)
        .add_query_param("lon", 0.0)
        .add_query_param("zoom", 3)
        .add_query_param("width", 128)
        .add_query_param("height", 128)
        .await;
    response.assert_status(axum::http::StatusCode::BAD_GATEWAY);
}
