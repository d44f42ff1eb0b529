use std::time::Duration;

use satsim::models::*;
use satsim::pipeline::{self, StageTiming};
use satsim::store::{Store, StoreError};

fn setup() -> (Store, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = Store::new(dir.path().join("images"))
        .expect("Failed to create store")
        .with_timing(StageTiming::instant());
    (store, dir)
}

fn create_satellite(store: &Store, satellite_type: SatelliteType) -> Satellite {
    store.create_satellite(CreateSatelliteInput {
        name: format!("{satellite_type:?} test bird"),
        satellite_type,
        status: SatelliteStatus::Available,
    })
}

fn uplink_request(satellite_id: &str, fail_probability: f64) -> UplinkRequest {
    serde_json::from_value(serde_json::json!({
        "satellite_id": satellite_id,
        "mission_name": "pipeline-test",
        "aoi_name": "test-aoi",
        "width": 128,
        "height": 128,
        "fail_probability": fail_probability,
    }))
    .expect("Failed to build uplink request")
}

async fn wait_terminal(store: &Store, command_id: &str) -> CommandStatus {
    for _ in 0..1000 {
        let status = store.get_status(command_id).expect("command status");
        if status.state.is_terminal() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("command {command_id} never reached a terminal state");
}

#[tokio::test]
async fn missing_satellite_fails_without_visiting_any_stage() {
    let (store, _dir) = setup();
    let sat = create_satellite(&store, SatelliteType::EoOptical);
    let (command, _) = store.submit(&uplink_request(&sat.satellite_id, 0.0)).unwrap();
    store.delete_satellite(&sat.satellite_id).unwrap();

    pipeline::run(store.clone(), command.command_id.clone()).await;

    let command = store.get_command(&command.command_id).unwrap();
    assert_eq!(command.state, CommandState::Failed);
    assert_eq!(command.message.as_deref(), Some("Satellite not found"));
    assert!(command.image_path.is_none());
    assert!(command.acquisition_metadata.is_none());
}

#[tokio::test]
async fn unavailable_satellite_fails_immediately() {
    let (store, _dir) = setup();
    let sat = create_satellite(&store, SatelliteType::EoOptical);
    let (command, _) = store.submit(&uplink_request(&sat.satellite_id, 0.0)).unwrap();
    store
        .update_satellite(
            &sat.satellite_id,
            UpdateSatelliteInput {
                name: None,
                status: Some(SatelliteStatus::Maintenance),
            },
        )
        .unwrap();

    pipeline::run(store.clone(), command.command_id.clone()).await;

    let status = store.get_status(&command.command_id).unwrap();
    assert_eq!(status.state, CommandState::Failed);
    assert_eq!(status.message.as_deref(), Some("Satellite is not available"));
    assert!(status.acquisition_metadata.is_none());
    assert!(status.download_url.is_none());
}

#[tokio::test]
async fn zero_fail_probability_reaches_downlink_ready() {
    let (store, _dir) = setup();
    let sat = create_satellite(&store, SatelliteType::EoOptical);
    let (command, _) = store.submit(&uplink_request(&sat.satellite_id, 0.0)).unwrap();

    pipeline::run(store.clone(), command.command_id.clone()).await;

    let status = store.get_status(&command.command_id).unwrap();
    assert_eq!(status.state, CommandState::DownlinkReady);
    assert_eq!(status.message.as_deref(), Some("Image downlinked and ready"));
    assert!(status.download_url.is_some());
    assert!(status.acquisition_metadata.is_some());
    assert!(status.product_metadata.is_some());

    let path = store.download_path(&command.command_id).unwrap();
    let img = image::open(&path).expect("artifact should be a decodable PNG");
    assert_eq!((img.width(), img.height()), (128, 128));
}

#[tokio::test]
async fn sar_satellite_produces_sar_metadata() {
    let (store, _dir) = setup();
    let sat = create_satellite(&store, SatelliteType::Sar);
    let (command, _) = store.submit(&uplink_request(&sat.satellite_id, 0.0)).unwrap();

    pipeline::run(store.clone(), command.command_id.clone()).await;

    let status = store.get_status(&command.command_id).unwrap();
    assert_eq!(status.state, CommandState::DownlinkReady);
    assert!(matches!(
        status.acquisition_metadata,
        Some(AcquisitionMetadata::Sar { .. })
    ));
    assert!(matches!(
        status.product_metadata,
        Some(ProductMetadata::Sar { .. })
    ));
}

#[tokio::test]
async fn certain_fail_probability_fails_at_transmission() {
    let (store, _dir) = setup();
    let sat = create_satellite(&store, SatelliteType::EoOptical);
    let (command, _) = store.submit(&uplink_request(&sat.satellite_id, 1.0)).unwrap();

    pipeline::run(store.clone(), command.command_id.clone()).await;

    let status = store.get_status(&command.command_id).unwrap();
    assert_eq!(status.state, CommandState::Failed);
    assert_eq!(status.message.as_deref(), Some("Uplink transmission failed"));
    assert!(status.download_url.is_none());
    assert!(store.download_path(&command.command_id).is_err());
}

#[tokio::test]
async fn rerun_is_rejected_while_in_flight_and_after_success() {
    let (store, _dir) = setup();
    let sat = create_satellite(&store, SatelliteType::EoOptical);
    let (command, _) = store.submit(&uplink_request(&sat.satellite_id, 0.0)).unwrap();

    // Still QUEUED: a rerun is a conflict and must not mutate anything.
    assert_eq!(
        store.rerun(&command.command_id).unwrap_err(),
        StoreError::CommandInProgress
    );
    let status = store.get_status(&command.command_id).unwrap();
    assert_eq!(status.state, CommandState::Queued);

    pipeline::run(store.clone(), command.command_id.clone()).await;
    assert_eq!(
        store.rerun(&command.command_id).unwrap_err(),
        StoreError::NotRerunnable
    );
}

#[tokio::test]
async fn rerun_after_failure_resets_and_reevaluates() {
    let (store, _dir) = setup();
    let sat = create_satellite(&store, SatelliteType::EoOptical);
    let (command, _) = store.submit(&uplink_request(&sat.satellite_id, 1.0)).unwrap();

    pipeline::run(store.clone(), command.command_id.clone()).await;
    assert_eq!(
        store.get_status(&command.command_id).unwrap().state,
        CommandState::Failed
    );

    let reset = store.rerun(&command.command_id).unwrap();
    assert_eq!(reset.state, CommandState::Queued);
    assert_eq!(reset.message.as_deref(), Some("Re-run requested by operator"));
    assert!(reset.image_path.is_none());
    assert!(reset.acquisition_metadata.is_none());
    assert!(reset.product_metadata.is_none());

    // Fresh draws, same parameters: probability 1.0 fails again.
    pipeline::run(store.clone(), command.command_id.clone()).await;
    let status = store.get_status(&command.command_id).unwrap();
    assert_eq!(status.state, CommandState::Failed);
    assert_eq!(status.message.as_deref(), Some("Uplink transmission failed"));
}

#[tokio::test]
async fn synthesis_faults_become_failed_not_panics() {
    let (store, _dir) = setup();
    let sat = create_satellite(&store, SatelliteType::EoOptical);

    // EXTERNAL mode with no AOI bypasses request validation by going
    // straight to the store; the pipeline must convert the synthesis error
    // into a FAILED transition.
    let req: UplinkRequest = serde_json::from_value(serde_json::json!({
        "satellite_id": sat.satellite_id,
        "mission_name": "pipeline-test",
        "generation_mode": "EXTERNAL",
        "width": 128,
        "height": 128,
        "fail_probability": 0.0,
    }))
    .unwrap();
    let (command, _) = store.submit(&req).unwrap();

    pipeline::run(store.clone(), command.command_id.clone()).await;

    let status = store.get_status(&command.command_id).unwrap();
    assert_eq!(status.state, CommandState::Failed);
    let message = status.message.unwrap_or_default();
    assert!(
        message.starts_with("Post-capture pipeline failed:"),
        "unexpected message: {message}"
    );
}

#[tokio::test]
async fn concurrent_commands_all_reach_terminal_states() {
    let (store, _dir) = setup();

    let mut command_ids = Vec::new();
    for i in 0..6 {
        let satellite_type = if i % 2 == 0 {
            SatelliteType::EoOptical
        } else {
            SatelliteType::Sar
        };
        let sat = create_satellite(&store, satellite_type);
        let (command, _) = store.submit(&uplink_request(&sat.satellite_id, 0.0)).unwrap();
        pipeline::spawn(store.clone(), command.command_id.clone());
        command_ids.push(command.command_id);
    }

    for id in &command_ids {
        let status = wait_terminal(&store, id).await;
        assert_eq!(status.state, CommandState::DownlinkReady);
        assert_eq!(
            status.download_url.as_deref(),
            Some(format!("/api/v1/downloads/{id}").as_str())
        );
    }

    // Each command owns a distinct artifact.
    let mut paths: Vec<_> = command_ids
        .iter()
        .map(|id| store.download_path(id).unwrap())
        .collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), command_ids.len());
}
