//! Shared state for the simulator.
//!
//! [`Store`] is the single source of truth for satellites, ground stations
//! and commands. All three collections live behind one mutex; every method
//! takes the lock internally and holds it only for the duration of the
//! read or mutation, never across a sleep or I/O-bound pipeline stage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::imaging::tiles::TileClient;
use crate::models::*;
use crate::pipeline::StageTiming;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Satellite not found")]
    SatelliteNotFound,
    #[error("Ground station not found")]
    GroundStationNotFound,
    #[error("Ground station is not operational")]
    GroundStationNotOperational,
    #[error("Command not found")]
    CommandNotFound,
    #[error("Command is already in progress")]
    CommandInProgress,
    #[error("Only FAILED commands can be rerun")]
    NotRerunnable,
    #[error("Image is not ready")]
    ImageNotReady,
}

#[derive(Default)]
struct Registry {
    satellites: HashMap<String, Satellite>,
    ground_stations: HashMap<String, GroundStation>,
    commands: HashMap<String, Command>,
}

/// Cloneable handle over the simulator's shared state plus the resources
/// pipeline executions need (artifact directory, tile client, stage
/// timing). Constructed explicitly and passed around; there are no
/// process-wide singletons.
#[derive(Clone)]
pub struct Store {
    registry: Arc<Mutex<Registry>>,
    image_dir: Arc<PathBuf>,
    tiles: TileClient,
    timing: StageTiming,
}

fn short_id(prefix: &str, len: usize) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &hex[..len])
}

impl Store {
    pub fn new(image_dir: impl Into<PathBuf>) -> Result<Self> {
        let image_dir = image_dir.into();
        std::fs::create_dir_all(&image_dir)?;
        Ok(Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            image_dir: Arc::new(image_dir),
            tiles: TileClient::from_env(),
            timing: StageTiming::default(),
        })
    }

    /// Store backed by the platform data directory (or `SATSIM_DATA_DIR`).
    pub fn open_default() -> Result<Self> {
        if let Ok(dir) = std::env::var("SATSIM_DATA_DIR") {
            return Self::new(PathBuf::from(dir).join("images"));
        }
        let dirs = directories::ProjectDirs::from("", "", "satsim")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Self::new(dirs.data_dir().join("images"))
    }

    /// Override stage timing (tests run the pipeline instantly).
    pub fn with_timing(mut self, timing: StageTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Point external-map synthesis at a different tile server.
    pub fn with_tile_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.tiles = TileClient::new(base_url);
        self
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    pub fn tiles(&self) -> &TileClient {
        &self.tiles
    }

    pub fn timing(&self) -> StageTiming {
        self.timing
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().expect("store lock poisoned")
    }

    // ============================================================
    // Satellite registry
    // ============================================================

    pub fn create_satellite(&self, input: CreateSatelliteInput) -> Satellite {
        let sat = Satellite {
            satellite_id: short_id("sat", 8),
            name: input.name,
            satellite_type: input.satellite_type,
            status: input.status,
        };
        self.lock()
            .satellites
            .insert(sat.satellite_id.clone(), sat.clone());
        sat
    }

    pub fn list_satellites(&self) -> Vec<SatelliteDetail> {
        self.lock()
            .satellites
            .values()
            .map(|sat| SatelliteDetail {
                profile: sat.satellite_type.profile(),
                satellite: sat.clone(),
            })
            .collect()
    }

    pub fn update_satellite(
        &self,
        id: &str,
        input: UpdateSatelliteInput,
    ) -> Result<SatelliteDetail, StoreError> {
        let mut registry = self.lock();
        let sat = registry
            .satellites
            .get_mut(id)
            .ok_or(StoreError::SatelliteNotFound)?;
        if let Some(name) = input.name {
            sat.name = name;
        }
        if let Some(status) = input.status {
            sat.status = status;
        }
        Ok(SatelliteDetail {
            profile: sat.satellite_type.profile(),
            satellite: sat.clone(),
        })
    }

    pub fn delete_satellite(&self, id: &str) -> Result<Satellite, StoreError> {
        self.lock()
            .satellites
            .remove(id)
            .ok_or(StoreError::SatelliteNotFound)
    }

    /// Seed the well-known demo fleet, skipping names that already exist.
    pub fn seed_satellites(&self) -> Vec<String> {
        let presets = [
            ("KOMPSAT-3 (Arirang-3)", SatelliteType::EoOptical),
            ("KOMPSAT-3A (Arirang-3A)", SatelliteType::EoOptical),
            ("CAS500-1 (NextSat-1)", SatelliteType::EoOptical),
            ("Cheollian-2B (GEO-KOMPSAT-2B)", SatelliteType::EoOptical),
            ("KOMPSAT-5 (Arirang-5, SAR)", SatelliteType::Sar),
            ("KOMPSAT-6 (Arirang-6, SAR)", SatelliteType::Sar),
            ("KOMPSAT-Next-5 (C-band SAR)", SatelliteType::Sar),
        ];

        let mut registry = self.lock();
        let mut seeded = Vec::new();
        for (name, satellite_type) in presets {
            if registry.satellites.values().any(|s| s.name == name) {
                continue;
            }
            let sat = Satellite {
                satellite_id: short_id("sat", 8),
                name: name.to_string(),
                satellite_type,
                status: SatelliteStatus::Available,
            };
            seeded.push(sat.satellite_id.clone());
            registry.satellites.insert(sat.satellite_id.clone(), sat);
        }
        seeded
    }

    // ============================================================
    // Ground station registry
    // ============================================================

    pub fn create_ground_station(&self, input: CreateGroundStationInput) -> GroundStation {
        let station = GroundStation {
            ground_station_id: short_id("gnd", 8),
            name: input.name,
            station_type: input.station_type,
            status: input.status,
            location: input.location,
        };
        self.lock()
            .ground_stations
            .insert(station.ground_station_id.clone(), station.clone());
        station
    }

    pub fn list_ground_stations(&self) -> Vec<GroundStation> {
        self.lock().ground_stations.values().cloned().collect()
    }

    pub fn update_ground_station(
        &self,
        id: &str,
        input: UpdateGroundStationInput,
    ) -> Result<GroundStation, StoreError> {
        let mut registry = self.lock();
        let station = registry
            .ground_stations
            .get_mut(id)
            .ok_or(StoreError::GroundStationNotFound)?;
        if let Some(name) = input.name {
            station.name = name;
        }
        if let Some(status) = input.status {
            station.status = status;
        }
        if let Some(location) = input.location {
            station.location = Some(location);
        }
        Ok(station.clone())
    }

    pub fn delete_ground_station(&self, id: &str) -> Result<GroundStation, StoreError> {
        self.lock()
            .ground_stations
            .remove(id)
            .ok_or(StoreError::GroundStationNotFound)
    }

    pub fn seed_ground_stations(&self) -> Vec<String> {
        let presets = [
            (
                "Daejeon Mission Control Ground Station",
                GroundStationType::Fixed,
                "Daejeon",
            ),
            (
                "Jeju Maritime Satellite Ground Station",
                GroundStationType::Maritime,
                "Jeju",
            ),
            (
                "Incheon Airborne Relay Ground Station",
                GroundStationType::Airborne,
                "Incheon",
            ),
        ];

        let mut registry = self.lock();
        let mut seeded = Vec::new();
        for (name, station_type, location) in presets {
            if registry.ground_stations.values().any(|s| s.name == name) {
                continue;
            }
            let station = GroundStation {
                ground_station_id: short_id("gnd", 8),
                name: name.to_string(),
                station_type,
                status: GroundStationStatus::Operational,
                location: Some(location.to_string()),
            };
            seeded.push(station.ground_station_id.clone());
            registry
                .ground_stations
                .insert(station.ground_station_id.clone(), station);
        }
        seeded
    }

    // ============================================================
    // Command submission and status
    // ============================================================

    /// Create a command in `QUEUED` from a validated uplink request.
    ///
    /// The satellite must exist (its availability is checked again by the
    /// pipeline entry contract); a referenced ground station must exist
    /// and be operational, and is snapshotted into the request profile.
    pub fn submit(&self, req: &UplinkRequest) -> Result<(Command, SatelliteType), StoreError> {
        let mut registry = self.lock();

        let satellite_type = registry
            .satellites
            .get(&req.satellite_id)
            .map(|s| s.satellite_type)
            .ok_or(StoreError::SatelliteNotFound)?;

        let station = match &req.ground_station_id {
            Some(id) => {
                let station = registry
                    .ground_stations
                    .get(id)
                    .ok_or(StoreError::GroundStationNotFound)?;
                if station.status != GroundStationStatus::Operational {
                    return Err(StoreError::GroundStationNotOperational);
                }
                Some(station.clone())
            }
            None => None,
        };

        let now = Utc::now();
        let command = Command {
            command_id: short_id("cmd", 12),
            satellite_id: req.satellite_id.clone(),
            mission_name: req.mission_name.clone(),
            aoi_name: req.aoi_name.clone(),
            width: req.width,
            height: req.height,
            cloud_percent: req.cloud_percent,
            fail_probability: req.fail_probability,
            request_profile: req.to_profile(station),
            state: CommandState::Queued,
            message: None,
            image_path: None,
            acquisition_metadata: None,
            product_metadata: None,
            created_at: now,
            updated_at: now,
        };
        registry
            .commands
            .insert(command.command_id.clone(), command.clone());
        Ok((command, satellite_type))
    }

    fn status_of(registry: &Registry, command: &Command) -> Result<CommandStatus, StoreError> {
        let satellite = registry
            .satellites
            .get(&command.satellite_id)
            .ok_or(StoreError::SatelliteNotFound)?;

        let station = command.request_profile.ground_station.as_ref();
        let has_file = command
            .image_path
            .as_ref()
            .map(|p| p.exists())
            .unwrap_or(false);
        let download_url = if command.state == CommandState::DownlinkReady && has_file {
            Some(format!("/api/v1/downloads/{}", command.command_id))
        } else {
            None
        };

        Ok(CommandStatus {
            command_id: command.command_id.clone(),
            satellite_id: command.satellite_id.clone(),
            satellite_type: satellite.satellite_type,
            ground_station_id: station.map(|s| s.ground_station_id.clone()),
            ground_station_name: station.map(|s| s.name.clone()),
            ground_station_type: station.map(|s| s.station_type),
            mission_name: command.mission_name.clone(),
            aoi_name: command.aoi_name.clone(),
            width: command.width,
            height: command.height,
            cloud_percent: command.cloud_percent,
            fail_probability: command.fail_probability,
            state: command.state,
            message: command.message.clone(),
            created_at: command.created_at,
            updated_at: command.updated_at,
            download_url,
            request_profile: command.request_profile.clone(),
            acquisition_metadata: command.acquisition_metadata.clone(),
            product_metadata: command.product_metadata.clone(),
        })
    }

    /// Raw command snapshot, independent of satellite registry state.
    pub fn get_command(&self, command_id: &str) -> Option<Command> {
        self.lock().commands.get(command_id).cloned()
    }

    pub fn get_status(&self, command_id: &str) -> Result<CommandStatus, StoreError> {
        let registry = self.lock();
        let command = registry
            .commands
            .get(command_id)
            .ok_or(StoreError::CommandNotFound)?;
        Self::status_of(&registry, command)
    }

    pub fn list_statuses(&self) -> Result<Vec<CommandStatus>, StoreError> {
        let registry = self.lock();
        registry
            .commands
            .values()
            .map(|command| Self::status_of(&registry, command))
            .collect()
    }

    /// Reset a `FAILED` command back to `QUEUED`, discarding the previous
    /// artifact and metadata. Any non-terminal command is a conflict.
    pub fn rerun(&self, command_id: &str) -> Result<Command, StoreError> {
        let mut registry = self.lock();
        let command = registry
            .commands
            .get_mut(command_id)
            .ok_or(StoreError::CommandNotFound)?;

        match command.state {
            CommandState::Queued | CommandState::Acked | CommandState::Capturing => {
                return Err(StoreError::CommandInProgress);
            }
            CommandState::DownlinkReady => return Err(StoreError::NotRerunnable),
            CommandState::Failed => {}
        }

        if let Some(path) = command.image_path.take() {
            let _ = std::fs::remove_file(path);
        }
        command.acquisition_metadata = None;
        command.product_metadata = None;
        command.update_state(CommandState::Queued, "Re-run requested by operator");
        Ok(command.clone())
    }

    /// Resolve the artifact path for a download request.
    pub fn download_path(&self, command_id: &str) -> Result<PathBuf, StoreError> {
        let registry = self.lock();
        let command = registry
            .commands
            .get(command_id)
            .ok_or(StoreError::CommandNotFound)?;
        if command.state != CommandState::DownlinkReady {
            return Err(StoreError::ImageNotReady);
        }
        command
            .image_path
            .clone()
            .ok_or(StoreError::ImageNotReady)
    }

    /// Delete every artifact on disk and null the image reference on all
    /// commands. Lifecycle state is left untouched.
    pub fn clear_images(&self) -> ClearImagesResponse {
        let mut deleted_count = 0;
        if let Ok(entries) = std::fs::read_dir(self.image_dir()) {
            for entry in entries.flatten() {
                let path = entry.path();
                let is_image = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| matches!(e, "png" | "jpg" | "jpeg" | "webp"))
                    .unwrap_or(false);
                if is_image && std::fs::remove_file(&path).is_ok() {
                    deleted_count += 1;
                }
            }
        }

        let mut cleared_command_count = 0;
        let mut registry = self.lock();
        for command in registry.commands.values_mut() {
            if command.image_path.take().is_some() {
                command.message = Some("Image cleared by operator".to_string());
                command.updated_at = Utc::now();
                cleared_command_count += 1;
            }
        }

        ClearImagesResponse {
            deleted_count,
            cleared_command_count,
            message: "All generated sample images were cleared".to_string(),
        }
    }

    // ============================================================
    // Pipeline-facing transitions
    // ============================================================

    /// Pipeline entry contract: check the owning satellite and either fail
    /// the command immediately (precondition fault, no stage delay) or put
    /// it in `QUEUED` awaiting the contact window.
    ///
    /// Returns the command snapshot and satellite type when the pipeline
    /// should proceed.
    pub fn begin_pipeline(&self, command_id: &str) -> Option<(Command, SatelliteType)> {
        let mut registry = self.lock();

        let satellite = registry
            .commands
            .get(command_id)
            .and_then(|c| registry.satellites.get(&c.satellite_id))
            .map(|s| (s.satellite_type, s.status));

        let command = registry.commands.get_mut(command_id)?;
        match satellite {
            None => {
                command.update_state(CommandState::Failed, "Satellite not found");
                None
            }
            Some((_, status)) if status != SatelliteStatus::Available => {
                command.update_state(CommandState::Failed, "Satellite is not available");
                None
            }
            Some((satellite_type, _)) => {
                command.update_state(CommandState::Queued, "Queued for next contact window");
                Some((command.clone(), satellite_type))
            }
        }
    }

    /// Apply a single lifecycle transition under the lock.
    pub fn transition(&self, command_id: &str, state: CommandState, message: &str) {
        if let Some(command) = self.lock().commands.get_mut(command_id) {
            tracing::debug!(command_id, ?state, message, "command transition");
            command.update_state(state, message);
        }
    }

    /// Finalize a successful capture: artifact path, metadata, and the
    /// terminal `DOWNLINK_READY` transition in one critical section.
    pub fn complete(
        &self,
        command_id: &str,
        image_path: PathBuf,
        acquisition: AcquisitionMetadata,
        product: ProductMetadata,
    ) {
        if let Some(command) = self.lock().commands.get_mut(command_id) {
            command.image_path = Some(image_path);
            command.acquisition_metadata = Some(acquisition);
            command.product_metadata = Some(product);
            command.update_state(CommandState::DownlinkReady, "Image downlinked and ready");
        }
    }
}
