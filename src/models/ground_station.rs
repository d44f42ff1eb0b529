use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroundStationType {
    Fixed,
    LandMobile,
    Maritime,
    Airborne,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroundStationStatus {
    Operational,
    Maintenance,
}

impl Default for GroundStationStatus {
    fn default() -> Self {
        Self::Operational
    }
}

/// A receiving station. Commands may optionally be bound to one at
/// submission time; the binding is a snapshot, so later edits to the
/// station do not affect in-flight commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundStation {
    pub ground_station_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub station_type: GroundStationType,
    pub status: GroundStationStatus,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroundStationInput {
    pub name: String,
    #[serde(rename = "type")]
    pub station_type: GroundStationType,
    #[serde(default)]
    pub status: GroundStationStatus,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateGroundStationInput {
    pub name: Option<String>,
    pub status: Option<GroundStationStatus>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedGroundStationsResponse {
    pub ground_station_ids: Vec<String>,
}
