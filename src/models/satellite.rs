use serde::{Deserialize, Serialize};

/// Imaging platform class. Determines which synthesis strategy and which
/// metadata shape a successful capture produces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SatelliteType {
    EoOptical,
    Sar,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SatelliteStatus {
    Available,
    Maintenance,
}

impl Default for SatelliteStatus {
    fn default() -> Self {
        Self::Available
    }
}

/// A tasked imaging platform. The type is fixed at creation; name and
/// status can be changed through the registry API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Satellite {
    pub satellite_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub satellite_type: SatelliteType,
    pub status: SatelliteStatus,
}

/// Static platform/orbit characteristics per satellite type. Seeded once
/// as constants and never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct SatelliteTypeProfile {
    pub platform: &'static str,
    pub orbit_type: &'static str,
    pub nominal_altitude_km: u32,
    pub nominal_swath_km: u32,
    pub revisit_hours: u32,
    pub sensor_modes: &'static [&'static str],
    pub default_product_type: &'static str,
    pub default_bands_or_polarization: &'static [&'static str],
}

const EO_OPTICAL_PROFILE: SatelliteTypeProfile = SatelliteTypeProfile {
    platform: "Sun-synchronous LEO",
    orbit_type: "SSO",
    nominal_altitude_km: 500,
    nominal_swath_km: 24,
    revisit_hours: 24,
    sensor_modes: &["NADIR", "OFF_NADIR"],
    default_product_type: "L1B_ORTHOREADY",
    default_bands_or_polarization: &["R", "G", "B", "NIR"],
};

const SAR_PROFILE: SatelliteTypeProfile = SatelliteTypeProfile {
    platform: "Low Earth Orbit radar",
    orbit_type: "LEO",
    nominal_altitude_km: 550,
    nominal_swath_km: 30,
    revisit_hours: 12,
    sensor_modes: &["SPOTLIGHT", "STRIPMAP"],
    default_product_type: "GRD",
    default_bands_or_polarization: &["VV", "VH"],
};

impl SatelliteType {
    pub const ALL: &'static [SatelliteType] = &[SatelliteType::EoOptical, SatelliteType::Sar];

    pub fn profile(self) -> &'static SatelliteTypeProfile {
        match self {
            Self::EoOptical => &EO_OPTICAL_PROFILE,
            Self::Sar => &SAR_PROFILE,
        }
    }
}

/// Input for registering a new satellite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSatelliteInput {
    pub name: String,
    #[serde(rename = "type")]
    pub satellite_type: SatelliteType,
    #[serde(default)]
    pub status: SatelliteStatus,
}

/// Input for updating a satellite. The type is immutable, so only name and
/// status are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSatelliteInput {
    pub name: Option<String>,
    pub status: Option<SatelliteStatus>,
}

/// A satellite together with its static type profile, as returned by the
/// registry endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct SatelliteDetail {
    #[serde(flatten)]
    pub satellite: Satellite,
    pub profile: &'static SatelliteTypeProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSatellitesResponse {
    pub satellite_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satellite_type_serializes_in_wire_casing() {
        assert_eq!(
            serde_json::to_string(&SatelliteType::EoOptical).unwrap(),
            "\"EO_OPTICAL\""
        );
        assert_eq!(serde_json::to_string(&SatelliteType::Sar).unwrap(), "\"SAR\"");
    }

    #[test]
    fn profiles_declare_sensor_modes_for_every_type() {
        for sat_type in SatelliteType::ALL {
            assert!(!sat_type.profile().sensor_modes.is_empty());
            assert!(!sat_type.profile().default_bands_or_polarization.is_empty());
        }
    }
}
