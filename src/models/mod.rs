//! Domain models for the satellite tasking simulator.
//!
//! # Core Concepts
//!
//! ## Registry entities
//!
//! - [`Satellite`]: an imaging platform, referenced by id from commands.
//! - [`GroundStation`]: a receiving station, snapshotted into commands.
//! - [`SatelliteTypeProfile`]: static per-type platform characteristics.
//!
//! ## Lifecycle entities
//!
//! - [`Command`]: one imaging request, driven by the pipeline through the
//!   `QUEUED → ACKED → CAPTURING → DOWNLINK_READY | FAILED` state machine.
//! - [`RequestProfile`]: the immutable submission snapshot on a command.
//! - [`AcquisitionMetadata`] / [`ProductMetadata`]: synthesized per capture.

mod command;
mod ground_station;
mod satellite;

pub use command::*;
pub use ground_station::*;
pub use satellite::*;
