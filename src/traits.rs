//! Collaborator interfaces consumed by the planner.
//!
//! These are intentionally narrow. Concrete apps implement them over their
//! own providers and storage; the planner only ever sees these traits.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MatrixError, ResolutionError, TelemetryError};
use crate::types::{Coordinate, FleetVehicle, TravelMode};

/// Resolves free-text addresses into coordinates.
///
/// Implementations are called concurrently from a worker pool and must not
/// retry internally.
pub trait Geocoder: Send + Sync {
    fn geocode(&self, address: &str) -> Result<Coordinate, ResolutionError>;
}

impl<T: Geocoder + ?Sized> Geocoder for Arc<T> {
    fn geocode(&self, address: &str) -> Result<Coordinate, ResolutionError> {
        (**self).geocode(address)
    }
}

/// Provides a distance/duration grid for a set of origins and destinations.
///
/// The grid is indexed `[origin][destination]` in the order supplied.
pub trait DistanceMatrixProvider: Send + Sync {
    fn matrix_for(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
        mode: TravelMode,
    ) -> Result<Vec<Vec<MatrixCell>>, MatrixError>;
}

impl<T: DistanceMatrixProvider + ?Sized> DistanceMatrixProvider for Arc<T> {
    fn matrix_for(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
        mode: TravelMode,
    ) -> Result<Vec<Vec<MatrixCell>>, MatrixError> {
        (**self).matrix_for(origins, destinations, mode)
    }
}

/// Per-pair status reported by a matrix provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementStatus {
    Ok,
    NotFound,
    ZeroResults,
}

/// One cell of a provider matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixCell {
    pub status: ElementStatus,
    pub distance_meters: Option<u64>,
    pub duration_seconds: Option<u64>,
}

impl MatrixCell {
    pub fn ok(distance_meters: u64, duration_seconds: u64) -> Self {
        Self {
            status: ElementStatus::Ok,
            distance_meters: Some(distance_meters),
            duration_seconds: Some(duration_seconds),
        }
    }

    pub fn unreachable(status: ElementStatus) -> Self {
        Self {
            status,
            distance_meters: None,
            duration_seconds: None,
        }
    }
}

/// A raw position report from a tracking provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFix {
    pub vehicle_id: String,
    pub license_plate: String,
    pub lat: f64,
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
    pub speed_kmh: Option<f64>,
    pub heading_degrees: Option<f64>,
    /// Ignition signal, when the tracker reports one.
    pub engine_on: Option<bool>,
}

/// Read-only access to a vehicle tracking provider.
pub trait TelemetrySource: Send + Sync {
    fn location(&self, vehicle_id: &str) -> Result<Option<TelemetryFix>, TelemetryError>;

    fn active_vehicles(&self) -> Result<Vec<TelemetryFix>, TelemetryError>;
}

/// The surrounding application's vehicle roster.
pub trait VehicleRoster: Send + Sync {
    fn vehicle(&self, vehicle_id: &str) -> Option<FleetVehicle>;
}
