//! Live vehicle telemetry for vehicle selection and display.
//!
//! Read-only view over a tracking provider. Nothing here feeds route costing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;
use crate::haversine::haversine_km;
use crate::traits::{TelemetryFix, TelemetrySource};
use crate::types::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleStatus {
    Moving,
    Stopped,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleTelemetry {
    pub vehicle_id: String,
    pub license_plate: String,
    pub coordinate: Coordinate,
    pub speed_kmh: f64,
    pub heading_degrees: f64,
    pub status: VehicleStatus,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Speeds strictly above this count as moving.
    pub moving_threshold_kmh: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            moving_threshold_kmh: 0.0,
        }
    }
}

/// Great-circle distance in kilometers (haversine, R = 6371 km).
pub fn great_circle_distance_km(a: Coordinate, b: Coordinate) -> f64 {
    haversine_km(a, b)
}

/// Derive the operating status from speed and the ignition signal.
pub fn derive_status(
    speed_kmh: f64,
    engine_on: Option<bool>,
    moving_threshold_kmh: f64,
) -> VehicleStatus {
    if speed_kmh > moving_threshold_kmh {
        VehicleStatus::Moving
    } else if engine_on == Some(true) {
        VehicleStatus::Idle
    } else {
        VehicleStatus::Stopped
    }
}

pub struct TelemetryProvider<S> {
    source: S,
    config: TelemetryConfig,
}

impl<S: TelemetrySource> TelemetryProvider<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, TelemetryConfig::default())
    }

    pub fn with_config(source: S, config: TelemetryConfig) -> Self {
        Self { source, config }
    }

    pub fn current_location(
        &self,
        vehicle_id: &str,
    ) -> Result<Option<VehicleTelemetry>, TelemetryError> {
        self.source
            .location(vehicle_id)?
            .map(|fix| self.to_telemetry(fix))
            .transpose()
    }

    /// All vehicles the provider currently reports. Invalid fixes are skipped.
    pub fn active_vehicles(&self) -> Result<Vec<VehicleTelemetry>, TelemetryError> {
        let fixes = self.source.active_vehicles()?;
        Ok(fixes
            .into_iter()
            .filter_map(|fix| match self.to_telemetry(fix) {
                Ok(telemetry) => Some(telemetry),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping telemetry fix");
                    None
                }
            })
            .collect())
    }

    /// Active vehicles with their distance to `target`, nearest first.
    pub fn vehicles_by_proximity(
        &self,
        target: Coordinate,
    ) -> Result<Vec<(VehicleTelemetry, f64)>, TelemetryError> {
        let mut ranked: Vec<(VehicleTelemetry, f64)> = self
            .active_vehicles()?
            .into_iter()
            .map(|telemetry| {
                let distance = great_circle_distance_km(telemetry.coordinate, target);
                (telemetry, distance)
            })
            .collect();

        ranked.sort_by(|a, b| {
            a.1.total_cmp(&b.1)
                .then_with(|| a.0.vehicle_id.cmp(&b.0.vehicle_id))
        });
        Ok(ranked)
    }

    fn to_telemetry(&self, fix: TelemetryFix) -> Result<VehicleTelemetry, TelemetryError> {
        let coordinate = Coordinate::new(fix.lat, fix.lng);
        if !coordinate.is_valid() {
            return Err(TelemetryError::InvalidFix {
                vehicle_id: fix.vehicle_id,
                reason: format!("coordinate ({}, {}) out of range", fix.lat, fix.lng),
            });
        }

        let speed_kmh = fix.speed_kmh.filter(|speed| speed.is_finite()).unwrap_or(0.0).max(0.0);
        let heading_degrees = fix
            .heading_degrees
            .filter(|heading| heading.is_finite())
            .map_or(0.0, |heading| heading.rem_euclid(360.0));

        Ok(VehicleTelemetry {
            status: derive_status(speed_kmh, fix.engine_on, self.config.moving_threshold_kmh),
            vehicle_id: fix.vehicle_id,
            license_plate: fix.license_plate,
            coordinate,
            speed_kmh,
            heading_degrees,
            observed_at: fix.timestamp,
        })
    }
}
