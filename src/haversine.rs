//! Great-circle distance and a haversine matrix estimator.
//!
//! The estimator is a fallback when no routing service is reachable. It
//! ignores the road network, so distances are scaled by a road coefficient
//! and durations assume a constant average speed.

use crate::error::MatrixError;
use crate::traits::{DistanceMatrixProvider, MatrixCell};
use crate::types::{Coordinate, TravelMode};

/// Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Average driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Straight line to road distance.
const DEFAULT_ROAD_COEFFICIENT: f64 = 1.3;

/// Haversine distance between two points in kilometers.
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Haversine-based distance matrix provider.
#[derive(Debug, Clone)]
pub struct HaversineMatrix {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
    /// Multiplier from straight-line to road distance.
    pub road_coefficient: f64,
}

impl Default for HaversineMatrix {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
            road_coefficient: DEFAULT_ROAD_COEFFICIENT,
        }
    }
}

impl HaversineMatrix {
    pub fn new(speed_kmh: f64, road_coefficient: f64) -> Self {
        Self {
            speed_kmh,
            road_coefficient,
        }
    }

    fn road_km(&self, from: Coordinate, to: Coordinate) -> f64 {
        haversine_km(from, to) * self.road_coefficient
    }

    /// Convert distance in km to travel time in seconds.
    fn km_to_seconds(&self, km: f64) -> u64 {
        let hours = km / self.speed_kmh;
        (hours * 3600.0).round() as u64
    }
}

impl DistanceMatrixProvider for HaversineMatrix {
    fn matrix_for(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
        _mode: TravelMode,
    ) -> Result<Vec<Vec<MatrixCell>>, MatrixError> {
        if !(self.speed_kmh.is_finite() && self.speed_kmh > 0.0) {
            return Err(MatrixError::Service {
                code: "InvalidOptions".to_string(),
                message: format!("speed must be positive, got {}", self.speed_kmh),
            });
        }

        let matrix = origins
            .iter()
            .map(|&from| {
                destinations
                    .iter()
                    .map(|&to| {
                        let km = self.road_km(from, to);
                        MatrixCell::ok((km * 1000.0).round() as u64, self.km_to_seconds(km))
                    })
                    .collect()
            })
            .collect();

        Ok(matrix)
    }
}
