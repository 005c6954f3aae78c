//! Route aggregation: legs, totals, fuel and arrival time.
//!
//! Every figure is derived from the same matrix the tour was built from.
//! Totals are sums over the legs and nothing else.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{InternalConsistencyError, ResolutionError};
use crate::matrix::{CostEntry, CostMatrix};
use crate::tour::Tour;

const METERS_PER_100_KM: f64 = 100_000.0;

/// One hop of a tour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    pub from: String,
    pub to: String,
    pub distance_meters: u64,
    pub duration_seconds: u64,
}

/// Why a destination is missing from the tour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnresolvedReason {
    Geocoding(ResolutionError),
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedDestination {
    pub id: String,
    pub reason: UnresolvedReason,
}

/// Aggregated figures for a tour, before request context is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRoute {
    pub tour: Tour,
    pub legs: Vec<Leg>,
    pub total_distance_meters: u64,
    pub total_duration_seconds: u64,
    pub fuel_liters: f64,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
}

impl AggregatedRoute {
    pub fn into_result(
        self,
        vehicle_id: impl Into<String>,
        unresolved: Vec<UnresolvedDestination>,
    ) -> RouteResult {
        RouteResult {
            vehicle_id: vehicle_id.into(),
            tour: self.tour,
            legs: self.legs,
            total_distance_meters: self.total_distance_meters,
            total_duration_seconds: self.total_duration_seconds,
            fuel_liters: self.fuel_liters,
            departure_time: self.departure_time,
            arrival_time: self.arrival_time,
            unresolved_destinations: unresolved,
        }
    }
}

/// Final outcome of a successful optimization request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub vehicle_id: String,
    pub tour: Tour,
    pub legs: Vec<Leg>,
    pub total_distance_meters: u64,
    pub total_duration_seconds: u64,
    pub fuel_liters: f64,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub unresolved_destinations: Vec<UnresolvedDestination>,
}

impl RouteResult {
    pub fn unresolved_ids(&self) -> Vec<&str> {
        self.unresolved_destinations
            .iter()
            .map(|unresolved| unresolved.id.as_str())
            .collect()
    }
}

/// Estimated fuel burn for a distance at a fixed consumption rate.
pub fn fuel_liters(distance_meters: u64, rate_liters_per_100km: f64) -> f64 {
    distance_meters as f64 / METERS_PER_100_KM * rate_liters_per_100km
}

/// Sum one figure over all legs, refusing to wrap.
fn checked_total(
    legs: &[Leg],
    quantity: &'static str,
    value: impl Fn(&Leg) -> u64,
) -> Result<u64, InternalConsistencyError> {
    legs.iter()
        .try_fold(0u64, |acc, leg| acc.checked_add(value(leg)))
        .ok_or(InternalConsistencyError::TotalOverflow { quantity })
}

pub fn aggregate(
    tour: Tour,
    matrix: &CostMatrix,
    departure_time: DateTime<Utc>,
    fuel_rate_liters_per_100km: f64,
) -> Result<AggregatedRoute, InternalConsistencyError> {
    if tour.origin().is_none() {
        return Err(InternalConsistencyError::EmptyTour);
    }

    let legs = tour
        .legs()
        .map(|(from, to)| {
            match matrix.entry(from, to) {
                Some(&CostEntry {
                    distance_meters: Some(distance_meters),
                    duration_seconds: Some(duration_seconds),
                    ..
                }) => Ok(Leg {
                    from: from.to_string(),
                    to: to.to_string(),
                    distance_meters,
                    duration_seconds,
                }),
                _ => {
                    tracing::error!(from, to, "tour leg has no matrix entry");
                    Err(InternalConsistencyError::MissingLeg {
                        from: from.to_string(),
                        to: to.to_string(),
                    })
                }
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let total_distance_meters = checked_total(&legs, "distance", |leg| leg.distance_meters)?;
    let total_duration_seconds = checked_total(&legs, "duration", |leg| leg.duration_seconds)?;

    let overflow = InternalConsistencyError::ArrivalOverflow {
        seconds: total_duration_seconds,
    };
    let travel = i64::try_from(total_duration_seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| overflow.clone())?;
    let arrival_time = departure_time.checked_add_signed(travel).ok_or(overflow)?;

    Ok(AggregatedRoute {
        tour,
        legs,
        total_distance_meters,
        total_duration_seconds,
        fuel_liters: fuel_liters(total_distance_meters, fuel_rate_liters_per_100km),
        departure_time,
        arrival_time,
    })
}
