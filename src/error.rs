//! Error taxonomy for route construction.
//!
//! Per-address and per-pair problems are recovered and reported as data;
//! everything here that reaches [`OptimizationError`] ends the request.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to resolve a single address. Recoverable at the batch level.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ResolutionError {
    #[error("address is empty")]
    EmptyAddress,
    #[error("no match for address '{address}'")]
    NotFound { address: String },
    #[error("geocoding provider error: {message}")]
    Provider { message: String },
    #[error("resolution cancelled before it started")]
    Cancelled,
}

/// Whole-request failure of the distance/duration matrix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    #[error("no points supplied")]
    EmptyInput,
    #[error("point '{0}' has no coordinate")]
    UnresolvedPoint(String),
    #[error("point '{0}' appears more than once")]
    DuplicatePoint(String),
    #[error("matrix request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("matrix service returned {code}: {message}")]
    Service { code: String, message: String },
    #[error("malformed matrix response: {0}")]
    Malformed(String),
}

/// A tour leg without a usable matrix entry, or arithmetic that cannot be
/// represented. Always a bug upstream of the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalConsistencyError {
    #[error("tour leg {from} -> {to} has no matrix entry")]
    MissingLeg { from: String, to: String },
    #[error("tour does not start at its origin")]
    EmptyTour,
    #[error("total {quantity} over the tour overflows")]
    TotalOverflow { quantity: &'static str },
    #[error("arrival time overflows after {seconds}s of travel")]
    ArrivalOverflow { seconds: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryError {
    #[error("telemetry provider unavailable: {0}")]
    Unavailable(String),
    #[error("telemetry fix for vehicle '{vehicle_id}' is invalid: {reason}")]
    InvalidFix { vehicle_id: String, reason: String },
}

/// Terminal failure of an optimization request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizationError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("unknown vehicle '{0}'")]
    UnknownVehicle(String),
    #[error("origin of vehicle '{vehicle_id}' could not be resolved: {source}")]
    OriginUnresolved {
        vehicle_id: String,
        source: ResolutionError,
    },
    #[error("no destination could be resolved")]
    NoReachableDestinations,
    #[error("request cancelled")]
    Cancelled,
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    #[error("internal consistency error: {0}")]
    InternalConsistency(#[from] InternalConsistencyError),
}
