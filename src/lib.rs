//! delivery-planner core
//!
//! Multi-stop delivery route construction: geocode destinations, price every
//! pair, build a nearest-neighbor tour and aggregate it into a route.

pub mod types;
pub mod error;
pub mod traits;
pub mod resolver;
pub mod matrix;
pub mod tour;
pub mod aggregate;
pub mod telemetry;
pub mod optimizer;
pub mod haversine;
pub mod osrm;
pub mod nominatim;

pub use aggregate::{Leg, RouteResult, UnresolvedDestination, UnresolvedReason};
pub use error::{
    InternalConsistencyError, MatrixError, OptimizationError, ResolutionError, TelemetryError,
};
pub use optimizer::{OptimizationPhase, OptimizerConfig, RouteOptimizer};
pub use types::{Coordinate, Destination, FleetVehicle, GeoPoint, RouteRequest, TravelMode};
