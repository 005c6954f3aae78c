//! Route optimization façade.
//!
//! Drives one request through resolution, matrix building, tour
//! construction and aggregation. Phases never overlap, and each request owns
//! its points, matrix and tour. The optional coordinate cache is the only
//! state shared between requests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::aggregate::{aggregate, RouteResult, UnresolvedDestination, UnresolvedReason};
use crate::error::OptimizationError;
use crate::matrix::build_matrix;
use crate::resolver::{CoordinateCache, GeoPointResolver};
use crate::tour::build_tour;
use crate::traits::{DistanceMatrixProvider, Geocoder, VehicleRoster};
use crate::types::{GeoPoint, RouteRequest, TravelMode};

const DEFAULT_GEOCODE_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Upper bound on geocoding calls in flight for one request.
    pub max_concurrent_geocodes: usize,
    /// Deadline for the resolution phase, measured from request start.
    pub request_timeout: Option<Duration>,
    pub travel_mode: TravelMode,
    /// Share resolved coordinates across requests.
    pub cache_coordinates: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_geocodes: DEFAULT_GEOCODE_CONCURRENCY,
            request_timeout: None,
            travel_mode: TravelMode::Driving,
            cache_coordinates: true,
        }
    }
}

impl OptimizerConfig {
    /// Read overrides from the environment, falling back to defaults.
    ///
    /// - `DELIVERY_PLANNER_GEOCODE_CONCURRENCY`
    /// - `DELIVERY_PLANNER_REQUEST_TIMEOUT_SECS`
    /// - `DELIVERY_PLANNER_CACHE_COORDINATES` (`true`/`false`)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    /// Missing, unparsable or zero values keep the default.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let max_concurrent_geocodes = lookup("DELIVERY_PLANNER_GEOCODE_CONCURRENCY")
            .and_then(|s| s.trim().parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.max_concurrent_geocodes);

        let request_timeout = lookup("DELIVERY_PLANNER_REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse().ok())
            .map(Duration::from_secs)
            .or(defaults.request_timeout);

        let cache_coordinates = lookup("DELIVERY_PLANNER_CACHE_COORDINATES")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.cache_coordinates);

        Self {
            max_concurrent_geocodes,
            request_timeout,
            cache_coordinates,
            ..defaults
        }
    }
}

/// Lifecycle of a single optimization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationPhase {
    Idle,
    ResolvingAddresses,
    BuildingMatrix,
    ConstructingTour,
    Aggregating,
    Done,
    Failed,
}

impl OptimizationPhase {
    pub fn can_advance_to(self, next: OptimizationPhase) -> bool {
        use OptimizationPhase::*;
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Idle, ResolvingAddresses)
            | (ResolvingAddresses, BuildingMatrix)
            | (BuildingMatrix, ConstructingTour)
            | (ConstructingTour, Aggregating)
            | (Aggregating, Done) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OptimizationPhase::Done | OptimizationPhase::Failed)
    }
}

/// Phase bookkeeping for one request.
struct PhaseTracker<'a> {
    vehicle_id: &'a str,
    phase: OptimizationPhase,
}

impl<'a> PhaseTracker<'a> {
    fn new(vehicle_id: &'a str) -> Self {
        Self {
            vehicle_id,
            phase: OptimizationPhase::Idle,
        }
    }

    fn advance(&mut self, next: OptimizationPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal transition {:?} -> {:?}",
            self.phase,
            next
        );
        tracing::debug!(
            vehicle = self.vehicle_id,
            from = ?self.phase,
            to = ?next,
            "phase transition"
        );
        self.phase = next;
    }

    fn fail(&mut self, err: OptimizationError) -> OptimizationError {
        tracing::error!(
            vehicle = self.vehicle_id,
            phase = ?self.phase,
            error = %err,
            "route optimization failed"
        );
        self.advance(OptimizationPhase::Failed);
        err
    }
}

pub struct RouteOptimizer<G, M, R> {
    resolver: GeoPointResolver<G>,
    matrix_provider: M,
    roster: R,
    config: OptimizerConfig,
}

impl<G, M, R> RouteOptimizer<G, M, R>
where
    G: Geocoder,
    M: DistanceMatrixProvider,
    R: VehicleRoster,
{
    pub fn new(
        geocoder: G,
        matrix_provider: M,
        roster: R,
        config: OptimizerConfig,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let mut resolver = GeoPointResolver::new(geocoder, config.max_concurrent_geocodes)?;
        if config.cache_coordinates {
            resolver = resolver.with_cache(Arc::new(CoordinateCache::new()));
        }

        Ok(Self {
            resolver,
            matrix_provider,
            roster,
            config,
        })
    }

    /// Share an existing coordinate cache, e.g. between optimizers for
    /// different dispatch desks.
    pub fn with_cache(mut self, cache: Arc<CoordinateCache>) -> Self {
        self.resolver = self.resolver.with_cache(cache);
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn optimize_route(&self, request: &RouteRequest) -> Result<RouteResult, OptimizationError> {
        self.optimize_route_with_cancel(request, &CancellationToken::new())
    }

    /// Run a request that can be cancelled while addresses are resolving.
    ///
    /// Cancellation or the configured timeout during resolution fails the
    /// request with [`OptimizationError::Cancelled`]. Once matrix building
    /// has started the request runs to completion.
    pub fn optimize_route_with_cancel(
        &self,
        request: &RouteRequest,
        cancel: &CancellationToken,
    ) -> Result<RouteResult, OptimizationError> {
        let started = Instant::now();
        let deadline = self.config.request_timeout.map(|timeout| started + timeout);
        let mut tracker = PhaseTracker::new(&request.vehicle_id);

        let origin = match self.validate(request) {
            Ok(origin) => origin,
            Err(err) => return Err(tracker.fail(err)),
        };

        tracing::info!(
            vehicle = %request.vehicle_id,
            destinations = request.destinations.len(),
            "optimizing route"
        );

        // Resolution: origin first, then destinations in request order.
        tracker.advance(OptimizationPhase::ResolvingAddresses);
        let mut points = Vec::with_capacity(request.destinations.len() + 1);
        points.push(origin);
        points.extend(request.destinations.iter().map(|destination| {
            GeoPoint::new(&destination.id, &destination.id, &destination.address)
        }));

        let resolutions = self.resolver.resolve_batch(&points, cancel, deadline);
        let expired = deadline.is_some_and(|deadline| Instant::now() >= deadline);
        if cancel.is_cancelled() || expired {
            return Err(tracker.fail(OptimizationError::Cancelled));
        }

        let mut origin_error = None;
        let mut unresolved_destinations = Vec::new();
        for (index, (point, resolution)) in points.iter_mut().zip(resolutions).enumerate() {
            match resolution.outcome {
                Ok(coordinate) => point.coordinate = Some(coordinate),
                Err(err) if index == 0 => origin_error = Some(err),
                Err(err) => unresolved_destinations.push(UnresolvedDestination {
                    id: point.id.clone(),
                    reason: UnresolvedReason::Geocoding(err),
                }),
            }
        }

        if let Some(source) = origin_error {
            return Err(tracker.fail(OptimizationError::OriginUnresolved {
                vehicle_id: request.vehicle_id.clone(),
                source,
            }));
        }

        // Origin stays first; only resolved points enter the matrix.
        let resolved: Vec<GeoPoint> = points.into_iter().filter(GeoPoint::is_resolved).collect();
        if resolved.len() < 2 {
            return Err(tracker.fail(OptimizationError::NoReachableDestinations));
        }

        tracker.advance(OptimizationPhase::BuildingMatrix);
        let matrix = match build_matrix(&resolved, &self.matrix_provider, self.config.travel_mode) {
            Ok(matrix) => matrix,
            Err(err) => return Err(tracker.fail(err.into())),
        };

        tracker.advance(OptimizationPhase::ConstructingTour);
        let destination_ids: Vec<&str> =
            resolved[1..].iter().map(|point| point.id.as_str()).collect();
        let plan = build_tour(&resolved[0].id, &destination_ids, &matrix);
        unresolved_destinations.extend(plan.unreachable.into_iter().map(|id| UnresolvedDestination {
            id,
            reason: UnresolvedReason::Unreachable,
        }));

        tracker.advance(OptimizationPhase::Aggregating);
        let route = match aggregate(
            plan.tour,
            &matrix,
            request.departure_time,
            request.fuel_rate_liters_per_100km,
        ) {
            Ok(route) => route,
            Err(err) => return Err(tracker.fail(err.into())),
        };

        tracker.advance(OptimizationPhase::Done);
        let result = route.into_result(&request.vehicle_id, unresolved_destinations);
        tracing::info!(
            vehicle = %result.vehicle_id,
            stops = result.tour.len() - 1,
            unresolved = result.unresolved_destinations.len(),
            distance_m = result.total_distance_meters,
            duration_s = result.total_duration_seconds,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "route optimized"
        );
        Ok(result)
    }

    /// Checks that gate `Idle -> ResolvingAddresses`. Returns the vehicle's origin.
    fn validate(&self, request: &RouteRequest) -> Result<GeoPoint, OptimizationError> {
        if request.destinations.is_empty() {
            return Err(OptimizationError::InvalidRequest(
                "at least one destination is required".to_string(),
            ));
        }

        let rate = request.fuel_rate_liters_per_100km;
        if !rate.is_finite() || rate < 0.0 {
            return Err(OptimizationError::InvalidRequest(format!(
                "fuel rate must be a non-negative number, got {rate}"
            )));
        }

        let vehicle = self
            .roster
            .vehicle(&request.vehicle_id)
            .ok_or_else(|| OptimizationError::UnknownVehicle(request.vehicle_id.clone()))?;

        let mut seen = HashSet::from([vehicle.origin.id.as_str()]);
        for destination in &request.destinations {
            if !seen.insert(destination.id.as_str()) {
                return Err(OptimizationError::InvalidRequest(format!(
                    "destination id '{}' is duplicated or clashes with the origin",
                    destination.id
                )));
            }
        }

        Ok(vehicle.origin)
    }
}
