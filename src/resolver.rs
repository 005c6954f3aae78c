//! Address resolution for a batch of points.
//!
//! Every point is resolved independently on a bounded worker pool; one
//! failure never affects its siblings. Outcomes come back in input order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use rayon::prelude::*;
use rayon::ThreadPool;
use tokio_util::sync::CancellationToken;

use crate::error::ResolutionError;
use crate::traits::Geocoder;
use crate::types::{Coordinate, GeoPoint};

/// Read-through cache of resolved coordinates keyed by normalized address.
///
/// Only successful resolutions are stored. Entries are never invalidated,
/// so a request always sees a stable view of what it already read.
#[derive(Debug, Default)]
pub struct CoordinateCache {
    entries: RwLock<HashMap<String, Coordinate>>,
}

impl CoordinateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &str) -> Option<Coordinate> {
        self.entries.read().get(&normalize_address(address)).copied()
    }

    pub fn insert(&self, address: &str, coordinate: Coordinate) {
        self.entries
            .write()
            .insert(normalize_address(address), coordinate);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Trim, collapse inner whitespace and lowercase.
pub fn normalize_address(address: &str) -> String {
    address
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Result of resolving one point.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub point_id: String,
    pub outcome: Result<Coordinate, ResolutionError>,
}

pub struct GeoPointResolver<G> {
    geocoder: G,
    cache: Option<Arc<CoordinateCache>>,
    pool: ThreadPool,
}

impl<G: Geocoder> GeoPointResolver<G> {
    /// Build a resolver issuing at most `max_concurrent` provider calls at once.
    pub fn new(geocoder: G, max_concurrent: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_concurrent.max(1))
            .thread_name(|index| format!("geocode-{index}"))
            .build()?;

        Ok(Self {
            geocoder,
            cache: None,
            pool,
        })
    }

    pub fn with_cache(mut self, cache: Arc<CoordinateCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&Arc<CoordinateCache>> {
        self.cache.as_ref()
    }

    /// Resolve a single address. No retries.
    pub fn resolve(&self, address: &str) -> Result<Coordinate, ResolutionError> {
        if address.trim().is_empty() {
            return Err(ResolutionError::EmptyAddress);
        }

        if let Some(coordinate) = self.cache.as_ref().and_then(|cache| cache.get(address)) {
            tracing::debug!(address, "coordinate cache hit");
            return Ok(coordinate);
        }

        let coordinate = in_range(self.geocoder.geocode(address)?)?;

        if let Some(cache) = &self.cache {
            cache.insert(address, coordinate);
        }
        Ok(coordinate)
    }

    /// Resolve every point that lacks a coordinate.
    ///
    /// Points that already carry a coordinate skip the provider but are still
    /// range-checked.
    /// Calls that have not started when `cancel` fires or `deadline` passes
    /// report [`ResolutionError::Cancelled`]; calls already in flight finish.
    pub fn resolve_batch(
        &self,
        points: &[GeoPoint],
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Vec<Resolution> {
        self.pool.install(|| {
            points
                .par_iter()
                .map(|point| {
                    let expired = deadline.is_some_and(|deadline| Instant::now() >= deadline);
                    let outcome = match point.coordinate {
                        Some(coordinate) => in_range(coordinate),
                        None if expired || cancel.is_cancelled() => {
                            Err(ResolutionError::Cancelled)
                        }
                        None => self.resolve(&point.address),
                    };

                    if let Err(err) = &outcome {
                        tracing::warn!(
                            point = %point.id,
                            address = %point.address,
                            error = %err,
                            "address not resolved"
                        );
                    }

                    Resolution {
                        point_id: point.id.clone(),
                        outcome,
                    }
                })
                .collect()
        })
    }
}

fn in_range(coordinate: Coordinate) -> Result<Coordinate, ResolutionError> {
    if coordinate.is_valid() {
        Ok(coordinate)
    } else {
        Err(ResolutionError::Provider {
            message: format!(
                "coordinate ({}, {}) is out of range",
                coordinate.lat, coordinate.lng
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    struct CountingGeocoder {
        calls: AtomicUsize,
    }

    impl Geocoder for CountingGeocoder {
        fn geocode(&self, address: &str) -> Result<Coordinate, ResolutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match address {
                "nowhere" => Err(ResolutionError::NotFound {
                    address: address.to_string(),
                }),
                "broken" => Ok(Coordinate::new(123.0, 0.0)),
                _ => Ok(Coordinate::new(10.0, 20.0)),
            }
        }
    }

    fn resolver() -> GeoPointResolver<CountingGeocoder> {
        GeoPointResolver::new(
            CountingGeocoder {
                calls: AtomicUsize::new(0),
            },
            2,
        )
        .expect("pool")
    }

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize_address("  12  Baker   ST "), "12 baker st");
    }

    #[test]
    fn empty_address_fails_without_provider_call() {
        let resolver = resolver();
        assert_eq!(resolver.resolve("   "), Err(ResolutionError::EmptyAddress));
        assert_eq!(resolver.geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn out_of_range_coordinate_is_provider_error() {
        let resolver = resolver();
        assert!(matches!(
            resolver.resolve("broken"),
            Err(ResolutionError::Provider { .. })
        ));
    }

    #[test]
    fn cache_is_read_through() {
        let cache = Arc::new(CoordinateCache::new());
        let resolver = resolver().with_cache(Arc::clone(&cache));

        resolver.resolve("1 Mill Lane").expect("resolves");
        resolver.resolve("1  mill lane ").expect("resolves");

        assert_eq!(resolver.geocoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = Arc::new(CoordinateCache::new());
        let resolver = resolver().with_cache(Arc::clone(&cache));

        assert!(resolver.resolve("nowhere").is_err());
        assert!(resolver.resolve("nowhere").is_err());

        assert!(cache.is_empty());
        assert_eq!(resolver.geocoder.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn batch_keeps_order_and_isolates_failures() {
        let resolver = resolver();
        let points = vec![
            GeoPoint::new("a", "A", "1 Main St"),
            GeoPoint::new("b", "B", "nowhere"),
            GeoPoint::new("c", "C", "ignored").with_coordinate(Coordinate::new(1.0, 1.0)),
        ];

        let results = resolver.resolve_batch(&points, &CancellationToken::new(), None);

        let ids: Vec<_> = results.iter().map(|r| r.point_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(results[0].outcome.is_ok());
        assert!(matches!(results[1].outcome, Err(ResolutionError::NotFound { .. })));
        assert_eq!(results[2].outcome, Ok(Coordinate::new(1.0, 1.0)));
        // pre-resolved point skips the provider
        assert_eq!(resolver.geocoder.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cancelled_batch_skips_provider() {
        let resolver = resolver();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let points = vec![GeoPoint::new("a", "A", "1 Main St")];
        let results = resolver.resolve_batch(&points, &cancel, None);

        assert_eq!(results[0].outcome, Err(ResolutionError::Cancelled));
        assert_eq!(resolver.geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn expired_deadline_skips_provider() {
        let resolver = resolver();
        let points = vec![GeoPoint::new("a", "A", "1 Main St")];

        let deadline = Some(Instant::now());
        let results = resolver.resolve_batch(&points, &CancellationToken::new(), deadline);

        assert_eq!(results[0].outcome, Err(ResolutionError::Cancelled));
        assert_eq!(resolver.geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn preset_coordinate_is_range_checked() {
        let resolver = resolver();
        let points = vec![
            GeoPoint::new("depot", "Depot", "1 Yard Rd")
                .with_coordinate(Coordinate::new(91.0, 0.0)),
            GeoPoint::new("a", "A", "1 Main St"),
        ];

        let results = resolver.resolve_batch(&points, &CancellationToken::new(), None);

        assert!(matches!(results[0].outcome, Err(ResolutionError::Provider { .. })));
        assert!(results[1].outcome.is_ok());
        assert_eq!(resolver.geocoder.calls.load(Ordering::SeqCst), 1);
    }

    /// Geocoder that sleeps per call and records the peak number of calls
    /// running at once.
    struct SlowGeocoder {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Geocoder for SlowGeocoder {
        fn geocode(&self, _address: &str) -> Result<Coordinate, ResolutionError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(30));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Coordinate::new(10.0, 20.0))
        }
    }

    #[test]
    fn batch_respects_concurrency_limit() {
        let resolver = GeoPointResolver::new(
            SlowGeocoder {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            },
            3,
        )
        .expect("pool");
        let points: Vec<GeoPoint> = (0..12)
            .map(|i| GeoPoint::new(format!("p{i}"), format!("P{i}"), format!("{i} Main St")))
            .collect();

        let results = resolver.resolve_batch(&points, &CancellationToken::new(), None);

        assert!(results.iter().all(|r| r.outcome.is_ok()));
        let peak = resolver.geocoder.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in flight {peak}");
        assert!(peak > 1, "calls never overlapped");
    }
}
