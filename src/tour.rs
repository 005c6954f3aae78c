//! Nearest-neighbor tour construction.
//!
//! Starting from the origin, repeatedly move to the closest unvisited
//! destination that the matrix can route to. Equal distances go to the
//! lexicographically smaller id, so the same matrix always yields the same
//! tour. This is a greedy approximation and not an optimal TSP tour; it is
//! O(n²) and meant for delivery runs of a few dozen stops at most.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::matrix::CostMatrix;

/// Ordered visiting sequence, origin first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tour {
    stops: Vec<String>,
}

impl Tour {
    pub fn stops(&self) -> &[String] {
        &self.stops
    }

    pub fn origin(&self) -> Option<&str> {
        self.stops.first().map(String::as_str)
    }

    /// Visited destinations, origin excluded.
    pub fn destinations(&self) -> &[String] {
        self.stops.get(1..).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Consecutive `(from, to)` pairs.
    pub fn legs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.stops
            .windows(2)
            .map(|pair| (pair[0].as_str(), pair[1].as_str()))
    }
}

/// A tour plus the destinations it could not reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TourPlan {
    pub tour: Tour,
    /// Sorted by id.
    pub unreachable: Vec<String>,
}

pub fn build_tour<S: AsRef<str>>(
    origin: &str,
    destinations: &[S],
    matrix: &CostMatrix,
) -> TourPlan {
    let mut visited: HashSet<&str> = HashSet::from([origin]);
    let mut remaining: Vec<&str> = Vec::with_capacity(destinations.len());
    for destination in destinations.iter().map(AsRef::as_ref) {
        if visited.insert(destination) {
            remaining.push(destination);
        }
    }

    let mut stops = vec![origin.to_string()];
    let mut current = origin;

    while !remaining.is_empty() {
        let next = remaining
            .iter()
            .enumerate()
            .filter_map(|(position, &candidate)| {
                matrix
                    .distance(current, candidate)
                    .map(|distance| (distance, candidate, position))
            })
            .min_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

        let Some((_, chosen, position)) = next else {
            break;
        };

        remaining.swap_remove(position);
        stops.push(chosen.to_string());
        current = chosen;
    }

    let mut unreachable: Vec<String> = remaining.into_iter().map(str::to_string).collect();
    unreachable.sort();
    if !unreachable.is_empty() {
        tracing::warn!(
            stuck_at = current,
            unreachable = ?unreachable,
            "tour stopped early, remaining destinations unreachable"
        );
    }

    TourPlan {
        tour: Tour { stops },
        unreachable,
    }
}
