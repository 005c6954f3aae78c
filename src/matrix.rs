//! Pairwise travel cost matrix over resolved points.
//!
//! The matrix is square over the points it was built from and is always
//! addressed by point id. Pairs the provider could not route are kept as
//! entries with no distance or duration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::MatrixError;
use crate::traits::{DistanceMatrixProvider, ElementStatus, MatrixCell};
use crate::types::{Coordinate, GeoPoint, TravelMode};

/// Travel cost between an ordered pair of points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEntry {
    pub from: String,
    pub to: String,
    pub distance_meters: Option<u64>,
    pub duration_seconds: Option<u64>,
}

impl CostEntry {
    /// Both distance and duration are known.
    pub fn is_reachable(&self) -> bool {
        self.distance_meters.is_some() && self.duration_seconds.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    entries: Vec<Vec<CostEntry>>,
}

impl CostMatrix {
    /// Assemble a matrix from ids and a provider grid in the same order.
    ///
    /// Self-pairs are forced to zero; cells that are not OK, or that lack
    /// either value, become unreachable entries.
    pub fn from_cells(ids: Vec<String>, cells: Vec<Vec<MatrixCell>>) -> Result<Self, MatrixError> {
        let n = ids.len();
        if cells.len() != n {
            return Err(MatrixError::Malformed(format!(
                "expected {n} rows, got {}",
                cells.len()
            )));
        }

        let mut index = HashMap::with_capacity(n);
        for (i, id) in ids.iter().enumerate() {
            if index.insert(id.clone(), i).is_some() {
                return Err(MatrixError::DuplicatePoint(id.clone()));
            }
        }

        let mut entries = Vec::with_capacity(n);
        for (i, row) in cells.into_iter().enumerate() {
            if row.len() != n {
                return Err(MatrixError::Malformed(format!(
                    "row {i} has {} columns, expected {n}",
                    row.len()
                )));
            }

            let row = row
                .into_iter()
                .enumerate()
                .map(|(j, cell)| {
                    let (distance_meters, duration_seconds) = if i == j {
                        (Some(0), Some(0))
                    } else {
                        match cell {
                            MatrixCell {
                                status: ElementStatus::Ok,
                                distance_meters: Some(distance),
                                duration_seconds: Some(duration),
                            } => (Some(distance), Some(duration)),
                            _ => (None, None),
                        }
                    };
                    CostEntry {
                        from: ids[i].clone(),
                        to: ids[j].clone(),
                        distance_meters,
                        duration_seconds,
                    }
                })
                .collect();
            entries.push(row);
        }

        Ok(Self { ids, index, entries })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Point ids in build order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Entry for the ordered pair, or `None` if either id is not in the matrix.
    pub fn entry(&self, from: &str, to: &str) -> Option<&CostEntry> {
        let i = *self.index.get(from)?;
        let j = *self.index.get(to)?;
        Some(&self.entries[i][j])
    }

    /// Distance for the pair when it is reachable.
    pub fn distance(&self, from: &str, to: &str) -> Option<u64> {
        self.entry(from, to)
            .filter(|entry| entry.is_reachable())
            .and_then(|entry| entry.distance_meters)
    }

    /// Number of ordered pairs, self-pairs excluded, with no route.
    pub fn unreachable_pairs(&self) -> usize {
        self.entries
            .iter()
            .flatten()
            .filter(|entry| !entry.is_reachable())
            .count()
    }
}

/// Build the cost matrix for a set of resolved points with one provider call.
pub fn build_matrix<M>(
    points: &[GeoPoint],
    provider: &M,
    mode: TravelMode,
) -> Result<CostMatrix, MatrixError>
where
    M: DistanceMatrixProvider + ?Sized,
{
    if points.is_empty() {
        return Err(MatrixError::EmptyInput);
    }

    let coordinates = points
        .iter()
        .map(|point| point.coordinate.ok_or_else(|| MatrixError::UnresolvedPoint(point.id.clone())))
        .collect::<Result<Vec<Coordinate>, _>>()?;
    let ids: Vec<String> = points.iter().map(|point| point.id.clone()).collect();

    let cells = provider.matrix_for(&coordinates, &coordinates, mode)?;
    let matrix = CostMatrix::from_cells(ids, cells)?;

    tracing::debug!(
        points = matrix.len(),
        unreachable_pairs = matrix.unreachable_pairs(),
        "cost matrix built"
    );
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct GridProvider {
        grid: Vec<Vec<MatrixCell>>,
    }

    impl DistanceMatrixProvider for GridProvider {
        fn matrix_for(
            &self,
            _origins: &[Coordinate],
            _destinations: &[Coordinate],
            _mode: TravelMode,
        ) -> Result<Vec<Vec<MatrixCell>>, MatrixError> {
            Ok(self.grid.clone())
        }
    }

    struct FailingProvider;

    impl DistanceMatrixProvider for FailingProvider {
        fn matrix_for(
            &self,
            _origins: &[Coordinate],
            _destinations: &[Coordinate],
            _mode: TravelMode,
        ) -> Result<Vec<Vec<MatrixCell>>, MatrixError> {
            Err(MatrixError::Transport {
                url: "http://matrix.test".to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    fn point(id: &str) -> GeoPoint {
        GeoPoint::new(id, id, format!("{id} street")).with_coordinate(Coordinate::new(1.0, 1.0))
    }

    #[test]
    fn unreachable_cells_are_kept_as_empty_entries() {
        let provider = GridProvider {
            grid: vec![
                vec![MatrixCell::ok(0, 0), MatrixCell::unreachable(ElementStatus::ZeroResults)],
                vec![MatrixCell::ok(900, 60), MatrixCell::ok(0, 0)],
            ],
        };

        let matrix = build_matrix(&[point("o"), point("a")], &provider, TravelMode::Driving)
            .expect("matrix builds");

        assert_eq!(matrix.len(), 2);
        let entry = matrix.entry("o", "a").expect("entry exists");
        assert_eq!(entry.distance_meters, None);
        assert_eq!(entry.duration_seconds, None);
        assert_eq!(matrix.distance("a", "o"), Some(900));
        assert_eq!(matrix.unreachable_pairs(), 1);
    }

    #[test]
    fn self_pairs_are_zero_even_when_provider_disagrees() {
        let provider = GridProvider {
            grid: vec![vec![MatrixCell::unreachable(ElementStatus::NotFound)]],
        };

        let matrix =
            build_matrix(&[point("o")], &provider, TravelMode::Driving).expect("matrix builds");

        let entry = matrix.entry("o", "o").expect("entry");
        assert_eq!(entry.distance_meters, Some(0));
        assert_eq!(entry.duration_seconds, Some(0));
    }

    #[test]
    fn ok_cell_missing_duration_is_unreachable() {
        let cell = MatrixCell {
            status: ElementStatus::Ok,
            distance_meters: Some(100),
            duration_seconds: None,
        };
        let matrix = CostMatrix::from_cells(
            vec!["o".into(), "a".into()],
            vec![
                vec![MatrixCell::ok(0, 0), cell],
                vec![MatrixCell::ok(1, 1), MatrixCell::ok(0, 0)],
            ],
        )
        .expect("matrix builds");

        assert!(!matrix.entry("o", "a").expect("entry").is_reachable());
        assert_eq!(matrix.distance("o", "a"), None);
    }

    #[test]
    fn unresolved_point_is_rejected() {
        let provider = GridProvider { grid: vec![] };
        let points = vec![point("o"), GeoPoint::new("x", "x", "x street")];

        let err = build_matrix(&points, &provider, TravelMode::Driving).expect_err("should fail");
        assert_eq!(err, MatrixError::UnresolvedPoint("x".to_string()));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = CostMatrix::from_cells(
            vec!["o".into(), "o".into()],
            vec![vec![MatrixCell::ok(0, 0); 2]; 2],
        )
        .expect_err("should fail");
        assert_eq!(err, MatrixError::DuplicatePoint("o".to_string()));
    }

    #[test]
    fn wrong_shape_is_malformed() {
        let provider = GridProvider {
            grid: vec![vec![MatrixCell::ok(0, 0)]],
        };

        let err = build_matrix(&[point("o"), point("a")], &provider, TravelMode::Driving)
            .expect_err("should fail");
        assert!(matches!(err, MatrixError::Malformed(_)));
    }

    #[test]
    fn provider_failure_is_wholesale() {
        let err = build_matrix(&[point("o")], &FailingProvider, TravelMode::Driving)
            .expect_err("should fail");
        assert!(matches!(err, MatrixError::Transport { .. }));
    }

    #[test]
    fn empty_input_is_rejected() {
        let err =
            build_matrix(&[], &FailingProvider, TravelMode::Driving).expect_err("should fail");
        assert_eq!(err, MatrixError::EmptyInput);
    }

    #[test]
    fn unknown_ids_have_no_entry() {
        let matrix = CostMatrix::from_cells(vec!["o".into()], vec![vec![MatrixCell::ok(0, 0)]])
            .expect("matrix builds");
        assert!(matrix.entry("o", "zzz").is_none());
        assert!(!matrix.contains("zzz"));
    }
}
