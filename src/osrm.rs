//! OSRM HTTP adapter for distance/duration matrices.

use serde::Deserialize;

use crate::error::MatrixError;
use crate::traits::{DistanceMatrixProvider, ElementStatus, MatrixCell};
use crate::types::{Coordinate, TravelMode};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Table service URL. Origins come first in the coordinate list,
    /// destinations after them.
    fn table_url(&self, origins: &[Coordinate], destinations: &[Coordinate]) -> String {
        let coords = origins
            .iter()
            .chain(destinations)
            .map(|c| format!("{:.6},{:.6}", c.lng, c.lat))
            .collect::<Vec<_>>()
            .join(";");
        let sources = (0..origins.len())
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(";");
        let targets = (origins.len()..origins.len() + destinations.len())
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/table/v1/{}/{}?annotations=duration,distance&sources={}&destinations={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            coords,
            sources,
            targets
        )
    }
}

impl DistanceMatrixProvider for OsrmClient {
    fn matrix_for(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
        mode: TravelMode,
    ) -> Result<Vec<Vec<MatrixCell>>, MatrixError> {
        if origins.is_empty() || destinations.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.table_url(origins, destinations);
        tracing::debug!(%url, mode = mode.as_str(), "requesting OSRM table");

        let body = self
            .client
            .get(&url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmTableResponse>())
            .map_err(|err| MatrixError::Transport {
                url: url.clone(),
                message: err.to_string(),
            })?;

        body.into_cells(origins.len(), destinations.len())
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    message: Option<String>,
    durations: Option<Vec<Vec<Option<f64>>>>,
    distances: Option<Vec<Vec<Option<f64>>>>,
}

impl OsrmTableResponse {
    /// Pair the duration and distance grids into cells. `null`, negative and
    /// non-finite values mean no route.
    fn into_cells(self, rows: usize, cols: usize) -> Result<Vec<Vec<MatrixCell>>, MatrixError> {
        if self.code != "Ok" {
            return Err(MatrixError::Service {
                code: self.code,
                message: self.message.unwrap_or_default(),
            });
        }

        let durations = self
            .durations
            .ok_or_else(|| MatrixError::Malformed("OSRM response missing durations".to_string()))?;
        let distances = self
            .distances
            .ok_or_else(|| MatrixError::Malformed("OSRM response missing distances".to_string()))?;

        if durations.len() != rows || distances.len() != rows {
            return Err(MatrixError::Malformed(format!(
                "expected {rows} rows, got {} durations and {} distances",
                durations.len(),
                distances.len()
            )));
        }

        durations
            .into_iter()
            .zip(distances)
            .map(|(duration_row, distance_row)| {
                if duration_row.len() != cols || distance_row.len() != cols {
                    return Err(MatrixError::Malformed(format!("expected {cols} columns")));
                }
                Ok(duration_row
                    .into_iter()
                    .zip(distance_row)
                    .map(|(duration, distance)| match (to_whole(distance), to_whole(duration)) {
                        (Some(distance), Some(duration)) => MatrixCell::ok(distance, duration),
                        _ => MatrixCell::unreachable(ElementStatus::ZeroResults),
                    })
                    .collect())
            })
            .collect()
    }
}

fn to_whole(value: Option<f64>) -> Option<u64> {
    value
        .filter(|v| *v >= 0.0 && v.is_finite())
        .map(|v| v.round() as u64)
}
