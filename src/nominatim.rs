//! Nominatim geocoding adapter.
//!
//! Public Nominatim instances allow about one request per second, so calls
//! are spaced by a minimum interval no matter how many workers share the
//! client.

use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Deserialize;

use crate::error::ResolutionError;
use crate::traits::Geocoder;
use crate::types::Coordinate;

#[derive(Debug, Clone)]
pub struct NominatimConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Minimum spacing between two requests.
    pub min_interval: Duration,
    /// Optional ISO 3166-1 country filter, e.g. `"cz"`.
    pub country_codes: Option<String>,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("delivery-planner/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 10,
            min_interval: Duration::from_millis(1500),
            country_codes: None,
        }
    }
}

#[derive(Debug)]
pub struct NominatimGeocoder {
    config: NominatimConfig,
    client: reqwest::blocking::Client,
    last_call: Mutex<Option<Instant>>,
}

impl NominatimGeocoder {
    pub fn new(config: NominatimConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            last_call: Mutex::new(None),
        })
    }

    /// Block until the minimum interval since the previous call has passed.
    fn throttle(&self) {
        let mut last = self.last_call.lock();
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.config.min_interval {
                thread::sleep(self.config.min_interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.config.base_url.trim_end_matches('/'))
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&self, address: &str) -> Result<Coordinate, ResolutionError> {
        self.throttle();

        let mut query = vec![("q", address), ("format", "json"), ("limit", "1")];
        if let Some(codes) = &self.config.country_codes {
            query.push(("countrycodes", codes.as_str()));
        }

        let results = self
            .client
            .get(self.search_url())
            .query(&query)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<Vec<NominatimPlace>>())
            .map_err(|err| ResolutionError::Provider {
                message: err.to_string(),
            })?;

        first_coordinate(address, results)
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

fn first_coordinate(
    address: &str,
    places: Vec<NominatimPlace>,
) -> Result<Coordinate, ResolutionError> {
    let place = places
        .into_iter()
        .next()
        .ok_or_else(|| ResolutionError::NotFound {
            address: address.to_string(),
        })?;

    let parse = |value: &str, axis: &str| {
        value.parse::<f64>().map_err(|_| ResolutionError::Provider {
            message: format!("invalid {axis} '{value}' in Nominatim response"),
        })
    };

    Ok(Coordinate::new(parse(&place.lat, "latitude")?, parse(&place.lon, "longitude")?))
}
