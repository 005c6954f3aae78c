//! Bakery delivery area in Brno used by the realistic routing tests.
//!
//! Coordinates are approximate street positions; they only need to be
//! stable, not survey-accurate.

use std::collections::HashMap;

use delivery_planner::traits::{Geocoder, VehicleRoster};
use delivery_planner::{Coordinate, Destination, FleetVehicle, GeoPoint, ResolutionError};

/// A named customer address with its coordinate.
#[derive(Debug, Clone)]
pub struct Location {
    pub id: &'static str,
    pub address: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(id: &'static str, address: &'static str, lat: f64, lng: f64) -> Self {
        Self { id, address, lat, lng }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }

    pub fn destination(&self) -> Destination {
        Destination::new(self.id, self.address)
    }
}

// ============================================================================
// Depot
// ============================================================================

pub const BAKERY: Location = Location::new("bakery", "Kotlarska 12, Brno", 49.2047, 16.5971);

// ============================================================================
// Customers
// ============================================================================

pub const CUSTOMERS: &[Location] = &[
    Location::new("cafe-namesti", "Namesti Svobody 7, Brno", 49.1951, 16.6083),
    Location::new("hotel-grand", "Benesova 18, Brno", 49.1916, 16.6144),
    Location::new("bistro-zabovresky", "Minska 44, Brno", 49.2105, 16.5785),
    Location::new("canteen-kralovo-pole", "Palackeho 120, Brno", 49.2281, 16.5961),
    Location::new("deli-lisen", "Jilkova 3, Brno", 49.2093, 16.6747),
    Location::new("school-bystrc", "Vondrakova 7, Brno", 49.2256, 16.5205),
    Location::new("market-zabrdovice", "Vranovska 27, Brno", 49.2019, 16.6286),
    Location::new("office-park-hermanova", "Heyrovskeho 14, Brno", 49.1861, 16.5592),
];

pub fn customer(id: &str) -> &'static Location {
    CUSTOMERS
        .iter()
        .find(|location| location.id == id)
        .unwrap_or_else(|| panic!("unknown fixture customer {id}"))
}

// ============================================================================
// In-memory collaborators
// ============================================================================

/// Geocoder answering from a fixed address book.
#[derive(Debug, Default)]
pub struct AddressBook {
    entries: HashMap<String, Coordinate>,
}

impl AddressBook {
    pub fn with_area() -> Self {
        let mut book = Self::default();
        for location in std::iter::once(&BAKERY).chain(CUSTOMERS) {
            book.entries.insert(location.address.to_string(), location.coordinate());
        }
        book
    }
}

impl Geocoder for AddressBook {
    fn geocode(&self, address: &str) -> Result<Coordinate, ResolutionError> {
        self.entries
            .get(address)
            .copied()
            .ok_or_else(|| ResolutionError::NotFound {
                address: address.to_string(),
            })
    }
}

/// Roster with a single van parked at the bakery.
pub struct BakeryRoster;

pub const VAN_ID: &str = "van-1";

impl VehicleRoster for BakeryRoster {
    fn vehicle(&self, vehicle_id: &str) -> Option<FleetVehicle> {
        (vehicle_id == VAN_ID).then(|| FleetVehicle {
            id: VAN_ID.to_string(),
            license_plate: "1B2 3456".to_string(),
            origin: GeoPoint::new(BAKERY.id, "Bakery", BAKERY.address),
        })
    }
}
