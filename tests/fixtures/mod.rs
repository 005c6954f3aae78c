//! Test fixtures for delivery-planner.
//!
//! Provides a small delivery area (bakery depot plus customer addresses
//! with known coordinates) and in-memory collaborators built on it.

#![allow(dead_code)]

pub mod delivery_area;

pub use delivery_area::*;
