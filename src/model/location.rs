// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
//! Positions of tasks and agents and the travel-time metric between them

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A position in one of the supported geometries.
///
/// All locations of one problem must share the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Location {
    /// Integer grid position with straight-line distance
    Euclidean { x: i32, y: i32 },
    /// Integer grid position with city-block distance
    Manhattan { x: i32, y: i32 },
    /// Latitude and longitude in degrees, distance in km
    LatLng { lat: f64, lon: f64 },
}

impl Location {
    pub fn euclidean(x: i32, y: i32) -> Self {
        Self::Euclidean { x, y }
    }

    pub fn manhattan(x: i32, y: i32) -> Self {
        Self::Manhattan { x, y }
    }

    pub fn lat_lng(lat: f64, lon: f64) -> Self {
        Self::LatLng { lat, lon }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Euclidean { .. } => "euclidean",
            Self::Manhattan { .. } => "manhattan",
            Self::LatLng { .. } => "latlng",
        }
    }

    pub fn same_kind(&self, other: &Location) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn distance(&self, other: &Location) -> Result<f64> {
        match (self, other) {
            (Self::Euclidean { x, y }, Self::Euclidean { x: x2, y: y2 }) => {
                let dx = (*x as f64) - (*x2 as f64);
                let dy = (*y as f64) - (*y2 as f64);
                Ok((dx * dx + dy * dy).sqrt())
            }
            (Self::Manhattan { x, y }, Self::Manhattan { x: x2, y: y2 }) => {
                Ok(((*x as f64) - (*x2 as f64)).abs() + ((*y as f64) - (*y2 as f64)).abs())
            }
            (Self::LatLng { lat, lon }, Self::LatLng { lat: lat2, lon: lon2 }) => {
                Ok(haversine_km(*lat, *lon, *lat2, *lon2))
            }
            _ => Err(Error::LocationMismatch(self.kind(), other.kind())),
        }
    }

    /// Ticks needed to cover the distance to `other` at `speed` units per tick,
    /// rounded up. `speed` is expected to be positive.
    pub fn travel_time(&self, other: &Location, speed: f32) -> Result<i32> {
        let distance = self.distance(other)?;
        Ok((distance / speed as f64).ceil() as i32)
    }
}

pub fn haversine_km(lat1_deg: f64, lon1_deg: f64, lat2_deg: f64, lon2_deg: f64) -> f64 {
    let lat1 = lat1_deg.to_radians();
    let lat2 = lat2_deg.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (lon2_deg - lon1_deg).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_travel_time_rounds_up() {
        let a = Location::euclidean(0, 0);
        let b = Location::euclidean(3, 4);
        assert_eq!(a.travel_time(&b, 1.0).unwrap(), 5);
        assert_eq!(a.travel_time(&b, 2.0).unwrap(), 3);
        assert_eq!(a.travel_time(&a, 1.0).unwrap(), 0);

        let c = Location::euclidean(5, 5);
        // sqrt(50) ~ 7.07
        assert_eq!(c.travel_time(&Location::euclidean(0, 0), 1.0).unwrap(), 8);
    }

    #[test]
    fn test_manhattan_distance_uses_both_axes() {
        let a = Location::manhattan(1, 2);
        let b = Location::manhattan(4, -2);
        assert_eq!(a.distance(&b).unwrap(), 7.0);
        assert_eq!(a.travel_time(&b, 2.0).unwrap(), 4);
    }

    #[test]
    fn test_lat_lng_distance() {
        let a = Location::lat_lng(0.0, 0.0);
        let b = Location::lat_lng(0.0, 1.0);
        let d = a.distance(&b).unwrap();
        assert!((d - 111.19).abs() < 0.1, "one degree of longitude at the equator, got {d}");
        assert_eq!(a.travel_time(&b, 100.0).unwrap(), 2);
    }

    #[test]
    fn test_mismatched_kinds_are_an_error() {
        let a = Location::euclidean(0, 0);
        let b = Location::manhattan(0, 0);
        assert_eq!(
            a.travel_time(&b, 1.0),
            Err(Error::LocationMismatch("euclidean", "manhattan"))
        );
        assert!(!a.same_kind(&b));
        assert!(a.same_kind(&Location::euclidean(9, 9)));
    }
}
