//! # Geographic Primitives
//!
//! Coordinates, named stops, and timestamped device positions, plus the
//! planar distance approximation used across the stack.
//!
//! ## Distance
//!
//! [`planar_distance_m`] projects both points onto a plane tangent at their
//! mean latitude (equirectangular) and takes the Euclidean distance. Error is
//! well under 1% at city scale, which is all matching and fare estimates
//! need.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::identity::DriverId;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, `[-90, 90]`.
    pub latitude: f64,
    /// Longitude in degrees, `[-180, 180]`.
    pub longitude: f64,
}

impl Coordinate {
    /// Create a validated coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoreError> {
        let coordinate = Self {
            latitude,
            longitude,
        };
        coordinate.validate()?;
        Ok(coordinate)
    }

    /// Check both components are finite and in range.
    ///
    /// Deserialized coordinates bypass [`Coordinate::new`], so request
    /// handlers call this explicitly.
    pub fn validate(&self) -> Result<(), CoreError> {
        let lat_ok = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lon_ok = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);
        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(CoreError::CoordinateOutOfRange {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }

    /// Planar distance to `other` in meters.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        planar_distance_m(self, other)
    }
}

/// Approximate great-circle distance in meters (equirectangular projection).
pub fn planar_distance_m(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let mean_lat = (lat_a + lat_b) / 2.0;
    let x = (b.longitude - a.longitude).to_radians() * mean_lat.cos();
    let y = lat_b - lat_a;
    (x * x + y * y).sqrt() * EARTH_RADIUS_M
}

/// A named stop on a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Display name (address or point of interest).
    pub name: String,
    /// Where the stop is.
    pub coordinate: Coordinate,
}

impl Place {
    /// Create a stop.
    pub fn new(name: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            name: name.into(),
            coordinate,
        }
    }
}

/// A single position sample reported by a driver device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// The reporting driver. Filled in by the server from the caller's
    /// identity; clients may leave it unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<DriverId>,
    /// Reported position.
    pub coordinate: Coordinate,
    /// Heading in degrees from true north.
    #[serde(default)]
    pub course: f64,
    /// Ground speed in meters per second.
    #[serde(default)]
    pub speed: f64,
    /// When the device took the sample.
    pub timestamp: DateTime<Utc>,
}

impl Location {
    /// A sample at `coordinate` taken now, with no heading or speed.
    pub fn at(coordinate: Coordinate) -> Self {
        Self {
            driver_id: None,
            coordinate,
            course: 0.0,
            speed: 0.0,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn distance_to_self_is_zero() {
        let c = Coordinate::new(30.0, 31.0).unwrap();
        assert_eq!(planar_distance_m(&c, &c), 0.0);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let a = Coordinate::new(30.0, 31.0).unwrap();
        let b = Coordinate::new(31.0, 31.0).unwrap();
        let d = planar_distance_m(&a, &b);
        assert!((d - 111_195.0).abs() < 50.0, "got {d}");
    }

    #[test]
    fn longitude_shrinks_with_latitude() {
        let equator = planar_distance_m(
            &Coordinate::new(0.0, 0.0).unwrap(),
            &Coordinate::new(0.0, 1.0).unwrap(),
        );
        let north = planar_distance_m(
            &Coordinate::new(60.0, 0.0).unwrap(),
            &Coordinate::new(60.0, 1.0).unwrap(),
        );
        assert!((north / equator - 0.5).abs() < 0.01);
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(Coordinate::new(91.0, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.5).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    proptest! {
        #[test]
        fn distance_is_symmetric(
            lat_a in -80.0f64..80.0, lon_a in -179.0f64..179.0,
            lat_b in -80.0f64..80.0, lon_b in -179.0f64..179.0,
        ) {
            let a = Coordinate { latitude: lat_a, longitude: lon_a };
            let b = Coordinate { latitude: lat_b, longitude: lon_b };
            let ab = planar_distance_m(&a, &b);
            let ba = planar_distance_m(&b, &a);
            prop_assert!((ab - ba).abs() < 1e-6);
            prop_assert!(ab >= 0.0);
        }
    }
}
