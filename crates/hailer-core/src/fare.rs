//! # Fare and Route Estimates
//!
//! Straight-leg estimates computed when a trip is requested. Real routing
//! comes from an external directions service; these numbers are what the
//! passenger sees before one is available.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::geo::{planar_distance_m, Coordinate, Place};

/// Pricing parameters, all money in cents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FareSchedule {
    /// Flat charge per trip.
    pub base_cents: i64,
    /// Charge per kilometer travelled.
    pub per_km_cents: i64,
    /// Charge per minute travelled.
    pub per_minute_cents: i64,
    /// Assumed average speed used to derive durations.
    pub average_speed_kmh: f64,
}

impl Default for FareSchedule {
    fn default() -> Self {
        Self {
            base_cents: 250,
            per_km_cents: 120,
            per_minute_cents: 30,
            average_speed_kmh: 30.0,
        }
    }
}

/// Distance, duration, cost and route for a list of stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEstimate {
    /// Sum of leg distances in meters.
    pub distance_m: f64,
    /// Travel time in seconds at the schedule's average speed.
    pub duration_secs: i64,
    /// Estimated fare in cents.
    pub cost_cents: i64,
    /// Encoded polyline through the stops (precision 5).
    pub route_polyline: String,
}

impl FareSchedule {
    /// Reject schedules that would produce negative or undefined fares.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.base_cents < 0 || self.per_km_cents < 0 || self.per_minute_cents < 0 {
            return Err(CoreError::InvalidFare(
                "fare components must not be negative".to_string(),
            ));
        }
        if !(self.average_speed_kmh.is_finite() && self.average_speed_kmh > 0.0) {
            return Err(CoreError::InvalidFare(format!(
                "average speed must be positive, got {}",
                self.average_speed_kmh
            )));
        }
        Ok(())
    }

    /// Estimate a trip visiting `stops` in order.
    pub fn estimate(&self, stops: &[Place]) -> RouteEstimate {
        let distance_m: f64 = stops
            .windows(2)
            .map(|leg| planar_distance_m(&leg[0].coordinate, &leg[1].coordinate))
            .sum();
        let speed_mps = self.average_speed_kmh * 1000.0 / 3600.0;
        let duration_secs = (distance_m / speed_mps).round() as i64;
        RouteEstimate {
            distance_m,
            duration_secs,
            cost_cents: self.price(distance_m, duration_secs),
            route_polyline: encode_polyline(stops.iter().map(|p| p.coordinate)),
        }
    }

    /// Price a completed distance and duration.
    pub fn price(&self, distance_m: f64, duration_secs: i64) -> i64 {
        let km = distance_m / 1000.0;
        let minutes = duration_secs as f64 / 60.0;
        self.base_cents
            + (km * self.per_km_cents as f64).round() as i64
            + (minutes * self.per_minute_cents as f64).round() as i64
    }
}

/// Encode coordinates with the polyline algorithm (precision 5).
pub fn encode_polyline(points: impl IntoIterator<Item = Coordinate>) -> String {
    let mut out = String::new();
    let (mut prev_lat, mut prev_lon) = (0i64, 0i64);
    for point in points {
        let lat = (point.latitude * 1e5).round() as i64;
        let lon = (point.longitude * 1e5).round() as i64;
        encode_value(lat - prev_lat, &mut out);
        encode_value(lon - prev_lon, &mut out);
        prev_lat = lat;
        prev_lon = lon;
    }
    out
}

fn encode_value(delta: i64, out: &mut String) {
    let mut value = if delta < 0 { !(delta << 1) } else { delta << 1 };
    while value >= 0x20 {
        out.push(char::from((((value & 0x1f) | 0x20) + 63) as u8));
        value >>= 5;
    }
    out.push(char::from((value + 63) as u8));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(lat: f64, lon: f64) -> Place {
        Place::new("stop", Coordinate::new(lat, lon).unwrap())
    }

    #[test]
    fn polyline_matches_reference_encoding() {
        let encoded = encode_polyline([
            Coordinate::new(38.5, -120.2).unwrap(),
            Coordinate::new(40.7, -120.95).unwrap(),
            Coordinate::new(43.252, -126.453).unwrap(),
        ]);
        assert_eq!(encoded, "_p~iF~ps|U_ulLnnqC_mqNvxq`@");
    }

    #[test]
    fn estimate_sums_legs() {
        let schedule = FareSchedule::default();
        let stops = [place(30.0, 31.0), place(30.1, 31.0), place(30.2, 31.0)];
        let direct = schedule.estimate(&[place(30.0, 31.0), place(30.2, 31.0)]);
        let via = schedule.estimate(&stops);
        assert!((via.distance_m - direct.distance_m).abs() < 1.0);
        assert!(via.cost_cents >= schedule.base_cents);
    }

    #[test]
    fn zero_distance_costs_base_fare() {
        let schedule = FareSchedule::default();
        let estimate = schedule.estimate(&[place(30.0, 31.0), place(30.0, 31.0)]);
        assert_eq!(estimate.duration_secs, 0);
        assert_eq!(estimate.cost_cents, schedule.base_cents);
    }

    #[test]
    fn validate_rejects_non_positive_speed() {
        let schedule = FareSchedule {
            average_speed_kmh: 0.0,
            ..FareSchedule::default()
        };
        assert!(schedule.validate().is_err());
    }
}
