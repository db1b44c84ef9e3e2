//! Geographic coordinates, stored locations, and geocoding results

use crate::error::{Result, WeatherServiceError};
use serde::{Deserialize, Serialize};

/// A validated latitude/longitude pair.
///
/// Construction through [`Coordinate::new`] is the only way values enter the
/// system, so every coordinate that reaches a network call is already known
/// to be in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lon: f64,
}

impl Coordinate {
    /// Validate and create a coordinate pair
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(WeatherServiceError::validation(format!(
                "Latitude must be between -90 and 90, got: {lat}"
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(WeatherServiceError::validation(format!(
                "Longitude must be between -180 and 180, got: {lon}"
            )));
        }
        Ok(Self { lat, lon })
    }

    /// Round both components to 3 decimal places, coalescing near-duplicate
    /// queries before they become request or cache keys.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            lat: (self.lat * 1000.0).round() / 1000.0,
            lon: (self.lon * 1000.0).round() / 1000.0,
        }
    }

    /// Cache/request key in `"lat,lon"` form
    #[must_use]
    pub fn key(&self) -> String {
        format!("{},{}", self.lat, self.lon)
    }
}

/// The user's chosen location, as persisted by the location store.
///
/// Superseded (never mutated in place) on every location change; exactly one
/// "current" instance exists per process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherLocation {
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lon: f64,
    /// Human-readable label, when one was resolved
    pub city_name: Option<String>,
    /// Epoch millis of the last persisted write
    #[serde(default)]
    pub last_updated: i64,
}

impl WeatherLocation {
    /// Create a location from a validated coordinate
    #[must_use]
    pub fn new(coordinate: Coordinate, city_name: Option<String>) -> Self {
        Self {
            lat: coordinate.lat,
            lon: coordinate.lon,
            city_name,
            last_updated: 0,
        }
    }

    /// The location's coordinate pair
    #[must_use]
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

/// One candidate match from an address search or reverse lookup.
///
/// Ephemeral: produced per call, ranked, returned, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingResult {
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lon: f64,
    /// Full display label, most specific first
    pub display_name: String,
    /// Resolved city/town, when available
    pub city: Option<String>,
    /// Resolved state/region, when available
    pub state: Option<String>,
    /// Resolved country, when available
    pub country: Option<String>,
    /// Postal code, when available
    pub postcode: Option<String>,
    /// Provider-specific result type (e.g. "city", "administrative")
    pub kind: Option<String>,
    /// Provider relevance score, higher is better
    pub importance: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(51.5074, -0.1278).is_ok());
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());

        assert!(matches!(
            Coordinate::new(90.1, 0.0),
            Err(WeatherServiceError::Validation(_))
        ));
        assert!(matches!(
            Coordinate::new(0.0, -180.5),
            Err(WeatherServiceError::Validation(_))
        ));
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_coordinate_rounding_and_key() {
        let coord = Coordinate::new(51.507_456, -0.127_849).unwrap();
        let rounded = coord.rounded();
        assert_eq!(rounded.lat, 51.507);
        assert_eq!(rounded.lon, -0.128);
        assert_eq!(rounded.key(), "51.507,-0.128");
    }

    #[test]
    fn test_near_duplicates_share_a_key() {
        let a = Coordinate::new(48.856_61, 2.352_21).unwrap();
        let b = Coordinate::new(48.856_64, 2.352_24).unwrap();
        assert_eq!(a.rounded().key(), b.rounded().key());
    }
}
