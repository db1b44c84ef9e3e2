//! Normalized weather snapshot types
//!
//! A [`DetailedWeatherData`] is built once per successful fetch and never
//! mutated afterwards (the orchestrator re-stamps the display label on its
//! own clone before caching).

use crate::aqi::{calculate_aqi, AqiLevel};
use serde::{Deserialize, Serialize};

/// Complete normalized weather snapshot for one coordinate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedWeatherData {
    /// Instant conditions
    pub current: CurrentConditions,
    /// Pollutant concentrations and derived AQI
    pub air_quality: AirQualityData,
    /// Sunrise/sunset for the current day
    pub sun: SunTimes,
    /// Hourly series, at most 24 entries
    pub hourly: Vec<HourlyEntry>,
    /// Daily series, at most 7 entries
    pub daily: Vec<DailyEntry>,
    /// IANA timezone name reported by the provider
    pub timezone: String,
    /// Elevation in meters
    pub elevation: f64,
    /// Epoch millis at which this snapshot was built
    pub last_updated: i64,
}

/// Instant conditions, merged from the provider's current-weather block and
/// hour zero of the hourly series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentConditions {
    /// Display label for the coordinate
    pub location: String,
    /// Temperature in °C
    pub temperature: i32,
    /// Apparent temperature in °C
    pub feels_like: i32,
    /// Relative humidity in percent
    pub humidity: i32,
    /// Dew point in °C
    pub dew_point: i32,
    /// Surface pressure in hPa
    pub pressure: i32,
    /// Cloud cover in percent
    pub cloud_cover: i32,
    /// Wind speed in km/h, one decimal
    pub wind_speed: f64,
    /// Wind direction in degrees
    pub wind_direction: i32,
    /// UV index, one decimal
    pub uv_index: f64,
    /// Visibility in km, one decimal
    pub visibility_km: f64,
    /// WMO condition code
    pub weather_code: i32,
    /// Human-readable condition
    pub description: String,
    /// Symbolic icon id
    pub icon: String,
    /// Daylight flag from the provider
    pub is_day: bool,
}

/// Pollutant concentrations plus the derived AQI.
///
/// `aqi` and `aqi_level` are always consistent with `pm25`; construct through
/// [`AirQualityData::from_concentrations`] rather than filling fields by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirQualityData {
    /// PM2.5 in μg/m³
    pub pm25: f64,
    /// PM10 in μg/m³
    pub pm10: f64,
    /// Carbon monoxide in μg/m³
    pub carbon_monoxide: f64,
    /// Nitrogen dioxide in μg/m³
    pub nitrogen_dioxide: f64,
    /// Ozone in μg/m³
    pub ozone: f64,
    /// Sulphur dioxide in μg/m³
    pub sulphur_dioxide: f64,
    /// Aerosol optical depth (dimensionless)
    pub aerosol_optical_depth: f64,
    /// Dust in μg/m³
    pub dust: f64,
    /// Ammonia in μg/m³
    pub ammonia: f64,
    /// US EPA Air Quality Index derived from `pm25`
    pub aqi: u16,
    /// Qualitative band for `aqi`
    pub aqi_level: AqiLevel,
}

/// Raw pollutant inputs for [`AirQualityData::from_concentrations`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PollutantConcentrations {
    pub pm25: f64,
    pub pm10: f64,
    pub carbon_monoxide: f64,
    pub nitrogen_dioxide: f64,
    pub ozone: f64,
    pub sulphur_dioxide: f64,
    pub aerosol_optical_depth: f64,
    pub dust: f64,
    pub ammonia: f64,
}

impl AirQualityData {
    /// Build air-quality data, deriving the AQI from the PM2.5 concentration
    #[must_use]
    pub fn from_concentrations(c: PollutantConcentrations) -> Self {
        let aqi = calculate_aqi(c.pm25);
        Self {
            pm25: c.pm25,
            pm10: c.pm10,
            carbon_monoxide: c.carbon_monoxide,
            nitrogen_dioxide: c.nitrogen_dioxide,
            ozone: c.ozone,
            sulphur_dioxide: c.sulphur_dioxide,
            aerosol_optical_depth: c.aerosol_optical_depth,
            dust: c.dust,
            ammonia: c.ammonia,
            aqi,
            aqi_level: AqiLevel::from_aqi(aqi),
        }
    }

    /// All-zero pollutants; used when the air-quality endpoint fails
    #[must_use]
    pub fn unavailable() -> Self {
        Self::from_concentrations(PollutantConcentrations::default())
    }
}

/// Sunrise/sunset timestamps in provider-local ISO 8601
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SunTimes {
    pub sunrise: String,
    pub sunset: String,
}

/// One hour of forecast data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyEntry {
    /// ISO 8601 local timestamp
    pub time: String,
    /// Temperature in °C
    pub temperature: i32,
    /// Apparent temperature in °C
    pub feels_like: i32,
    /// Relative humidity in percent
    pub humidity: i32,
    /// Precipitation probability in percent
    pub precipitation_probability: i32,
    /// Wind speed in km/h, one decimal
    pub wind_speed: f64,
    /// WMO condition code
    pub weather_code: i32,
    /// Human-readable condition
    pub description: String,
    /// Symbolic icon id
    pub icon: String,
    /// Daylight flag
    pub is_day: bool,
}

/// One day of forecast data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyEntry {
    /// ISO 8601 date
    pub date: String,
    /// Daily maximum temperature in °C
    pub temp_max: i32,
    /// Daily minimum temperature in °C
    pub temp_min: i32,
    /// WMO condition code
    pub weather_code: i32,
    /// Human-readable condition
    pub description: String,
    /// Symbolic icon id
    pub icon: String,
    /// Sunrise, ISO 8601 local
    pub sunrise: String,
    /// Sunset, ISO 8601 local
    pub sunset: String,
    /// Daily maximum UV index, one decimal
    pub uv_index_max: f64,
    /// Daily maximum precipitation probability in percent
    pub precipitation_probability_max: i32,
    /// Daily maximum wind speed in km/h, one decimal
    pub wind_speed_max: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aqi_is_derived_from_pm25() {
        let data = AirQualityData::from_concentrations(PollutantConcentrations {
            pm25: 35.4,
            ..Default::default()
        });
        assert_eq!(data.aqi, 100);
        assert_eq!(data.aqi_level, AqiLevel::Moderate);
    }

    #[test]
    fn test_unavailable_is_all_zero_and_good() {
        let data = AirQualityData::unavailable();
        assert_eq!(data.pm25, 0.0);
        assert_eq!(data.ammonia, 0.0);
        assert_eq!(data.aqi, 0);
        assert_eq!(data.aqi_level, AqiLevel::Good);
    }
}
