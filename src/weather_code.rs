//! WMO weather condition code lookup
//!
//! See <https://open-meteo.com/en/docs#weathervariables> for the code table.

/// Description and symbolic icon id for one condition code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherCode {
    pub description: &'static str,
    pub icon: &'static str,
}

/// Sentinel returned for any code missing from the table
pub const UNKNOWN: WeatherCode = WeatherCode {
    description: "Unknown",
    icon: "unknown",
};

/// Map a WMO condition code to a description and icon id.
///
/// Never fails: unknown codes resolve to the [`UNKNOWN`] sentinel.
#[must_use]
pub fn describe(code: i32) -> WeatherCode {
    let (description, icon) = match code {
        0 => ("Clear sky", "sun"),
        1 => ("Mainly clear", "sun"),
        2 => ("Partly cloudy", "cloud_sun"),
        3 => ("Overcast", "cloud"),
        45 => ("Fog", "cloud_fog"),
        48 => ("Depositing rime fog", "cloud_fog"),
        51 => ("Light drizzle", "cloud_drizzle"),
        53 => ("Moderate drizzle", "cloud_drizzle"),
        55 => ("Dense drizzle", "cloud_drizzle"),
        56 => ("Light freezing drizzle", "cloud_sleet"),
        57 => ("Dense freezing drizzle", "cloud_sleet"),
        61 => ("Slight rain", "cloud_rain"),
        63 => ("Moderate rain", "cloud_rain"),
        65 => ("Heavy rain", "cloud_rain"),
        66 => ("Light freezing rain", "cloud_sleet"),
        67 => ("Heavy freezing rain", "cloud_sleet"),
        71 => ("Slight snow fall", "cloud_snow"),
        73 => ("Moderate snow fall", "cloud_snow"),
        75 => ("Heavy snow fall", "cloud_snow"),
        77 => ("Snow grains", "cloud_snow"),
        80 => ("Slight rain showers", "cloud_rain"),
        81 => ("Moderate rain showers", "cloud_rain"),
        82 => ("Violent rain showers", "cloud_rain"),
        85 => ("Slight snow showers", "cloud_snow"),
        86 => ("Heavy snow showers", "cloud_snow"),
        95 => ("Thunderstorm", "cloud_lightning"),
        96 => ("Thunderstorm with slight hail", "cloud_lightning"),
        99 => ("Thunderstorm with heavy hail", "cloud_lightning"),
        _ => return UNKNOWN,
    };
    WeatherCode { description, icon }
}
