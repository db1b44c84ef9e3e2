//! US EPA Air Quality Index calculation from PM2.5 concentration
//!
//! Pure, deterministic, table-driven. Expected values may be confirmed using
//! the calculator at <https://www.airnow.gov/aqi/aqi-calculator-concentration/>

use serde::{Deserialize, Serialize};

// PM2.5 concentration breakpoints (μg/m³)
const PM25_BREAKPOINTS: [(f64, f64); 6] = [
    (0.0, 12.0),    // Good
    (12.1, 35.4),   // Moderate
    (35.5, 55.4),   // Unhealthy for Sensitive Groups
    (55.5, 150.4),  // Unhealthy
    (150.5, 250.4), // Very Unhealthy
    (250.5, 500.4), // Hazardous
];

// AQI values corresponding to the concentration breakpoints
const AQI_BREAKPOINTS: [(u16, u16); 6] = [
    (0, 50),
    (51, 100),
    (101, 150),
    (151, 200),
    (201, 300),
    (301, 500),
];

/// Calculate the AQI for a PM2.5 concentration in μg/m³.
///
/// Performs linear interpolation within the matching EPA band:
/// `AQI = ((AQIhigh - AQIlow) / (Chigh - Clow)) * (C - Clow) + AQIlow`.
/// Concentrations above the highest band saturate to 500 instead of erroring;
/// negative inputs are treated as 0.
#[must_use]
pub fn calculate_aqi(pm25: f64) -> u16 {
    let pm25 = pm25.max(0.0);

    for i in 0..PM25_BREAKPOINTS.len() {
        let (pm_low, pm_high) = PM25_BREAKPOINTS[i];
        if pm25 <= pm_high {
            let (aqi_low, aqi_high) = AQI_BREAKPOINTS[i];
            // Clamp below the band floor so reported concentrations that fall
            // into the rounding gap between bands (e.g. 12.05) still map in.
            let c = pm25.max(pm_low);
            let aqi = (f64::from(aqi_high - aqi_low) / (pm_high - pm_low)) * (c - pm_low)
                + f64::from(aqi_low);
            return aqi.round() as u16;
        }
    }

    500
}

/// Qualitative band for an AQI value, per the EPA's six named levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AqiLevel {
    Good,
    Moderate,
    UnhealthyForSensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiLevel {
    /// Map an AQI value to its qualitative band
    #[must_use]
    pub fn from_aqi(aqi: u16) -> Self {
        match aqi {
            0..=50 => Self::Good,
            51..=100 => Self::Moderate,
            101..=150 => Self::UnhealthyForSensitive,
            151..=200 => Self::Unhealthy,
            201..=300 => Self::VeryUnhealthy,
            _ => Self::Hazardous,
        }
    }

    /// Human-readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::UnhealthyForSensitive => "Unhealthy for Sensitive Groups",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very Unhealthy",
            Self::Hazardous => "Hazardous",
        }
    }
}

impl std::fmt::Display for AqiLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0)]
    #[case(12.0, 50)]
    #[case(12.1, 51)]
    #[case(35.4, 100)]
    #[case(35.5, 101)]
    #[case(55.4, 150)]
    #[case(55.5, 151)]
    #[case(150.4, 200)]
    #[case(150.5, 201)]
    #[case(250.4, 300)]
    #[case(250.5, 301)]
    #[case(500.4, 500)]
    fn test_band_boundaries(#[case] pm25: f64, #[case] expected: u16) {
        assert_eq!(calculate_aqi(pm25), expected);
    }

    #[rstest]
    #[case(7.0, 29)]
    #[case(41.0, 115)]
    #[case(90.0, 169)]
    fn test_interior_values(#[case] pm25: f64, #[case] expected: u16) {
        assert_eq!(calculate_aqi(pm25), expected);
    }

    #[test]
    fn test_saturates_above_top_band() {
        assert_eq!(calculate_aqi(600.0), 500);
        assert_eq!(calculate_aqi(10_000.0), 500);
    }

    #[test]
    fn test_negative_treated_as_zero() {
        assert_eq!(calculate_aqi(-3.0), 0);
    }

    #[test]
    fn test_gap_between_bands_maps_to_upper_band_floor() {
        assert_eq!(calculate_aqi(12.05), 51);
    }

    #[test]
    fn test_monotonic_non_decreasing() {
        let samples = [
            0.0, 5.0, 12.0, 12.1, 20.0, 35.4, 35.5, 55.4, 55.5, 100.0, 150.4, 150.5, 200.0, 250.4,
            250.5, 400.0, 500.4, 600.0,
        ];
        let mut previous = 0;
        for pm25 in samples {
            let aqi = calculate_aqi(pm25);
            assert!(aqi >= previous, "AQI decreased at pm25={pm25}");
            previous = aqi;
        }
    }

    #[rstest]
    #[case(0, AqiLevel::Good)]
    #[case(50, AqiLevel::Good)]
    #[case(51, AqiLevel::Moderate)]
    #[case(100, AqiLevel::Moderate)]
    #[case(101, AqiLevel::UnhealthyForSensitive)]
    #[case(150, AqiLevel::UnhealthyForSensitive)]
    #[case(151, AqiLevel::Unhealthy)]
    #[case(200, AqiLevel::Unhealthy)]
    #[case(201, AqiLevel::VeryUnhealthy)]
    #[case(300, AqiLevel::VeryUnhealthy)]
    #[case(301, AqiLevel::Hazardous)]
    #[case(500, AqiLevel::Hazardous)]
    fn test_levels(#[case] aqi: u16, #[case] expected: AqiLevel) {
        assert_eq!(AqiLevel::from_aqi(aqi), expected);
    }
}
