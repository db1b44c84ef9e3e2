//! Weather provider client for the Open-Meteo APIs
//!
//! Fetches the forecast and air-quality endpoints concurrently, validates the
//! forecast payload shape, and normalizes both into a [`DetailedWeatherData`]
//! snapshot. Forecast failure is fatal to the call; air-quality failure only
//! zeroes the pollutant fields.

use crate::config::ProviderConfig;
use crate::error::{Result, WeatherServiceError};
use crate::models::weather::PollutantConcentrations;
use crate::models::{
    AirQualityData, Coordinate, CurrentConditions, DailyEntry, DetailedWeatherData, HourlyEntry,
    SunTimes,
};
use crate::weather_code;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::time::Duration;
use sunrise::{Coordinates, SolarDay, SolarEvent};
use tracing::{debug, info, instrument, warn};

/// Hourly fields requested from the forecast endpoint
const HOURLY_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,\
precipitation_probability,weather_code,surface_pressure,cloud_cover,visibility,\
wind_speed_10m,wind_direction_10m,uv_index,dew_point_2m,is_day";

/// Daily fields requested from the forecast endpoint
const DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min,sunrise,sunset,\
uv_index_max,precipitation_probability_max,wind_speed_10m_max";

/// Hourly fields requested from the air-quality endpoint
const AIR_QUALITY_FIELDS: &str = "pm2_5,pm10,carbon_monoxide,nitrogen_dioxide,ozone,\
sulphur_dioxide,aerosol_optical_depth,dust,ammonia";

/// Named default-fill values applied during normalization
const DEFAULT_PRESSURE_HPA: f64 = 1013.0;
const DEFAULT_VISIBILITY_M: f64 = 10_000.0;

const MAX_HOURLY_ENTRIES: usize = 24;
const MAX_DAILY_ENTRIES: usize = 7;

/// Named reference points for labelling coordinates without a stored city
/// name. Matched by nearest neighbor within 0.1° (Euclidean in degrees).
const REFERENCE_POINTS: [(&str, f64, f64); 12] = [
    ("Berlin", 52.520, 13.405),
    ("London", 51.507, -0.128),
    ("Paris", 48.857, 2.352),
    ("New York", 40.713, -74.006),
    ("Los Angeles", 34.052, -118.244),
    ("Tokyo", 35.677, 139.650),
    ("Shanghai", 31.230, 121.474),
    ("Singapore", 1.352, 103.820),
    ("Sydney", -33.869, 151.209),
    ("Moscow", 55.756, 37.617),
    ("Dubai", 25.205, 55.271),
    ("São Paulo", -23.551, -46.633),
];

const REFERENCE_MATCH_RADIUS_DEG: f64 = 0.1;

/// Source of normalized weather snapshots
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Fetch and normalize a complete snapshot for one coordinate
    async fn fetch_detailed(&self, coord: Coordinate) -> Result<DetailedWeatherData>;
}

/// HTTP client for the Open-Meteo forecast and air-quality APIs
pub struct OpenMeteoClient {
    client: Client,
    forecast_url: String,
    air_quality_url: String,
}

impl OpenMeteoClient {
    /// Create a client with the configured per-request deadline
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("StandbyWeather/0.1.0")
            .build()
            .map_err(|e| WeatherServiceError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            forecast_url: config.forecast_url.clone(),
            air_quality_url: config.air_quality_url.clone(),
        })
    }

    /// Fetch the raw forecast payload. Fatal on any failure.
    async fn fetch_forecast(&self, coord: Coordinate) -> Result<open_meteo::ForecastResponse> {
        let url = format!(
            "{}?latitude={}&longitude={}&current_weather=true&hourly={}&daily={}&timezone=auto",
            self.forecast_url, coord.lat, coord.lon, HOURLY_FIELDS, DAILY_FIELDS
        );
        debug!(%url, "Requesting forecast");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(WeatherServiceError::Network(format!(
                "Forecast request failed with status {}",
                response.status()
            )));
        }

        let payload: open_meteo::ForecastResponse = response
            .json()
            .await
            .map_err(|e| WeatherServiceError::shape(format!("Forecast payload undecodable: {e}")))?;

        Ok(payload)
    }

    /// Fetch the raw air-quality payload. Non-fatal: every failure is logged
    /// and collapsed into `None` so pollutant fields default to zero.
    async fn fetch_air_quality(&self, coord: Coordinate) -> Option<open_meteo::AirQualityResponse> {
        let url = format!(
            "{}?latitude={}&longitude={}&hourly={}&timezone=auto",
            self.air_quality_url, coord.lat, coord.lon, AIR_QUALITY_FIELDS
        );
        debug!(%url, "Requesting air quality");

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(lat = coord.lat, lon = coord.lon, "Air quality request failed: {e}");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(
                lat = coord.lat,
                lon = coord.lon,
                status = %response.status(),
                "Air quality request rejected"
            );
            return None;
        }

        match response.json::<open_meteo::AirQualityResponse>().await {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(lat = coord.lat, lon = coord.lon, "Air quality payload undecodable: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    #[instrument(skip(self), fields(lat = coord.lat, lon = coord.lon))]
    async fn fetch_detailed(&self, coord: Coordinate) -> Result<DetailedWeatherData> {
        // Round before the request so near-duplicate coordinates coalesce
        // into identical upstream queries.
        let coord = coord.rounded();

        let (forecast, air_quality) =
            futures::join!(self.fetch_forecast(coord), self.fetch_air_quality(coord));
        let forecast = forecast?;

        let data = normalize(coord, &forecast, air_quality.as_ref())?;
        info!(
            hourly = data.hourly.len(),
            daily = data.daily.len(),
            aqi = data.air_quality.aqi,
            "Weather snapshot assembled"
        );
        Ok(data)
    }
}

/// Raw Open-Meteo API response structures
mod open_meteo {
    use serde::Deserialize;

    /// Forecast response; `hourly`/`daily` hold parallel arrays keyed by
    /// field name, one entry per array index per timestamp
    #[derive(Debug, Default, Deserialize)]
    pub struct ForecastResponse {
        pub timezone: Option<String>,
        pub elevation: Option<f64>,
        pub current_weather: Option<CurrentWeatherBlock>,
        pub hourly: Option<HourlyBlock>,
        pub daily: Option<DailyBlock>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct CurrentWeatherBlock {
        pub temperature: Option<f64>,
        pub windspeed: Option<f64>,
        pub winddirection: Option<f64>,
        pub weathercode: Option<i32>,
        pub is_day: Option<i32>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct HourlyBlock {
        #[serde(default)]
        pub time: Vec<String>,
        pub temperature_2m: Option<Vec<Option<f64>>>,
        pub relative_humidity_2m: Option<Vec<Option<f64>>>,
        pub apparent_temperature: Option<Vec<Option<f64>>>,
        pub precipitation_probability: Option<Vec<Option<f64>>>,
        pub weather_code: Option<Vec<Option<i32>>>,
        pub surface_pressure: Option<Vec<Option<f64>>>,
        pub cloud_cover: Option<Vec<Option<f64>>>,
        pub visibility: Option<Vec<Option<f64>>>,
        pub wind_speed_10m: Option<Vec<Option<f64>>>,
        pub wind_direction_10m: Option<Vec<Option<f64>>>,
        pub uv_index: Option<Vec<Option<f64>>>,
        pub dew_point_2m: Option<Vec<Option<f64>>>,
        pub is_day: Option<Vec<Option<i32>>>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct DailyBlock {
        #[serde(default)]
        pub time: Vec<String>,
        pub weather_code: Option<Vec<Option<i32>>>,
        pub temperature_2m_max: Option<Vec<Option<f64>>>,
        pub temperature_2m_min: Option<Vec<Option<f64>>>,
        pub sunrise: Option<Vec<Option<String>>>,
        pub sunset: Option<Vec<Option<String>>>,
        pub uv_index_max: Option<Vec<Option<f64>>>,
        pub precipitation_probability_max: Option<Vec<Option<f64>>>,
        pub wind_speed_10m_max: Option<Vec<Option<f64>>>,
    }

    /// Air-quality response from the separate host
    #[derive(Debug, Default, Deserialize)]
    pub struct AirQualityResponse {
        pub hourly: Option<AirQualityHourly>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct AirQualityHourly {
        pub pm2_5: Option<Vec<Option<f64>>>,
        pub pm10: Option<Vec<Option<f64>>>,
        pub carbon_monoxide: Option<Vec<Option<f64>>>,
        pub nitrogen_dioxide: Option<Vec<Option<f64>>>,
        pub ozone: Option<Vec<Option<f64>>>,
        pub sulphur_dioxide: Option<Vec<Option<f64>>>,
        pub aerosol_optical_depth: Option<Vec<Option<f64>>>,
        pub dust: Option<Vec<Option<f64>>>,
        pub ammonia: Option<Vec<Option<f64>>>,
    }
}

/// Read one sample from a parallel array, filling the named default for a
/// missing series, index, or value
fn sample(series: &Option<Vec<Option<f64>>>, idx: usize, default: f64) -> f64 {
    series
        .as_ref()
        .and_then(|values| values.get(idx).copied().flatten())
        .unwrap_or(default)
}

fn sample_code(series: &Option<Vec<Option<i32>>>, idx: usize) -> i32 {
    series
        .as_ref()
        .and_then(|values| values.get(idx).copied().flatten())
        .unwrap_or(0)
}

fn sample_string(series: &Option<Vec<Option<String>>>, idx: usize) -> Option<String> {
    series
        .as_ref()
        .and_then(|values| values.get(idx).cloned().flatten())
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn as_int(value: f64) -> i32 {
    value.round() as i32
}

/// Strict decode of the raw payloads into the normalized snapshot.
///
/// Missing required sections raise [`WeatherServiceError::UpstreamShape`];
/// missing individual values fall back to named defaults so a partially
/// populated response never propagates NaN or nulls downstream.
fn normalize(
    coord: Coordinate,
    forecast: &open_meteo::ForecastResponse,
    air_quality: Option<&open_meteo::AirQualityResponse>,
) -> Result<DetailedWeatherData> {
    let current_block = forecast
        .current_weather
        .as_ref()
        .ok_or_else(|| WeatherServiceError::shape("missing current_weather section"))?;
    let hourly_block = forecast
        .hourly
        .as_ref()
        .ok_or_else(|| WeatherServiceError::shape("missing hourly section"))?;
    let daily_block = forecast
        .daily
        .as_ref()
        .ok_or_else(|| WeatherServiceError::shape("missing daily section"))?;

    let hourly = normalize_hourly(hourly_block);
    let daily = normalize_daily(daily_block, coord);

    // The upstream API splits instantaneous fields across two sections:
    // condition/wind come from the current-weather block, the rest from
    // hour zero of the hourly series.
    let code = current_block
        .weathercode
        .unwrap_or_else(|| sample_code(&hourly_block.weather_code, 0));
    let entry = weather_code::describe(code);

    let current = CurrentConditions {
        location: location_label(coord),
        temperature: as_int(
            current_block
                .temperature
                .unwrap_or_else(|| sample(&hourly_block.temperature_2m, 0, 0.0)),
        ),
        feels_like: as_int(sample(&hourly_block.apparent_temperature, 0, 0.0)),
        humidity: as_int(sample(&hourly_block.relative_humidity_2m, 0, 0.0)),
        dew_point: as_int(sample(&hourly_block.dew_point_2m, 0, 0.0)),
        pressure: as_int(sample(
            &hourly_block.surface_pressure,
            0,
            DEFAULT_PRESSURE_HPA,
        )),
        cloud_cover: as_int(sample(&hourly_block.cloud_cover, 0, 0.0)),
        wind_speed: round1(
            current_block
                .windspeed
                .unwrap_or_else(|| sample(&hourly_block.wind_speed_10m, 0, 0.0)),
        ),
        wind_direction: as_int(
            current_block
                .winddirection
                .unwrap_or_else(|| sample(&hourly_block.wind_direction_10m, 0, 0.0)),
        ),
        uv_index: round1(sample(&hourly_block.uv_index, 0, 0.0)),
        visibility_km: round1(sample(&hourly_block.visibility, 0, DEFAULT_VISIBILITY_M) / 1000.0),
        weather_code: code,
        description: entry.description.to_string(),
        icon: entry.icon.to_string(),
        is_day: current_block.is_day.unwrap_or(1) != 0,
    };

    let sun = match daily.first() {
        Some(day) if !day.sunrise.is_empty() && !day.sunset.is_empty() => SunTimes {
            sunrise: day.sunrise.clone(),
            sunset: day.sunset.clone(),
        },
        _ => computed_sun_times(coord),
    };

    Ok(DetailedWeatherData {
        current,
        air_quality: normalize_air_quality(air_quality),
        sun,
        hourly,
        daily,
        timezone: forecast.timezone.clone().unwrap_or_else(|| "UTC".to_string()),
        elevation: forecast.elevation.unwrap_or(0.0),
        last_updated: Utc::now().timestamp_millis(),
    })
}

fn normalize_hourly(block: &open_meteo::HourlyBlock) -> Vec<HourlyEntry> {
    block
        .time
        .iter()
        .take(MAX_HOURLY_ENTRIES)
        .enumerate()
        .map(|(i, time)| {
            let code = sample_code(&block.weather_code, i);
            let entry = weather_code::describe(code);
            HourlyEntry {
                time: time.clone(),
                temperature: as_int(sample(&block.temperature_2m, i, 0.0)),
                feels_like: as_int(sample(&block.apparent_temperature, i, 0.0)),
                humidity: as_int(sample(&block.relative_humidity_2m, i, 0.0)),
                precipitation_probability: as_int(sample(&block.precipitation_probability, i, 0.0)),
                wind_speed: round1(sample(&block.wind_speed_10m, i, 0.0)),
                weather_code: code,
                description: entry.description.to_string(),
                icon: entry.icon.to_string(),
                is_day: block
                    .is_day
                    .as_ref()
                    .and_then(|v| v.get(i).copied().flatten())
                    .unwrap_or(1)
                    != 0,
            }
        })
        .collect()
}

fn normalize_daily(block: &open_meteo::DailyBlock, coord: Coordinate) -> Vec<DailyEntry> {
    let computed = computed_sun_times(coord);
    block
        .time
        .iter()
        .take(MAX_DAILY_ENTRIES)
        .enumerate()
        .map(|(i, date)| {
            let code = sample_code(&block.weather_code, i);
            let entry = weather_code::describe(code);
            DailyEntry {
                date: date.clone(),
                temp_max: as_int(sample(&block.temperature_2m_max, i, 0.0)),
                temp_min: as_int(sample(&block.temperature_2m_min, i, 0.0)),
                weather_code: code,
                description: entry.description.to_string(),
                icon: entry.icon.to_string(),
                sunrise: sample_string(&block.sunrise, i).unwrap_or_else(|| computed.sunrise.clone()),
                sunset: sample_string(&block.sunset, i).unwrap_or_else(|| computed.sunset.clone()),
                uv_index_max: round1(sample(&block.uv_index_max, i, 0.0)),
                precipitation_probability_max: as_int(sample(
                    &block.precipitation_probability_max,
                    i,
                    0.0,
                )),
                wind_speed_max: round1(sample(&block.wind_speed_10m_max, i, 0.0)),
            }
        })
        .collect()
}

fn normalize_air_quality(payload: Option<&open_meteo::AirQualityResponse>) -> AirQualityData {
    let Some(hourly) = payload.and_then(|p| p.hourly.as_ref()) else {
        return AirQualityData::unavailable();
    };

    AirQualityData::from_concentrations(PollutantConcentrations {
        pm25: sample(&hourly.pm2_5, 0, 0.0),
        pm10: sample(&hourly.pm10, 0, 0.0),
        carbon_monoxide: sample(&hourly.carbon_monoxide, 0, 0.0),
        nitrogen_dioxide: sample(&hourly.nitrogen_dioxide, 0, 0.0),
        ozone: sample(&hourly.ozone, 0, 0.0),
        sulphur_dioxide: sample(&hourly.sulphur_dioxide, 0, 0.0),
        aerosol_optical_depth: sample(&hourly.aerosol_optical_depth, 0, 0.0),
        dust: sample(&hourly.dust, 0, 0.0),
        ammonia: sample(&hourly.ammonia, 0, 0.0),
    })
}

/// Label a coordinate: nearest reference point within 0.1° (Euclidean in
/// degrees), otherwise formatted degrees.
pub(crate) fn location_label(coord: Coordinate) -> String {
    let mut best: Option<(&str, f64)> = None;
    for (name, lat, lon) in REFERENCE_POINTS {
        let distance = ((coord.lat - lat).powi(2) + (coord.lon - lon).powi(2)).sqrt();
        if distance <= REFERENCE_MATCH_RADIUS_DEG
            && best.map_or(true, |(_, d)| distance < d)
        {
            best = Some((name, distance));
        }
    }

    match best {
        Some((name, _)) => name.to_string(),
        None => format!("{:.3}°N, {:.3}°E", coord.lat, coord.lon),
    }
}

/// Compute sunrise/sunset for today when the provider omits them.
///
/// `event_time` yields no value during polar day/night; fixed 06:00/18:00
/// times stand in so the fields are never empty.
pub(crate) fn computed_sun_times(coord: Coordinate) -> SunTimes {
    let today = Utc::now().date_naive();
    match Coordinates::new(coord.lat, coord.lon) {
        Some(coordinates) => {
            let solar_day = SolarDay::new(coordinates, today);
            SunTimes {
                sunrise: solar_day
                    .event_time(SolarEvent::Sunrise)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| format!("{today}T06:00:00+00:00")),
                sunset: solar_day
                    .event_time(SolarEvent::Sunset)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| format!("{today}T18:00:00+00:00")),
            }
        }
        None => SunTimes {
            sunrise: format!("{today}T06:00:00+00:00"),
            sunset: format!("{today}T18:00:00+00:00"),
        },
    }
}
