//! Weather cache & retry orchestrator
//!
//! Top-level entry point of the crate: resolves effective coordinates,
//! serves cached data within the TTL, fetches through the provider client
//! with retry/backoff on a miss, and degrades to stale or synthetic data on
//! persistent failure. Callers only ever see a structurally valid snapshot;
//! the single caller-visible error is `Validation` for malformed input.

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::location::{LocationService, SettingsStore};
use crate::models::{
    AirQualityData, Coordinate, CurrentConditions, DailyEntry, DetailedWeatherData, HourlyEntry,
};
use crate::provider::{computed_sun_times, location_label, OpenMeteoClient, WeatherProvider};
use crate::retry::{linear, with_retry};
use crate::weather_code;
use chrono::{Timelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// A cached snapshot; at most one exists per process
struct CachedDetailedWeatherData {
    data: DetailedWeatherData,
    stored_at: Instant,
    key: String,
}

/// Location-aware weather service with caching, retries, and degradation
pub struct WeatherService {
    provider: Arc<dyn WeatherProvider>,
    location: Arc<LocationService>,
    cache: Mutex<Option<CachedDetailedWeatherData>>,
    /// Drained lazily before each cache check; any pending change event
    /// invalidates the cache
    location_changes: Mutex<broadcast::Receiver<()>>,
    ttl: Duration,
    max_attempts: u32,
    backoff_step: Duration,
}

impl WeatherService {
    /// Assemble the service from parts (used by tests and custom hosts)
    pub fn new(
        config: &ServiceConfig,
        provider: Arc<dyn WeatherProvider>,
        location: Arc<LocationService>,
    ) -> Self {
        let location_changes = Mutex::new(location.subscribe());
        Self {
            provider,
            location,
            cache: Mutex::new(None),
            location_changes,
            ttl: Duration::from_secs(config.cache.ttl_minutes * 60),
            max_attempts: config.retry.max_attempts,
            backoff_step: Duration::from_millis(config.retry.backoff_step_ms),
        }
    }

    /// Assemble the service with the real Open-Meteo client over the given
    /// settings store
    pub fn from_config(config: &ServiceConfig, store: Arc<dyn SettingsStore>) -> Result<Self> {
        let provider = Arc::new(OpenMeteoClient::new(&config.provider)?);
        let location = Arc::new(LocationService::new(store, &config.default_location));
        Ok(Self::new(config, provider, location))
    }

    /// The location service backing this orchestrator; hosts use it to set,
    /// clear, and observe the user's chosen location
    #[must_use]
    pub fn location_service(&self) -> Arc<LocationService> {
        Arc::clone(&self.location)
    }

    /// Fetch a complete weather snapshot for the given coordinates, or for
    /// the stored/default location when none are given.
    ///
    /// Never fails under normal operation: provider errors degrade to a
    /// stale cache entry or synthetic data. The only `Err` is `Validation`
    /// for out-of-range explicit coordinates.
    #[instrument(skip(self))]
    pub async fn get_detailed_weather(
        &self,
        coords: Option<(f64, f64)>,
    ) -> Result<DetailedWeatherData> {
        let coord = self.resolve_coordinates(coords).await?;
        let key = coord.key();

        self.drain_location_changes().await;

        if let Some(fresh) = self.cached_fresh(&key).await {
            debug!(key, "Serving cached weather");
            return Ok(fresh);
        }

        let fetched = with_retry(self.max_attempts, linear(self.backoff_step), |attempt| {
            debug!(attempt, lat = coord.lat, lon = coord.lon, "Fetching weather");
            self.provider.fetch_detailed(coord)
        })
        .await;

        match fetched {
            Ok(mut data) => {
                self.stamp_location_name(&mut data).await;
                let mut cache = self.cache.lock().await;
                *cache = Some(CachedDetailedWeatherData {
                    data: data.clone(),
                    stored_at: Instant::now(),
                    key,
                });
                Ok(data)
            }
            Err(e) => {
                error!(
                    lat = coord.lat,
                    lon = coord.lon,
                    attempts = self.max_attempts,
                    "Weather fetch failed after all attempts: {e}"
                );
                Ok(self.degraded_snapshot(coord, &key).await)
            }
        }
    }

    /// Drop the cached snapshot; the next call fetches fresh data
    pub async fn invalidate_cache(&self) {
        *self.cache.lock().await = None;
    }

    /// Effective coordinates: explicit args, then the stored location, then
    /// the configured default, each fallback logged at decreasing confidence
    async fn resolve_coordinates(&self, coords: Option<(f64, f64)>) -> Result<Coordinate> {
        if let Some((lat, lon)) = coords {
            let coord = Coordinate::new(lat, lon)?;
            debug!(lat, lon, "Using explicit coordinates");
            return Ok(coord);
        }

        if let Some(stored) = self.location.get_stored().await {
            info!(
                lat = stored.lat,
                lon = stored.lon,
                "No explicit coordinates, using stored location"
            );
            return Ok(stored.coordinate());
        }

        let default = self.location.default_location();
        warn!(
            lat = default.lat,
            lon = default.lon,
            "No stored location, falling back to default"
        );
        Ok(default.coordinate())
    }

    async fn drain_location_changes(&self) {
        let mut receiver = self.location_changes.lock().await;
        let mut changed = false;
        loop {
            match receiver.try_recv() {
                Ok(()) => changed = true,
                Err(broadcast::error::TryRecvError::Lagged(_)) => changed = true,
                Err(_) => break,
            }
        }
        if changed {
            debug!("Location changed, invalidating weather cache");
            self.invalidate_cache().await;
        }
    }

    async fn cached_fresh(&self, key: &str) -> Option<DetailedWeatherData> {
        let cache = self.cache.lock().await;
        let entry = cache.as_ref()?;
        if entry.key == key && entry.stored_at.elapsed() < self.ttl {
            Some(entry.data.clone())
        } else {
            None
        }
    }

    /// Overwrite the provider's reverse-lookup label with the stored city
    /// name; the provider's own label is a fallback only
    async fn stamp_location_name(&self, data: &mut DetailedWeatherData) {
        if let Some(city) = self
            .location
            .get_stored()
            .await
            .and_then(|stored| stored.city_name)
        {
            data.current.location = city;
        }
    }

    /// Stale cache if one exists for this key (regardless of age),
    /// synthetic data otherwise
    async fn degraded_snapshot(&self, coord: Coordinate, key: &str) -> DetailedWeatherData {
        let cache = self.cache.lock().await;
        if let Some(entry) = cache.as_ref() {
            if entry.key == key {
                warn!(
                    key,
                    age_secs = entry.stored_at.elapsed().as_secs(),
                    "Serving stale cached weather"
                );
                return entry.data.clone();
            }
        }
        drop(cache);

        warn!(key, "No cached weather available, serving synthetic data");
        fallback_weather(coord)
    }
}

/// Deterministic synthetic snapshot served when every other source failed.
/// Structurally complete so the UI layer always renders.
fn fallback_weather(coord: Coordinate) -> DetailedWeatherData {
    let now = Utc::now();
    let unknown = weather_code::UNKNOWN;

    let hourly = (0..24)
        .map(|offset| {
            let time = now + chrono::Duration::hours(offset);
            HourlyEntry {
                time: time.format("%Y-%m-%dT%H:00").to_string(),
                temperature: 20,
                feels_like: 20,
                humidity: 50,
                precipitation_probability: 0,
                wind_speed: 5.0,
                weather_code: -1,
                description: unknown.description.to_string(),
                icon: unknown.icon.to_string(),
                is_day: (6..18).contains(&time.hour()),
            }
        })
        .collect();

    let sun = computed_sun_times(coord);
    let daily = (0..7)
        .map(|offset| {
            let date = now.date_naive() + chrono::Days::new(offset);
            DailyEntry {
                date: date.format("%Y-%m-%d").to_string(),
                temp_max: 22,
                temp_min: 15,
                weather_code: -1,
                description: unknown.description.to_string(),
                icon: unknown.icon.to_string(),
                sunrise: sun.sunrise.clone(),
                sunset: sun.sunset.clone(),
                uv_index_max: 0.0,
                precipitation_probability_max: 0,
                wind_speed_max: 5.0,
            }
        })
        .collect();

    DetailedWeatherData {
        current: CurrentConditions {
            location: location_label(coord),
            temperature: 20,
            feels_like: 20,
            humidity: 50,
            dew_point: 9,
            pressure: 1013,
            cloud_cover: 50,
            wind_speed: 5.0,
            wind_direction: 180,
            uv_index: 0.0,
            visibility_km: 10.0,
            weather_code: -1,
            description: "Weather service temporarily unavailable".to_string(),
            icon: unknown.icon.to_string(),
            is_day: true,
        },
        air_quality: AirQualityData::unavailable(),
        sun,
        hourly,
        daily,
        timezone: "UTC".to_string(),
        elevation: 0.0,
        last_updated: now.timestamp_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_weather_is_structurally_complete() {
        let coord = Coordinate::new(51.5, -0.12).unwrap();
        let data = fallback_weather(coord);

        assert_eq!(data.hourly.len(), 24);
        assert_eq!(data.daily.len(), 7);
        assert!(data.current.description.contains("temporarily unavailable"));
        assert_eq!(data.air_quality.aqi, 0);
        assert!(!data.sun.sunrise.is_empty());
        assert!(!data.sun.sunset.is_empty());
        assert!(data.current.visibility_km.is_finite());
        assert!(data.last_updated > 0);
    }

    #[test]
    fn test_fallback_weather_labels_reference_points() {
        let coord = Coordinate::new(52.52, 13.405).unwrap();
        assert_eq!(fallback_weather(coord).current.location, "Berlin");
    }
}
