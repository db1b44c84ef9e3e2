//! Configuration for the weather data service
//!
//! Handles loading configuration from an optional TOML file plus environment
//! variable overrides, with serde-level defaults for every setting so an
//! embedding app can construct the service with `ServiceConfig::default()`.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration for the weather core
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceConfig {
    /// Weather provider settings
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Geocoding settings
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    /// Cache settings
    #[serde(default)]
    pub cache: CacheConfig,
    /// Retry settings
    #[serde(default)]
    pub retry: RetryConfig,
    /// Last-resort location when nothing is stored
    #[serde(default)]
    pub default_location: DefaultLocationConfig,
}

/// Weather provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL for the forecast API
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,
    /// Base URL for the air-quality API (separate host)
    #[serde(default = "default_air_quality_url")]
    pub air_quality_url: String,
    /// Per-request deadline in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
}

/// Geocoding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Base URL for the primary (Nominatim) provider
    #[serde(default = "default_nominatim_url")]
    pub nominatim_url: String,
    /// Base URL for the backup provider
    #[serde(default = "default_backup_url")]
    pub backup_url: String,
    /// API key for the backup provider; the backup is skipped when unset
    #[serde(default)]
    pub backup_api_key: Option<String>,
    /// Descriptive client identifier sent to the primary provider
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Minimum interval between primary-provider requests, in milliseconds
    #[serde(default = "default_min_interval")]
    pub min_interval_ms: u64,
    /// Per-request deadline in seconds
    #[serde(default = "default_geocoding_timeout")]
    pub timeout_seconds: u64,
    /// Maximum results requested per search
    #[serde(default = "default_result_limit")]
    pub result_limit: u32,
    /// Minimum free-text query length accepted by `geocode`
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,
}

/// Cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Freshness window for a cached weather snapshot, in minutes
    #[serde(default = "default_cache_ttl")]
    pub ttl_minutes: u64,
}

/// Retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Linear backoff step in milliseconds; attempt N waits N * step
    #[serde(default = "default_backoff_step")]
    pub backoff_step_ms: u64,
}

/// Last-resort location when neither explicit coordinates nor a stored
/// location are available
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultLocationConfig {
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
    #[serde(default = "default_city_name")]
    pub city_name: String,
}

// Default value functions
fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_air_quality_url() -> String {
    "https://air-quality-api.open-meteo.com/v1/air-quality".to_string()
}

fn default_provider_timeout() -> u64 {
    15
}

fn default_nominatim_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_backup_url() -> String {
    "https://api.positionstack.com/v1".to_string()
}

fn default_user_agent() -> String {
    "StandbyWeather/0.1.0 (standby-dock app)".to_string()
}

fn default_min_interval() -> u64 {
    1000
}

fn default_geocoding_timeout() -> u64 {
    10
}

fn default_result_limit() -> u32 {
    10
}

fn default_min_query_len() -> usize {
    2
}

fn default_cache_ttl() -> u64 {
    20
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_step() -> u64 {
    1000
}

fn default_latitude() -> f64 {
    52.52
}

fn default_longitude() -> f64 {
    13.405
}

fn default_city_name() -> String {
    "Berlin".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            forecast_url: default_forecast_url(),
            air_quality_url: default_air_quality_url(),
            timeout_seconds: default_provider_timeout(),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            nominatim_url: default_nominatim_url(),
            backup_url: default_backup_url(),
            backup_api_key: None,
            user_agent: default_user_agent(),
            min_interval_ms: default_min_interval(),
            timeout_seconds: default_geocoding_timeout(),
            result_limit: default_result_limit(),
            min_query_len: default_min_query_len(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_cache_ttl(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_step_ms: default_backoff_step(),
        }
    }
}

impl Default for DefaultLocationConfig {
    fn default() -> Self {
        Self {
            latitude: default_latitude(),
            longitude: default_longitude(),
            city_name: default_city_name(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from an optional TOML file, then apply environment
    /// overrides with the `STANDBY_WEATHER_` prefix (double underscore as the
    /// section separator, e.g. `STANDBY_WEATHER_CACHE__TTL_MINUTES=30`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(Environment::with_prefix("STANDBY_WEATHER").separator("__"))
            .build()
            .with_context(|| "Failed to assemble configuration sources")?;

        config
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.cache.ttl_minutes, 20);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff_step_ms, 1000);
        assert_eq!(config.provider.timeout_seconds, 15);
        assert_eq!(config.geocoding.timeout_seconds, 10);
        assert_eq!(config.geocoding.min_interval_ms, 1000);
        assert_eq!(config.geocoding.min_query_len, 2);
        assert!(config.geocoding.backup_api_key.is_none());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = ServiceConfig::load(None).expect("load should succeed");
        assert_eq!(config.provider.forecast_url, default_forecast_url());
        assert_eq!(config.default_location.city_name, "Berlin");
    }
}
