//! Location-aware weather core for an always-on standby display.
//!
//! The crate fetches, normalizes, and caches weather snapshots from the
//! Open-Meteo forecast and air-quality APIs, resolves free-text place names
//! through Nominatim with a keyed backup provider, and persists the user's
//! chosen location through a host-supplied settings store.
//!
//! [`WeatherService`] is the main entry point; it owns the cache, the retry
//! policy, and the degradation ladder (fresh fetch, stale cache, synthetic
//! data). [`GeocodingResolver`] and [`LocationService`] stand alone and are
//! also usable directly.

pub mod aqi;
pub mod config;
pub mod error;
pub mod geocode;
pub mod location;
pub mod logging;
pub mod models;
pub mod provider;
pub mod retry;
pub mod service;
pub mod weather_code;

pub use config::ServiceConfig;
pub use error::{Result, WeatherServiceError};
pub use geocode::{GeocodeProvider, GeocodingResolver};
pub use location::{LocationService, MemorySettingsStore, SettingsStore};
pub use models::{
    AirQualityData, Coordinate, CurrentConditions, DailyEntry, DetailedWeatherData,
    GeocodingResult, HourlyEntry, SunTimes, WeatherLocation,
};
pub use provider::{OpenMeteoClient, WeatherProvider};
pub use service::WeatherService;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
