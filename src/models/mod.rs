//! Domain model for the weather data service

pub mod location;
pub mod weather;

pub use location::{Coordinate, GeocodingResult, WeatherLocation};
pub use weather::{
    AirQualityData, CurrentConditions, DailyEntry, DetailedWeatherData, HourlyEntry, SunTimes,
};
