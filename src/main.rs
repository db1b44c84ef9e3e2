use anyhow::Context;
use standby_weather::geocode::GeocodingResolver;
use standby_weather::location::MemorySettingsStore;
use standby_weather::models::{Coordinate, WeatherLocation};
use standby_weather::{logging, ServiceConfig, WeatherService};
use std::sync::Arc;
use tracing::info;

/// Fetch and print the weather snapshot for a place name given on the
/// command line, or for the configured default location.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init("standby_weather=debug,info");

    let config = ServiceConfig::load(None).context("Failed to load configuration")?;
    let service = WeatherService::from_config(&config, Arc::new(MemorySettingsStore::new()))
        .context("Failed to build weather service")?;

    if let Some(query) = std::env::args().nth(1) {
        let resolver = GeocodingResolver::new(&config.geocoding)
            .context("Failed to build geocoding resolver")?;
        let candidates = resolver.geocode(&query).await?;
        let best = candidates
            .first()
            .with_context(|| format!("No geocoding results for {query:?}"))?;
        info!(place = %best.display_name, "Resolved query");
        service
            .location_service()
            .set(WeatherLocation::new(
                Coordinate::new(best.lat, best.lon)?,
                Some(best.city.clone().unwrap_or_else(|| best.display_name.clone())),
            ))
            .await;
    }

    let weather = service.get_detailed_weather(None).await?;
    println!("{}", serde_json::to_string_pretty(&weather)?);

    Ok(())
}
