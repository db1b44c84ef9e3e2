//! Location service: the user's chosen coordinates
//!
//! Owns the one process-wide "current location". Backed by a narrow
//! [`SettingsStore`] seam over the host's persistent key/value settings, with
//! an in-memory mirror refreshed on every write so weather fetches never
//! re-read the store. Changes are published on a broadcast channel with
//! at-most-once delivery per change and no ordering guarantee between
//! subscribers.

use crate::config::DefaultLocationConfig;
use crate::error::Result;
use crate::models::WeatherLocation;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, OnceCell, RwLock};
use tracing::{debug, info, warn};

/// Settings key under which the location blob is persisted
pub const LOCATION_SETTINGS_KEY: &str = "weather.user_location";

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Narrow seam over the host's persistent settings store.
///
/// String-keyed get/set/remove of JSON-serialized blobs; the store itself is
/// an external collaborator and not redesigned here.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-process settings store for tests and hosts without a platform store
#[derive(Default)]
pub struct MemorySettingsStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySettingsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Owner of the current location, its persistence, and change notification
pub struct LocationService {
    store: Arc<dyn SettingsStore>,
    default: WeatherLocation,
    current: RwLock<Option<WeatherLocation>>,
    init: OnceCell<()>,
    changes: broadcast::Sender<()>,
}

impl LocationService {
    /// Create the service; the persisted value is loaded lazily on first read
    pub fn new(store: Arc<dyn SettingsStore>, defaults: &DefaultLocationConfig) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            store,
            default: WeatherLocation {
                lat: defaults.latitude,
                lon: defaults.longitude,
                city_name: Some(defaults.city_name.clone()),
                last_updated: 0,
            },
            current: RwLock::new(None),
            init: OnceCell::new(),
            changes,
        }
    }

    /// One-time load of the persisted location into the in-memory mirror.
    /// Every read awaits this, so a racing first use cannot observe a stale
    /// mirror.
    async fn ensure_loaded(&self) {
        self.init
            .get_or_init(|| async {
                match self.store.get(LOCATION_SETTINGS_KEY).await {
                    Ok(Some(raw)) => match serde_json::from_str::<WeatherLocation>(&raw) {
                        Ok(location) => {
                            debug!(
                                lat = location.lat,
                                lon = location.lon,
                                "Loaded persisted location"
                            );
                            *self.current.write().await = Some(location);
                        }
                        Err(e) => {
                            warn!("Discarding undecodable persisted location: {e}");
                        }
                    },
                    Ok(None) => debug!("No persisted location, default applies"),
                    Err(e) => warn!("Failed to read persisted location: {e}"),
                }
            })
            .await;
    }

    /// The persisted location, if the user has chosen one
    pub async fn get_stored(&self) -> Option<WeatherLocation> {
        self.ensure_loaded().await;
        self.current.read().await.clone()
    }

    /// The effective location: persisted value or the configured default
    pub async fn get(&self) -> WeatherLocation {
        self.get_stored().await.unwrap_or_else(|| self.default.clone())
    }

    /// The configured last-resort location
    #[must_use]
    pub fn default_location(&self) -> WeatherLocation {
        self.default.clone()
    }

    /// Persist a new location and notify subscribers.
    ///
    /// The write is stamped with the current epoch millis. A failing
    /// persistence write is logged but still updates the mirror and still
    /// notifies, so UI state stays consistent with the in-memory value.
    pub async fn set(&self, location: WeatherLocation) {
        self.ensure_loaded().await;

        let location = WeatherLocation {
            last_updated: Utc::now().timestamp_millis(),
            ..location
        };

        match serde_json::to_string(&location) {
            Ok(raw) => {
                if let Err(e) = self.store.set(LOCATION_SETTINGS_KEY, &raw).await {
                    warn!(lat = location.lat, lon = location.lon, "Failed to persist location: {e}");
                }
            }
            Err(e) => {
                warn!("Failed to serialize location: {e}");
            }
        }

        info!(
            lat = location.lat,
            lon = location.lon,
            city = location.city_name.as_deref().unwrap_or("<none>"),
            "Location updated"
        );
        *self.current.write().await = Some(location);
        self.notify();
    }

    /// Reset to the default location and notify subscribers
    pub async fn clear(&self) {
        self.ensure_loaded().await;

        if let Err(e) = self.store.remove(LOCATION_SETTINGS_KEY).await {
            warn!("Failed to remove persisted location: {e}");
        }

        info!("Location cleared, default applies");
        *self.current.write().await = None;
        self.notify();
    }

    /// Subscribe to location changes. One event is published per `set` or
    /// `clear`; events carry no payload, re-read through [`Self::get`].
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }

    fn notify(&self) {
        // A send error only means no live subscribers
        let _ = self.changes.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WeatherServiceError;
    use crate::models::Coordinate;

    fn defaults() -> DefaultLocationConfig {
        DefaultLocationConfig {
            latitude: 52.52,
            longitude: 13.405,
            city_name: "Berlin".to_string(),
        }
    }

    fn london() -> WeatherLocation {
        WeatherLocation::new(
            Coordinate::new(51.5, -0.12).unwrap(),
            Some("London".to_string()),
        )
    }

    /// Store whose writes always fail
    struct FailingStore;

    #[async_trait]
    impl SettingsStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(WeatherServiceError::Persistence("read failed".into()))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(WeatherServiceError::Persistence("write failed".into()))
        }

        async fn remove(&self, _key: &str) -> Result<()> {
            Err(WeatherServiceError::Persistence("remove failed".into()))
        }
    }

    #[tokio::test]
    async fn test_get_falls_back_to_default() {
        let service = LocationService::new(Arc::new(MemorySettingsStore::new()), &defaults());
        let location = service.get().await;
        assert_eq!(location.city_name.as_deref(), Some("Berlin"));
        assert!(service.get_stored().await.is_none());
    }

    #[tokio::test]
    async fn test_set_persists_and_stamps() {
        let store = Arc::new(MemorySettingsStore::new());
        let service = LocationService::new(store.clone(), &defaults());

        service.set(london()).await;

        let raw = store.get(LOCATION_SETTINGS_KEY).await.unwrap().unwrap();
        let persisted: WeatherLocation = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.lat, 51.5);
        assert_eq!(persisted.city_name.as_deref(), Some("London"));
        assert!(persisted.last_updated > 0);

        let current = service.get().await;
        assert_eq!(current, persisted);
    }

    #[tokio::test]
    async fn test_persisted_value_survives_service_restart() {
        let store = Arc::new(MemorySettingsStore::new());
        {
            let service = LocationService::new(store.clone(), &defaults());
            service.set(london()).await;
        }

        let revived = LocationService::new(store, &defaults());
        assert_eq!(revived.get().await.city_name.as_deref(), Some("London"));
    }

    #[tokio::test]
    async fn test_set_notifies_each_subscriber_exactly_once() {
        let service = LocationService::new(Arc::new(MemorySettingsStore::new()), &defaults());
        let mut first = service.subscribe();
        let mut second = service.subscribe();

        service.set(london()).await;

        assert!(first.try_recv().is_ok());
        assert!(first.try_recv().is_err());
        assert!(second.try_recv().is_ok());
        assert!(second.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_clear_resets_and_notifies() {
        let store = Arc::new(MemorySettingsStore::new());
        let service = LocationService::new(store.clone(), &defaults());
        service.set(london()).await;

        let mut changes = service.subscribe();
        service.clear().await;

        assert!(changes.try_recv().is_ok());
        assert!(store.get(LOCATION_SETTINGS_KEY).await.unwrap().is_none());
        assert_eq!(service.get().await.city_name.as_deref(), Some("Berlin"));
    }

    #[tokio::test]
    async fn test_failing_store_still_updates_mirror_and_notifies() {
        let service = LocationService::new(Arc::new(FailingStore), &defaults());
        let mut changes = service.subscribe();

        service.set(london()).await;

        assert!(changes.try_recv().is_ok());
        assert_eq!(service.get().await.city_name.as_deref(), Some("London"));
    }

    #[tokio::test]
    async fn test_undecodable_persisted_blob_is_discarded() {
        let store = Arc::new(MemorySettingsStore::new());
        store
            .set(LOCATION_SETTINGS_KEY, "not valid json")
            .await
            .unwrap();

        let service = LocationService::new(store, &defaults());
        assert_eq!(service.get().await.city_name.as_deref(), Some("Berlin"));
    }
}
