//! Geocoding resolver: free-text address search and reverse lookup
//!
//! Two independent providers: Nominatim as the primary (rate-limited
//! process-wide to one request per second, per its usage policy) and a
//! Positionstack-compatible backup used only when an API key is configured.
//! Provider failures never reach the caller; an empty sequence is the
//! canonical "no results" signal, while malformed input raises immediately.

use crate::config::GeocodingConfig;
use crate::error::{Result, WeatherServiceError};
use crate::models::{Coordinate, GeocodingResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Maximum free-text query length
pub const MAX_QUERY_LEN: usize = 256;

/// One geocoding backend
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// Provider name for diagnostics
    fn name(&self) -> &'static str;

    /// Forward search for a free-text query
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<GeocodingResult>>;

    /// Reverse lookup for a coordinate
    async fn reverse(&self, coord: Coordinate) -> Result<Option<GeocodingResult>>;
}

/// Address resolver over a primary/backup provider pair
pub struct GeocodingResolver {
    primary: Arc<dyn GeocodeProvider>,
    backup: Option<Arc<dyn GeocodeProvider>>,
    /// Shared timestamp of the last primary request; concurrent calls
    /// serialize through this lock while awaiting the remaining interval
    last_primary_request: Mutex<Option<Instant>>,
    min_interval: Duration,
    result_limit: u32,
    min_query_len: usize,
}

impl GeocodingResolver {
    /// Build a resolver with real HTTP providers from configuration.
    /// The backup is wired only when `backup_api_key` is set.
    pub fn new(config: &GeocodingConfig) -> Result<Self> {
        let primary: Arc<dyn GeocodeProvider> = Arc::new(NominatimClient::new(config)?);
        let backup: Option<Arc<dyn GeocodeProvider>> = match &config.backup_api_key {
            Some(key) => Some(Arc::new(PositionstackClient::new(config, key.clone())?)),
            None => {
                debug!("No backup geocoder API key configured, backup disabled");
                None
            }
        };

        Ok(Self::with_providers(
            primary,
            backup,
            Duration::from_millis(config.min_interval_ms),
            config.result_limit,
            config.min_query_len,
        ))
    }

    /// Build a resolver from explicit providers (used by tests)
    pub fn with_providers(
        primary: Arc<dyn GeocodeProvider>,
        backup: Option<Arc<dyn GeocodeProvider>>,
        min_interval: Duration,
        result_limit: u32,
        min_query_len: usize,
    ) -> Self {
        Self {
            primary,
            backup,
            last_primary_request: Mutex::new(None),
            min_interval,
            result_limit,
            min_query_len,
        }
    }

    /// Resolve a free-text query into ranked candidate locations.
    ///
    /// Returns `Err` only for malformed input; provider failures degrade to
    /// the backup and finally to an empty result.
    #[instrument(skip(self))]
    pub async fn geocode(&self, query: &str) -> Result<Vec<GeocodingResult>> {
        let query = query.trim();
        if query.chars().count() < self.min_query_len {
            return Err(WeatherServiceError::validation(format!(
                "Query must be at least {} characters",
                self.min_query_len
            )));
        }
        if query.chars().count() > MAX_QUERY_LEN {
            return Err(WeatherServiceError::validation(format!(
                "Query must be at most {MAX_QUERY_LEN} characters"
            )));
        }

        self.throttle_primary().await;
        match self.primary.search(query, self.result_limit).await {
            Ok(mut results) => {
                info!(provider = self.primary.name(), count = results.len(), "Geocoding succeeded");
                rank(&mut results);
                return Ok(results);
            }
            Err(e) => {
                warn!(provider = self.primary.name(), query, "Primary geocoder failed: {e}");
            }
        }

        if let Some(backup) = &self.backup {
            match backup.search(query, self.result_limit).await {
                Ok(mut results) => {
                    info!(provider = backup.name(), count = results.len(), "Backup geocoding succeeded");
                    rank(&mut results);
                    return Ok(results);
                }
                Err(e) => {
                    warn!(provider = backup.name(), query, "Backup geocoder failed: {e}");
                }
            }
        }

        Ok(Vec::new())
    }

    /// Resolve a coordinate into at most one place description.
    ///
    /// Returns `Err` only for out-of-range coordinates.
    #[instrument(skip(self))]
    pub async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Vec<GeocodingResult>> {
        let coord = Coordinate::new(lat, lon)?;

        self.throttle_primary().await;
        match self.primary.reverse(coord).await {
            Ok(result) => return Ok(result.into_iter().collect()),
            Err(e) => {
                warn!(provider = self.primary.name(), lat, lon, "Primary reverse lookup failed: {e}");
            }
        }

        if let Some(backup) = &self.backup {
            match backup.reverse(coord).await {
                Ok(result) => return Ok(result.into_iter().collect()),
                Err(e) => {
                    warn!(provider = backup.name(), lat, lon, "Backup reverse lookup failed: {e}");
                }
            }
        }

        Ok(Vec::new())
    }

    /// Await the remainder of the primary provider's minimum request
    /// interval, then claim the current slot.
    async fn throttle_primary(&self) {
        let mut last = self.last_primary_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "Rate limiting primary geocoder");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Multi-key relevance comparator: provider score first, then presence of a
/// resolved city, then country, then shorter display name as a proxy for
/// specificity. Stable for identical inputs.
fn rank(results: &mut [GeocodingResult]) {
    results.sort_by(|a, b| {
        match (a.importance, b.importance) {
            (Some(x), Some(y)) => {
                if let Some(ord) = y.partial_cmp(&x) {
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
            }
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => {}
        }

        let city = b.city.is_some().cmp(&a.city.is_some());
        if city != Ordering::Equal {
            return city;
        }

        let country = b.country.is_some().cmp(&a.country.is_some());
        if country != Ordering::Equal {
            return country;
        }

        a.display_name.len().cmp(&b.display_name.len())
    });
}

/// Primary provider: Nominatim (OpenStreetMap)
pub struct NominatimClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    importance: Option<f64>,
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
    country: Option<String>,
    postcode: Option<String>,
}

impl NominatimClient {
    /// Build the client; Nominatim requires a descriptive identifier header
    pub fn new(config: &GeocodingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| WeatherServiceError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.nominatim_url.clone(),
        })
    }

    fn convert(place: NominatimPlace) -> Option<GeocodingResult> {
        let lat = place.lat.parse::<f64>().ok()?;
        let lon = place.lon.parse::<f64>().ok()?;
        let address = place.address;
        let (city, state, country, postcode) = match address {
            Some(a) => (a.city.or(a.town).or(a.village), a.state, a.country, a.postcode),
            None => (None, None, None, None),
        };
        Some(GeocodingResult {
            lat,
            lon,
            display_name: place.display_name,
            city,
            state,
            country,
            postcode,
            kind: place.kind,
            importance: place.importance,
        })
    }
}

#[async_trait]
impl GeocodeProvider for NominatimClient {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    async fn search(&self, query: &str, limit: u32) -> Result<Vec<GeocodingResult>> {
        let url = format!(
            "{}/search?q={}&format=json&addressdetails=1&limit={}&accept-language=en",
            self.base_url,
            urlencoding::encode(query),
            limit
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WeatherServiceError::ProviderUnavailable(format!("nominatim: {e}")))?;

        if !response.status().is_success() {
            return Err(WeatherServiceError::ProviderUnavailable(format!(
                "nominatim answered {}",
                response.status()
            )));
        }

        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| WeatherServiceError::ProviderUnavailable(format!("nominatim parse: {e}")))?;

        Ok(places.into_iter().filter_map(Self::convert).collect())
    }

    async fn reverse(&self, coord: Coordinate) -> Result<Option<GeocodingResult>> {
        let url = format!(
            "{}/reverse?lat={}&lon={}&format=json&addressdetails=1&accept-language=en",
            self.base_url, coord.lat, coord.lon
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WeatherServiceError::ProviderUnavailable(format!("nominatim: {e}")))?;

        if !response.status().is_success() {
            return Err(WeatherServiceError::ProviderUnavailable(format!(
                "nominatim answered {}",
                response.status()
            )));
        }

        let place: NominatimPlace = response
            .json()
            .await
            .map_err(|e| WeatherServiceError::ProviderUnavailable(format!("nominatim parse: {e}")))?;

        Ok(Self::convert(place))
    }
}

/// Backup provider: Positionstack-compatible API, keyed
pub struct PositionstackClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct PositionstackResponse {
    data: Option<Vec<PositionstackPlace>>,
    error: Option<PositionstackError>,
}

#[derive(Debug, Deserialize)]
struct PositionstackError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PositionstackPlace {
    latitude: f64,
    longitude: f64,
    label: Option<String>,
    locality: Option<String>,
    region: Option<String>,
    country: Option<String>,
    postal_code: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    confidence: Option<f64>,
}

impl PositionstackClient {
    pub fn new(config: &GeocodingConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| WeatherServiceError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.backup_url.clone(),
            api_key,
        })
    }

    async fn request(&self, url: String) -> Result<Vec<GeocodingResult>> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WeatherServiceError::ProviderUnavailable(format!("positionstack: {e}")))?;

        if !response.status().is_success() {
            return Err(WeatherServiceError::ProviderUnavailable(format!(
                "positionstack answered {}",
                response.status()
            )));
        }

        let payload: PositionstackResponse = response.json().await.map_err(|e| {
            WeatherServiceError::ProviderUnavailable(format!("positionstack parse: {e}"))
        })?;

        if let Some(error) = payload.error {
            return Err(WeatherServiceError::ProviderUnavailable(format!(
                "positionstack error {}: {}",
                error.code.unwrap_or_default(),
                error.message.unwrap_or_default()
            )));
        }

        Ok(payload
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|place| GeocodingResult {
                lat: place.latitude,
                lon: place.longitude,
                display_name: place.label.unwrap_or_default(),
                city: place.locality,
                state: place.region,
                country: place.country,
                postcode: place.postal_code,
                kind: place.kind,
                importance: place.confidence,
            })
            .collect())
    }
}

#[async_trait]
impl GeocodeProvider for PositionstackClient {
    fn name(&self) -> &'static str {
        "positionstack"
    }

    async fn search(&self, query: &str, limit: u32) -> Result<Vec<GeocodingResult>> {
        let url = format!(
            "{}/forward?access_key={}&query={}&limit={}",
            self.base_url,
            self.api_key,
            urlencoding::encode(query),
            limit
        );
        self.request(url).await
    }

    async fn reverse(&self, coord: Coordinate) -> Result<Option<GeocodingResult>> {
        let url = format!(
            "{}/reverse?access_key={}&query={},{}&limit=1",
            self.base_url, self.api_key, coord.lat, coord.lon
        );
        Ok(self.request(url).await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
    use std::sync::Mutex as StdMutex;

    fn result(display_name: &str) -> GeocodingResult {
        GeocodingResult {
            lat: 51.5,
            lon: -0.12,
            display_name: display_name.to_string(),
            city: None,
            state: None,
            country: None,
            postcode: None,
            kind: None,
            importance: None,
        }
    }

    /// Scripted provider: either fails every call or returns fixed results,
    /// recording call count and call instants.
    struct ScriptedProvider {
        name: &'static str,
        fail: bool,
        results: Vec<GeocodingResult>,
        calls: AtomicU32,
        call_times: StdMutex<Vec<Instant>>,
    }

    impl ScriptedProvider {
        fn ok(name: &'static str, results: Vec<GeocodingResult>) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail: false,
                results,
                calls: AtomicU32::new(0),
                call_times: StdMutex::new(Vec::new()),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail: true,
                results: Vec::new(),
                calls: AtomicU32::new(0),
                call_times: StdMutex::new(Vec::new()),
            })
        }

        fn record(&self) {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            self.call_times.lock().unwrap().push(Instant::now());
        }
    }

    #[async_trait]
    impl GeocodeProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn search(&self, _query: &str, _limit: u32) -> Result<Vec<GeocodingResult>> {
            self.record();
            if self.fail {
                Err(WeatherServiceError::ProviderUnavailable("scripted failure".into()))
            } else {
                Ok(self.results.clone())
            }
        }

        async fn reverse(&self, _coord: Coordinate) -> Result<Option<GeocodingResult>> {
            self.record();
            if self.fail {
                Err(WeatherServiceError::ProviderUnavailable("scripted failure".into()))
            } else {
                Ok(self.results.first().cloned())
            }
        }
    }

    fn resolver(
        primary: Arc<ScriptedProvider>,
        backup: Option<Arc<ScriptedProvider>>,
    ) -> GeocodingResolver {
        GeocodingResolver::with_providers(
            primary,
            backup.map(|b| b as Arc<dyn GeocodeProvider>),
            Duration::from_millis(1000),
            10,
            2,
        )
    }

    #[tokio::test]
    async fn test_short_query_rejected_before_any_request() {
        let primary = ScriptedProvider::ok("primary", vec![result("London")]);
        let r = resolver(primary.clone(), None);

        let err = r.geocode("L").await.unwrap_err();
        assert!(matches!(err, WeatherServiceError::Validation(_)));
        assert_eq!(primary.calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_configured_minimum_length_applies() {
        let primary = ScriptedProvider::ok("primary", vec![result("London")]);
        let r = GeocodingResolver::with_providers(
            primary.clone(),
            None,
            Duration::from_millis(1000),
            10,
            5,
        );

        let err = r.geocode("Lond").await.unwrap_err();
        assert!(matches!(err, WeatherServiceError::Validation(_)));
        assert_eq!(primary.calls.load(AtomicOrdering::SeqCst), 0);

        assert_eq!(r.geocode("London").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_overlong_query_rejected() {
        let primary = ScriptedProvider::ok("primary", vec![]);
        let r = resolver(primary, None);
        let long = "x".repeat(MAX_QUERY_LEN + 1);
        assert!(matches!(
            r.geocode(&long).await,
            Err(WeatherServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_primary_failure_falls_back_to_backup() {
        let primary = ScriptedProvider::failing("primary");
        let backup = ScriptedProvider::ok("backup", vec![result("London, UK")]);
        let r = resolver(primary.clone(), Some(backup.clone()));

        let results = r.geocode("London").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].display_name, "London, UK");
        assert_eq!(primary.calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(backup.calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_both_providers_failing_yields_empty() {
        let r = resolver(
            ScriptedProvider::failing("primary"),
            Some(ScriptedProvider::failing("backup")),
        );
        assert!(r.geocode("London").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_backup_is_a_skip_not_an_error() {
        let r = resolver(ScriptedProvider::failing("primary"), None);
        assert!(r.geocode("London").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reverse_rejects_bad_coordinates() {
        let r = resolver(ScriptedProvider::ok("primary", vec![]), None);
        assert!(matches!(
            r.reverse_geocode(91.0, 0.0).await,
            Err(WeatherServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_reverse_returns_at_most_one() {
        let primary =
            ScriptedProvider::ok("primary", vec![result("Westminster"), result("London")]);
        let r = resolver(primary, None);
        let results = r.reverse_geocode(51.5, -0.12).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].display_name, "Westminster");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverse_of_geocoded_point_round_trips() {
        let primary = ScriptedProvider::ok(
            "primary",
            vec![result("London, Greater London, United Kingdom")],
        );
        let r = resolver(primary, None);

        let results = r.geocode("London").await.unwrap();
        let top = &results[0];
        let reversed = r.reverse_geocode(top.lat, top.lon).await.unwrap();

        assert_eq!(reversed.len(), 1);
        assert!(!reversed[0].display_name.is_empty());
        assert!((reversed[0].lat - top.lat).abs() < 1e-4);
        assert!((reversed[0].lon - top.lon).abs() < 1e-4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_calls_serialize_through_rate_limit() {
        let primary = ScriptedProvider::ok("primary", vec![result("London")]);
        let r = resolver(primary.clone(), None);

        r.geocode("London").await.unwrap();
        r.geocode("London").await.unwrap();

        let times = primary.call_times.lock().unwrap();
        assert_eq!(times.len(), 2);
        assert_eq!(times[1] - times[0], Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_calls_skip_the_delay() {
        let primary = ScriptedProvider::ok("primary", vec![result("London")]);
        let r = resolver(primary.clone(), None);

        r.geocode("London").await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let before = Instant::now();
        r.geocode("London").await.unwrap();
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_rank_importance_dominates() {
        let mut results = vec![
            GeocodingResult {
                importance: Some(0.3),
                ..result("Low")
            },
            GeocodingResult {
                importance: Some(0.9),
                ..result("High")
            },
            GeocodingResult {
                importance: None,
                ..result("None")
            },
        ];
        rank(&mut results);
        assert_eq!(results[0].display_name, "High");
        assert_eq!(results[1].display_name, "Low");
        assert_eq!(results[2].display_name, "None");
    }

    #[test]
    fn test_rank_tie_breakers() {
        let mut results = vec![
            GeocodingResult {
                display_name: "A long and very specific display name".to_string(),
                ..result("")
            },
            GeocodingResult {
                country: Some("UK".to_string()),
                ..result("Has country")
            },
            GeocodingResult {
                city: Some("London".to_string()),
                ..result("Has city")
            },
            result("Short"),
        ];
        rank(&mut results);
        assert_eq!(results[0].display_name, "Has city");
        assert_eq!(results[1].display_name, "Has country");
        assert_eq!(results[2].display_name, "Short");
    }

    #[test]
    fn test_rank_is_reproducible() {
        let build = || {
            vec![
                GeocodingResult {
                    importance: Some(0.5),
                    ..result("B")
                },
                GeocodingResult {
                    importance: Some(0.5),
                    ..result("A")
                },
            ]
        };
        let mut first = build();
        let mut second = build();
        rank(&mut first);
        rank(&mut second);
        let names = |v: &[GeocodingResult]| {
            v.iter().map(|r| r.display_name.clone()).collect::<Vec<_>>()
        };
        assert_eq!(names(&first), names(&second));
    }
}
