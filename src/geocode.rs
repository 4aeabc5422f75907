//! Reverse geocoding with a lossy coordinate cache.
//!
//! Cache keys round both coordinates to 4 decimal places (about 11 m of latitude).
//! Two points closer than that share a key and therefore a name. This is the
//! intended policy, not a collision bug.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::GeocodeSettings;

const USER_AGENT: &str = concat!("roadwatch/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn quantize(latitude: f64, longitude: f64) -> Self {
        Self(format!("{:.4},{:.4}", latitude, longitude))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait LocationCache: Send {
    fn get(&self, key: &CacheKey) -> Option<String>;
    fn put(&mut self, key: CacheKey, name: String);

    /// Persist pending writes. No-op for caches without backing storage.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<CacheKey, String>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LocationCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: CacheKey, name: String) {
        self.entries.insert(key, name);
    }
}

/// Cache stored as one JSON object `{"lat,lon": "name"}`.
///
/// Loaded once at open. Writes stay in memory until [`LocationCache::flush`].
#[derive(Debug)]
pub struct JsonFileCache {
    path: PathBuf,
    entries: HashMap<String, String>,
    dirty: bool,
}

impl JsonFileCache {
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read location cache {}", path.display()))?;
            serde_json::from_str(&raw)
                .map_err(|e| anyhow!("invalid location cache {}: {}", path.display(), e))?
        } else {
            HashMap::new()
        };
        log::debug!(
            "location cache {}: {} entries",
            path.display(),
            entries.len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            dirty: false,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LocationCache for JsonFileCache {
    fn get(&self, key: &CacheKey) -> Option<String> {
        self.entries.get(key.as_str()).cloned()
    }

    fn put(&mut self, key: CacheKey, name: String) {
        if self.entries.get(key.as_str()) != Some(&name) {
            self.entries.insert(key.0, name);
            self.dirty = true;
        }
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let json = serde_json::to_vec(&self.entries)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("write location cache {}", self.path.display()))?;
        self.dirty = false;
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
}

pub trait ReverseGeocoder: Send {
    fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<Address>>;
}

/// OpenStreetMap Nominatim `/reverse` endpoint.
pub struct NominatimGeocoder {
    agent: ureq::Agent,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    road: Option<String>,
    highway: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        url::Url::parse(base_url)
            .map_err(|e| anyhow!("invalid geocoder url '{}': {}", base_url, e))?;
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Ok(Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<Address>> {
        let url = format!("{}/reverse", self.base_url);
        let response: NominatimResponse = self
            .agent
            .get(&url)
            .query("format", "jsonv2")
            .query("lat", &latitude.to_string())
            .query("lon", &longitude.to_string())
            .query("accept-language", "en")
            .call()
            .map_err(|e| anyhow!("reverse geocode request failed: {}", e))?
            .into_json()
            .context("parse reverse geocode response")?;
        Ok(response.address.map(|addr| Address {
            street: addr.road.or(addr.highway),
            city: addr.city.or(addr.town).or(addr.village),
        }))
    }
}

/// Human-readable names for coordinates, cached by [`CacheKey`].
pub struct LocationNamer {
    cache: Box<dyn LocationCache>,
    geocoder: Box<dyn ReverseGeocoder>,
}

impl LocationNamer {
    pub fn new(cache: Box<dyn LocationCache>, geocoder: Box<dyn ReverseGeocoder>) -> Self {
        Self { cache, geocoder }
    }

    pub fn from_settings(settings: &GeocodeSettings) -> Result<Self> {
        let cache = JsonFileCache::open(&settings.cache_path)?;
        let geocoder = NominatimGeocoder::new(&settings.base_url, settings.timeout)?;
        Ok(Self::new(Box::new(cache), Box::new(geocoder)))
    }

    pub fn name_for(&mut self, latitude: f64, longitude: f64) -> String {
        let key = CacheKey::quantize(latitude, longitude);
        if let Some(name) = self.cache.get(&key) {
            return name;
        }

        let name = match self.geocoder.reverse(latitude, longitude) {
            Ok(Some(Address {
                street: Some(street),
                city: Some(city),
            })) if !street.is_empty() && !city.is_empty() => format!("{}, {}", street, city),
            Ok(_) => fallback_name(latitude, longitude),
            Err(err) => {
                log::warn!("reverse geocode {} failed: {:#}", key, err);
                fallback_name(latitude, longitude)
            }
        };
        self.cache.put(key, name.clone());
        name
    }

    pub fn flush(&mut self) -> Result<()> {
        self.cache.flush()
    }
}

fn fallback_name(latitude: f64, longitude: f64) -> String {
    format!("({:.2}, {:.2})", latitude, longitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingGeocoder {
        calls: Arc<AtomicUsize>,
        answer: Option<Address>,
        fail: bool,
    }

    impl ReverseGeocoder for CountingGeocoder {
        fn reverse(&self, _lat: f64, _lon: f64) -> Result<Option<Address>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("503"));
            }
            Ok(self.answer.clone())
        }
    }

    fn namer(answer: Option<Address>, fail: bool) -> (LocationNamer, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let geocoder = CountingGeocoder {
            calls: calls.clone(),
            answer,
            fail,
        };
        (
            LocationNamer::new(Box::new(MemoryCache::new()), Box::new(geocoder)),
            calls,
        )
    }

    #[test]
    fn key_rounds_to_four_decimals() {
        assert_eq!(CacheKey::quantize(43.653226, -79.383184).as_str(), "43.6532,-79.3832");
        assert_eq!(
            CacheKey::quantize(43.65321, -79.38319),
            CacheKey::quantize(43.65324, -79.38316)
        );
        assert_ne!(
            CacheKey::quantize(43.6532, -79.3832),
            CacheKey::quantize(43.6533, -79.3832)
        );
    }

    #[test]
    fn street_and_city_are_joined_and_cached() {
        let (mut namer, calls) = namer(
            Some(Address {
                street: Some("King Street West".to_string()),
                city: Some("Toronto".to_string()),
            }),
            false,
        );
        assert_eq!(namer.name_for(43.6532, -79.3832), "King Street West, Toronto");
        assert_eq!(namer.name_for(43.65321, -79.38319), "King Street West, Toronto");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn partial_address_falls_back_to_coordinates() {
        let (mut namer, _) = namer(
            Some(Address {
                street: None,
                city: Some("Toronto".to_string()),
            }),
            false,
        );
        assert_eq!(namer.name_for(43.6532, -79.3832), "(43.65, -79.38)");
    }

    #[test]
    fn geocoder_error_falls_back_and_is_cached() {
        let (mut namer, calls) = namer(None, true);
        assert_eq!(namer.name_for(43.6532, -79.3832), "(43.65, -79.38)");
        assert_eq!(namer.name_for(43.6532, -79.3832), "(43.65, -79.38)");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn json_cache_persists_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("location_cache.json");

        let mut cache = JsonFileCache::open(&path).unwrap();
        assert!(cache.is_empty());
        cache.put(CacheKey::quantize(1.0, 2.0), "Main St, Springfield".to_string());
        assert!(!path.exists());
        cache.flush().unwrap();

        let reopened = JsonFileCache::open(&path).unwrap();
        assert_eq!(
            reopened.get(&CacheKey::quantize(1.0, 2.0)).as_deref(),
            Some("Main St, Springfield")
        );
        let raw: HashMap<String, String> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.contains_key("1.0000,2.0000"));
    }
}
