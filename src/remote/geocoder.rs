//! Geocoding through Nominatim, with an in-process LRU cache.

use super::{Geocoder, build_http_client};
use crate::config::GeocoderConfig;
use crate::models::{Coordinates, PostalAddress};
use crate::{Error, Result};
use lru::LruCache;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::instrument;

/// Results requested per lookup.
const RESULT_LIMIT: usize = 5;

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

impl Place {
    fn coordinates(&self) -> Option<Coordinates> {
        let latitude = self.lat.trim().parse().ok()?;
        let longitude = self.lon.trim().parse().ok()?;
        Some(Coordinates::new(latitude, longitude))
    }
}

fn parse_places(body: &str) -> Result<Vec<Coordinates>> {
    let places: Vec<Place> =
        serde_json::from_str(body).map_err(|e| Error::remote("geocode", e))?;
    Ok(places.iter().filter_map(Place::coordinates).collect())
}

/// Geocoder backed by a Nominatim search endpoint.
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    user_agent: String,
}

impl NominatimGeocoder {
    /// Creates a geocoder from settings.
    #[must_use]
    pub fn new(config: &GeocoderConfig) -> Self {
        Self {
            client: build_http_client(config.timeout_ms, config.timeout_ms),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
        }
    }
}

impl Geocoder for NominatimGeocoder {
    #[instrument(skip_all)]
    fn geocode(&self, address: &PostalAddress) -> Result<Vec<Coordinates>> {
        let query = address.single_line();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .header("User-Agent", &self.user_agent)
            .query(&[
                ("format", "json".to_string()),
                ("q", query),
                ("limit", RESULT_LIMIT.to_string()),
            ])
            .send()
            .map_err(|e| Error::remote("geocode", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::remote("geocode", format!("HTTP {status}: {body}")));
        }

        let body = response.text().map_err(|e| Error::remote("geocode", e))?;
        parse_places(&body)
    }
}

/// Memoizes successful lookups of another geocoder.
///
/// Failures are not cached.
pub struct CachedGeocoder<G: Geocoder> {
    inner: G,
    cache: Mutex<LruCache<String, Vec<Coordinates>>>,
}

impl<G: Geocoder> CachedGeocoder<G> {
    /// Wraps `inner` with a cache of `capacity` addresses (at least one).
    #[must_use]
    pub fn new(inner: G, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn key(address: &PostalAddress) -> String {
        address.single_line().to_lowercase()
    }
}

impl<G: Geocoder> Geocoder for CachedGeocoder<G> {
    fn geocode(&self, address: &PostalAddress) -> Result<Vec<Coordinates>> {
        let key = Self::key(address);
        {
            let mut cache = self.cache.lock().map_err(|e| Error::failed("geocode_cache", e))?;
            if let Some(hit) = cache.get(&key) {
                metrics::counter!("peoplesync_geocode_cache_hits_total").increment(1);
                return Ok(hit.clone());
            }
        }

        let found = self.inner.geocode(address)?;
        self.cache
            .lock()
            .map_err(|e| Error::failed("geocode_cache", e))?
            .put(key, found.clone());
        Ok(found)
    }
}
