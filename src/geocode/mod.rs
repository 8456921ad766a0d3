//! Geocoding support: result type, provider trait, and the caching wrapper.
//!
//! The HTTP side of geocoding is an external concern; providers implement
//! [`Geocoder`] and callers wrap them in [`CachedGeocoder`] to avoid
//! repeated lookups for the same address.

pub mod cache;

pub use cache::GeocodingCache;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub lon: f64,
    pub lat: f64,
    #[serde(default)]
    pub display_name: Option<String>,
}

pub trait Geocoder {
    /// Stable provider identifier; selects the cache table.
    fn provider(&self) -> &str;

    /// Resolve an address. `Ok(None)` means the provider had no match.
    fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>>;
}

/// Memoizing wrapper around a [`Geocoder`]. Cache failures never block the
/// geocoding call itself.
pub struct CachedGeocoder<G> {
    inner: G,
    cache: GeocodingCache,
}

impl<G: Geocoder> CachedGeocoder<G> {
    pub fn new(inner: G, cache: GeocodingCache) -> Self {
        Self { inner, cache }
    }
}

impl<G: Geocoder> Geocoder for CachedGeocoder<G> {
    fn provider(&self) -> &str {
        self.inner.provider()
    }

    fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>> {
        if let Some(hit) = self.cache.lookup(address) {
            return Ok(Some(hit));
        }
        let result = self.inner.geocode(address)?;
        if let Some(ref found) = result {
            self.cache.store(address, found);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGeocoder {
        calls: AtomicUsize,
    }

    impl Geocoder for CountingGeocoder {
        fn provider(&self) -> &str {
            "counting"
        }

        fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if address == "nowhere" {
                return Ok(None);
            }
            Ok(Some(GeocodeResult {
                lon: 5.12,
                lat: 52.09,
                display_name: Some(address.to_string()),
            }))
        }
    }

    #[test]
    fn second_lookup_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GeocodingCache::open_at(&dir.path().join("cache.sqlite"), "counting");
        let geocoder = CachedGeocoder::new(
            CountingGeocoder {
                calls: AtomicUsize::new(0),
            },
            cache,
        );

        let first = geocoder.geocode("Domplein 1, Utrecht").unwrap().unwrap();
        let second = geocoder.geocode("Domplein 1, Utrecht").unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(geocoder.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn provider_misses_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GeocodingCache::open_at(&dir.path().join("cache.sqlite"), "counting");
        let geocoder = CachedGeocoder::new(
            CountingGeocoder {
                calls: AtomicUsize::new(0),
            },
            cache,
        );

        assert!(geocoder.geocode("nowhere").unwrap().is_none());
        assert!(geocoder.geocode("nowhere").unwrap().is_none());
        assert_eq!(geocoder.inner.calls.load(Ordering::SeqCst), 2);
    }
}
