//! Geolocation pipeline: local check, TTL cache, provider chain.

pub mod cache;
pub mod providers;
pub mod resolver;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use folio_core::config::Config;
use folio_core::location::{classify_ip, IpClass, Location};

pub use cache::{GeoCache, SweepHandle};
pub use providers::{GeoError, GeoProvider, HttpProvider, MaxMindProvider};
pub use resolver::GeoResolver;

pub struct GeoLocator {
    cache: Arc<GeoCache>,
    resolver: GeoResolver,
    ttl: Duration,
}

impl GeoLocator {
    pub fn new(cache: Arc<GeoCache>, resolver: GeoResolver, ttl: Duration) -> Self {
        Self {
            cache,
            resolver,
            ttl,
        }
    }

    /// Build the standard chain from configuration.
    pub fn from_config(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .timeout(config.geo_provider_timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let resolver = GeoResolver::new(
            providers::default_providers(config, client),
            config.geo.accuracy,
            config.geo_provider_timeout(),
        );
        Self::new(
            Arc::new(GeoCache::new(config.geo.cache_max_entries)),
            resolver,
            config.geo_cache_ttl(),
        )
    }

    pub fn cache(&self) -> &Arc<GeoCache> {
        &self.cache
    }

    pub fn resolver(&self) -> &GeoResolver {
        &self.resolver
    }

    /// Resolve `ip` to a location. Never fails.
    ///
    /// Private addresses short-circuit to [`Location::local`] and unparseable
    /// strings to an empty location; neither is cached nor sent to a
    /// provider. Public addresses go through the cache, and only results
    /// that carry a country, region or city are stored.
    pub async fn locate(&self, ip: &str) -> Location {
        let addr = match classify_ip(ip) {
            IpClass::Local => return Location::local(),
            IpClass::Invalid => {
                debug!(ip, "Skipping geolocation for unparseable address");
                return Location::default();
            }
            IpClass::Public(addr) => addr,
        };

        if let Some(hit) = self.cache.get(ip).await {
            return hit;
        }

        let location = self.resolver.resolve(addr).await;
        if location.has_geo() {
            self.cache.put(ip, location.clone(), self.ttl).await;
        }
        location
    }
}
