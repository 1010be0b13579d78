use std::net::IpAddr;
use std::time::Duration;

use tracing::{debug, warn};

use folio_core::config::GeoAccuracy;
use folio_core::location::Location;

use super::providers::{GeoError, GeoProvider};

/// Ordered provider chain with per-call timeout.
///
/// Each provider gets one attempt. The first result carrying a country,
/// region or city wins; if none does, the all-null location is returned.
pub struct GeoResolver {
    providers: Vec<Box<dyn GeoProvider>>,
    accuracy: GeoAccuracy,
    timeout: Duration,
}

impl GeoResolver {
    pub fn new(
        providers: Vec<Box<dyn GeoProvider>>,
        accuracy: GeoAccuracy,
        timeout: Duration,
    ) -> Self {
        Self {
            providers,
            accuracy,
            timeout,
        }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub async fn resolve(&self, ip: IpAddr) -> Location {
        let budget = self.accuracy.provider_budget(self.providers.len());

        for provider in self.providers.iter().take(budget) {
            let attempt = tokio::time::timeout(self.timeout, provider.lookup(ip, self.timeout))
                .await
                .unwrap_or(Err(GeoError::Timeout));

            match attempt {
                Ok(location) if location.has_geo() => {
                    debug!(provider = provider.name(), %ip, "Geo lookup resolved");
                    return location;
                }
                Ok(_) => {
                    warn!(provider = provider.name(), %ip, error = %GeoError::NoData, "Geo lookup failed");
                }
                Err(e) => {
                    warn!(provider = provider.name(), %ip, error = %e, "Geo lookup failed");
                }
            }
        }

        warn!(%ip, attempted = budget, "All geo providers failed");
        Location::default()
    }
}
