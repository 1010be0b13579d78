use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use folio_core::config::Config;
use folio_core::store::VisitorStore;
use folio_duckdb::DuckDbBackend;

use crate::geo::GeoLocator;
use crate::rate_limit::{RateLimitPurpose, RateLimiter};
use crate::tracker::VisitorTracker;

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
pub struct AppState {
    /// Persistence. DuckDB in production, any [`VisitorStore`] in tests.
    pub store: Arc<dyn VisitorStore>,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,

    /// Geolocation pipeline. Owns the geo cache whose sweeper `main` spawns.
    pub geo: Arc<GeoLocator>,

    pub rate_limiter: Arc<RateLimiter>,

    pub tracker: VisitorTracker,
}

impl AppState {
    /// Construct state over a DuckDB backend with the standard provider chain.
    pub fn new(db: DuckDbBackend, config: Config) -> Self {
        let geo = Arc::new(GeoLocator::from_config(&config));
        Self::with_geo(Arc::new(db), config, geo)
    }

    /// Construct state with an explicit store and geolocation pipeline.
    pub fn with_geo(store: Arc<dyn VisitorStore>, config: Config, geo: Arc<GeoLocator>) -> Self {
        let tracker = VisitorTracker::new(
            Arc::clone(&store),
            Arc::clone(&geo),
            config.metric_defaults,
            config.breakdown_limit,
        );
        Self {
            store,
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limits.clone())),
            config: Arc::new(config),
            geo,
            tracker,
        }
    }

    /// `Err(retry_after_seconds)` when `ip` is over its budget for `purpose`.
    pub async fn check_rate_limit(&self, purpose: RateLimitPurpose, ip: &str) -> Result<(), u64> {
        if self.rate_limiter.is_rate_limited(purpose, ip).await {
            Err(self.rate_limiter.policy(purpose).window_secs)
        } else {
            Ok(())
        }
    }

    /// Background loop: drop elapsed rate-limit windows once a minute.
    ///
    /// Spawned as a `tokio::spawn` task in `main.rs`. Runs until the process
    /// exits.
    pub async fn run_rate_limit_purge_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            let purged = self.rate_limiter.purge_expired().await;
            if purged > 0 {
                info!(purged, "Expired rate-limit windows purged");
            }
        }
    }
}
