use std::time::Duration;

use crate::analytics::MetricDefaults;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    pub duckdb_memory_limit: String,
    pub cors_origins: Vec<String>,
    pub geo: GeoConfig,
    pub rate_limits: RateLimitConfig,
    pub metric_defaults: MetricDefaults,
    /// Maximum rows returned per analytics breakdown list.
    pub breakdown_limit: i64,
}

#[derive(Debug, Clone)]
pub struct GeoConfig {
    /// Path to a MaxMind-format city database. Skipped when absent.
    pub geoip_path: String,
    pub accuracy: GeoAccuracy,
    pub provider_timeout_ms: u64,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    pub cache_sweep_interval_secs: u64,
    pub ipinfo_token: Option<String>,
}

/// How many providers the resolver may try before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoAccuracy {
    /// First provider only.
    Fast,
    /// First two providers.
    Balanced,
    /// Every configured provider.
    Precise,
}

impl GeoAccuracy {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "fast" => Self::Fast,
            "precise" => Self::Precise,
            _ => Self::Balanced,
        }
    }

    /// Number of providers attempted for a chain of length `available`.
    pub fn provider_budget(self, available: usize) -> usize {
        match self {
            Self::Fast => available.min(1),
            Self::Balanced => available.min(2),
            Self::Precise => available,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub disabled: bool,
    pub contact: RateLimitPolicy,
    pub visitor_tracking: RateLimitPolicy,
    pub page_view: RateLimitPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window_secs: u64,
}

impl RateLimitPolicy {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            contact: RateLimitPolicy {
                limit: 5,
                window_secs: 3600,
            },
            visitor_tracking: RateLimitPolicy {
                limit: 30,
                window_secs: 60,
            },
            page_view: RateLimitPolicy {
                limit: 120,
                window_secs: 60,
            },
        }
    }
}

/// Bounce rate reported for a window without page views.
pub const DEFAULT_BOUNCE_RATE: f64 = 0.35;

/// Average session length reported for a window without recorded durations.
pub const DEFAULT_AVG_SESSION_SECS: f64 = 150.0;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_policy(prefix: &str, default: RateLimitPolicy) -> RateLimitPolicy {
    RateLimitPolicy {
        limit: env_or(&format!("{prefix}_LIMIT"), default.limit),
        window_secs: env_or(&format!("{prefix}_WINDOW_SECS"), default.window_secs),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let defaults = RateLimitConfig::default();
        Ok(Self {
            port: std::env::var("FOLIO_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("FOLIO_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            duckdb_memory_limit: std::env::var("FOLIO_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "1GB".to_string()),
            cors_origins: std::env::var("FOLIO_CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            geo: GeoConfig {
                geoip_path: std::env::var("FOLIO_GEOIP_PATH")
                    .unwrap_or_else(|_| "./GeoLite2-City.mmdb".to_string()),
                accuracy: GeoAccuracy::parse(
                    &std::env::var("FOLIO_GEO_ACCURACY").unwrap_or_default(),
                ),
                provider_timeout_ms: env_or("FOLIO_GEO_TIMEOUT_MS", 3000),
                cache_ttl_secs: env_or("FOLIO_GEO_CACHE_TTL_SECS", 86_400),
                cache_max_entries: env_or("FOLIO_GEO_CACHE_MAX_ENTRIES", 10_000),
                cache_sweep_interval_secs: env_or("FOLIO_GEO_CACHE_SWEEP_SECS", 3600),
                ipinfo_token: std::env::var("FOLIO_IPINFO_TOKEN")
                    .ok()
                    .filter(|t| !t.trim().is_empty()),
            },
            rate_limits: RateLimitConfig {
                disabled: std::env::var("FOLIO_RATE_LIMIT_DISABLE")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(false),
                contact: env_policy("FOLIO_CONTACT", defaults.contact),
                visitor_tracking: env_policy("FOLIO_TRACK", defaults.visitor_tracking),
                page_view: env_policy("FOLIO_PAGEVIEW", defaults.page_view),
            },
            metric_defaults: MetricDefaults {
                bounce_rate: env_or("FOLIO_DEFAULT_BOUNCE_RATE", DEFAULT_BOUNCE_RATE),
                avg_session_seconds: env_or(
                    "FOLIO_AVG_SESSION_FALLBACK_SECS",
                    DEFAULT_AVG_SESSION_SECS,
                ),
            },
            breakdown_limit: env_or("FOLIO_BREAKDOWN_LIMIT", 10),
        })
    }

    pub fn geo_provider_timeout(&self) -> Duration {
        Duration::from_millis(self.geo.provider_timeout_ms)
    }

    pub fn geo_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.geo.cache_ttl_secs)
    }

    pub fn geo_cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.geo.cache_sweep_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_tiers_bound_provider_count() {
        assert_eq!(GeoAccuracy::Fast.provider_budget(4), 1);
        assert_eq!(GeoAccuracy::Balanced.provider_budget(4), 2);
        assert_eq!(GeoAccuracy::Precise.provider_budget(4), 4);
        assert_eq!(GeoAccuracy::Balanced.provider_budget(1), 1);
        assert_eq!(GeoAccuracy::Fast.provider_budget(0), 0);
    }

    #[test]
    fn accuracy_parse_defaults_to_balanced() {
        assert_eq!(GeoAccuracy::parse("fast"), GeoAccuracy::Fast);
        assert_eq!(GeoAccuracy::parse("precise"), GeoAccuracy::Precise);
        assert_eq!(GeoAccuracy::parse(""), GeoAccuracy::Balanced);
        assert_eq!(GeoAccuracy::parse("bogus"), GeoAccuracy::Balanced);
    }
}
