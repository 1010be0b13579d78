use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The payload a page sends to `POST /api/page-views`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageViewPayload {
    pub path: String,
    pub title: Option<String>,
    pub duration_seconds: Option<f64>,
}

/// A page view ready to be written. Built by the server after user-agent
/// parsing; `country` is filled in by the store from the visitor row.
#[derive(Debug, Clone)]
pub struct NewPageView {
    pub id: String,
    pub visitor_ip: String,
    pub path: String,
    pub title: Option<String>,
    pub duration_seconds: Option<f64>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A stored `page_views` row.
#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub id: String,
    pub visitor_ip: String,
    pub path: String,
    pub title: Option<String>,
    pub duration_seconds: Option<f64>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Reduce a page location to its path: query string and fragment dropped,
/// scheme and host stripped from absolute URLs, empty input mapped to `/`.
pub fn normalize_path(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_fragment = trimmed.split('#').next().unwrap_or(trimmed);
    let without_query = without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment);
    let path = match without_query.find("://") {
        Some(idx) => {
            let rest = &without_query[idx + 3..];
            rest.find('/').map_or("/", |p| &rest[p..])
        }
        None => without_query,
    };
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Validate an optional duration reported by the client.
pub fn validate_duration(duration: Option<f64>) -> Result<Option<f64>, CoreError> {
    match duration {
        Some(d) if !d.is_finite() || d < 0.0 => Err(CoreError::InvalidDuration(d)),
        other => Ok(other),
    }
}
