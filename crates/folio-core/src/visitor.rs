use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row of the `visitors` table. One row per distinct client IP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visitor {
    pub ip: String,
    pub visit_count: i64,
    pub first_visit: DateTime<Utc>,
    pub last_visit: DateTime<Utc>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub user_agent: Option<String>,
}

/// Result of the atomic insert-or-increment performed by
/// [`crate::store::VisitorStore::upsert_visit`].
#[derive(Debug, Clone, Serialize)]
pub struct VisitOutcome {
    /// The visitor's cumulative visit count after this visit.
    pub visit_count: i64,
    /// Distinct visitors in the table after this visit.
    pub total_visitors: i64,
    /// Location stored on the visitor row. For returning visitors this is the
    /// location recorded on their first visit, not the one passed in.
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

/// Response of `recordVisit`, serialised as-is by the tracking endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct VisitSummary {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub total_visitors: i64,
    pub this_visitor_count: i64,
    pub is_new: bool,
}

impl VisitSummary {
    pub fn from_outcome(outcome: VisitOutcome) -> Self {
        Self {
            country: outcome.country,
            region: outcome.region,
            city: outcome.city,
            total_visitors: outcome.total_visitors,
            this_visitor_count: outcome.visit_count,
            is_new: outcome.visit_count == 1,
        }
    }
}
