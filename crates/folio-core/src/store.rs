//! Storage abstraction for visitors and page views.

use chrono::{DateTime, Utc};

use crate::analytics::{
    AnalyticsWindow, MetricDefaults, Overview, RollupBoundaries, TrafficBreakdowns,
    VisitorBreakdowns,
};
use crate::location::Location;
use crate::page_view::{NewPageView, PageView};
use crate::visitor::{VisitOutcome, Visitor};

/// Persistence interface consumed by the tracking and analytics layers.
///
/// Implementations must make [`VisitorStore::upsert_visit`] a single atomic
/// insert-or-increment keyed by IP: concurrent first visits from the same
/// address must end with one row whose count reflects every visit.
#[async_trait::async_trait]
pub trait VisitorStore: Send + Sync + 'static {
    async fn find_visitor(&self, ip: &str) -> anyhow::Result<Option<Visitor>>;

    /// Insert a visitor with `visit_count = 1` and `location`, or increment
    /// the existing row and refresh `last_visit`, leaving its stored location
    /// untouched.
    async fn upsert_visit(
        &self,
        ip: &str,
        location: &Location,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<VisitOutcome>;

    async fn insert_page_view(&self, page_view: NewPageView) -> anyhow::Result<PageView>;

    /// Returns `false` when no page view has the given id.
    async fn set_page_view_duration(&self, id: &str, seconds: f64) -> anyhow::Result<bool>;

    async fn overview(
        &self,
        window: AnalyticsWindow,
        rollups: RollupBoundaries,
        defaults: MetricDefaults,
    ) -> anyhow::Result<Overview>;

    async fn visitor_breakdowns(
        &self,
        window: AnalyticsWindow,
        limit: i64,
    ) -> anyhow::Result<VisitorBreakdowns>;

    async fn traffic_breakdowns(
        &self,
        window: AnalyticsWindow,
        limit: i64,
    ) -> anyhow::Result<TrafficBreakdowns>;

    /// Lightweight liveness check.
    async fn ping(&self) -> anyhow::Result<()>;
}
