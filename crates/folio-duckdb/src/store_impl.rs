use async_trait::async_trait;
use chrono::{DateTime, Utc};

use folio_core::analytics::{
    AnalyticsWindow, MetricDefaults, Overview, RollupBoundaries, TrafficBreakdowns,
    VisitorBreakdowns,
};
use folio_core::location::Location;
use folio_core::page_view::{NewPageView, PageView};
use folio_core::store::VisitorStore;
use folio_core::visitor::{VisitOutcome, Visitor};

use crate::DuckDbBackend;

#[async_trait]
impl VisitorStore for DuckDbBackend {
    async fn find_visitor(&self, ip: &str) -> anyhow::Result<Option<Visitor>> {
        DuckDbBackend::find_visitor(self, ip).await
    }

    async fn upsert_visit(
        &self,
        ip: &str,
        location: &Location,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<VisitOutcome> {
        DuckDbBackend::upsert_visit(self, ip, location, user_agent, now).await
    }

    async fn insert_page_view(&self, page_view: NewPageView) -> anyhow::Result<PageView> {
        DuckDbBackend::insert_page_view(self, page_view).await
    }

    async fn set_page_view_duration(&self, id: &str, seconds: f64) -> anyhow::Result<bool> {
        DuckDbBackend::set_page_view_duration(self, id, seconds).await
    }

    async fn overview(
        &self,
        window: AnalyticsWindow,
        rollups: RollupBoundaries,
        defaults: MetricDefaults,
    ) -> anyhow::Result<Overview> {
        DuckDbBackend::overview(self, window, rollups, defaults).await
    }

    async fn visitor_breakdowns(
        &self,
        window: AnalyticsWindow,
        limit: i64,
    ) -> anyhow::Result<VisitorBreakdowns> {
        DuckDbBackend::visitor_breakdowns(self, window, limit).await
    }

    async fn traffic_breakdowns(
        &self,
        window: AnalyticsWindow,
        limit: i64,
    ) -> anyhow::Result<TrafficBreakdowns> {
        DuckDbBackend::traffic_breakdowns(self, window, limit).await
    }

    async fn ping(&self) -> anyhow::Result<()> {
        DuckDbBackend::ping(self).await
    }
}
