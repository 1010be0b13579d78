use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use folio_core::analytics::{AnalyticsRange, AnalyticsSnapshot, MetricDefaults, RollupBoundaries};
use folio_core::error::CoreError;
use folio_core::location::Location;
use folio_core::page_view::{normalize_path, validate_duration, NewPageView, PageView, PageViewPayload};
use folio_core::store::VisitorStore;
use folio_core::visitor::VisitSummary;

use crate::geo::GeoLocator;
use crate::user_agent::parse_user_agent;

/// Visitor aggregation and page-view recording on top of a [`VisitorStore`].
pub struct VisitorTracker {
    store: Arc<dyn VisitorStore>,
    geo: Arc<GeoLocator>,
    defaults: MetricDefaults,
    breakdown_limit: i64,
}

impl VisitorTracker {
    pub fn new(
        store: Arc<dyn VisitorStore>,
        geo: Arc<GeoLocator>,
        defaults: MetricDefaults,
        breakdown_limit: i64,
    ) -> Self {
        Self {
            store,
            geo,
            defaults,
            breakdown_limit: breakdown_limit.max(1),
        }
    }

    /// Count one visit from `ip`.
    ///
    /// Location is only resolved for IPs without a visitor row; returning
    /// visitors keep the location stored on their first visit.
    pub async fn record_visit(
        &self,
        ip: &str,
        user_agent: Option<&str>,
    ) -> anyhow::Result<VisitSummary> {
        let location = match self.store.find_visitor(ip).await? {
            Some(_) => Location::default(),
            None => self.geo.locate(ip).await,
        };

        let user_agent = user_agent.map(str::trim).filter(|ua| !ua.is_empty());
        let outcome = self
            .store
            .upsert_visit(ip, &location, user_agent, Utc::now())
            .await?;

        let summary = VisitSummary::from_outcome(outcome);
        if summary.is_new {
            info!(
                ip,
                country = summary.country.as_deref().unwrap_or("unknown"),
                total_visitors = summary.total_visitors,
                "New visitor"
            );
        } else {
            debug!(ip, visits = summary.this_visitor_count, "Returning visitor");
        }
        Ok(summary)
    }

    pub async fn record_page_view(
        &self,
        ip: &str,
        user_agent: Option<&str>,
        payload: PageViewPayload,
    ) -> Result<PageView, RecordError> {
        let duration_seconds = validate_duration(payload.duration_seconds)?;
        let ua = parse_user_agent(user_agent.unwrap_or(""));
        let title = payload
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let page_view = NewPageView {
            id: uuid::Uuid::new_v4().to_string(),
            visitor_ip: ip.to_string(),
            path: normalize_path(&payload.path),
            title,
            duration_seconds,
            device_type: ua.device_type,
            browser: ua.browser,
            os: ua.os,
            created_at: Utc::now(),
        };
        Ok(self.store.insert_page_view(page_view).await?)
    }

    /// Returns `Ok(false)` when `id` names no page view.
    pub async fn set_page_view_duration(&self, id: &str, seconds: f64) -> Result<bool, RecordError> {
        let seconds = validate_duration(Some(seconds))?.unwrap_or_default();
        Ok(self.store.set_page_view_duration(id, seconds).await?)
    }

    /// Compute the dashboard snapshot for `range`, running the three
    /// aggregate queries concurrently.
    pub async fn analytics_snapshot(
        &self,
        range: AnalyticsRange,
    ) -> anyhow::Result<AnalyticsSnapshot> {
        let now = Utc::now();
        let window = range.window(now);
        let rollups = RollupBoundaries::at(now);

        let (overview, visitor_breakdowns, traffic_breakdowns) = tokio::try_join!(
            self.store.overview(window, rollups, self.defaults),
            self.store.visitor_breakdowns(window, self.breakdown_limit),
            self.store.traffic_breakdowns(window, self.breakdown_limit),
        )?;

        Ok(AnalyticsSnapshot {
            range: range.label(),
            start: window.start,
            end: window.end,
            overview,
            visitor_breakdowns,
            traffic_breakdowns,
        })
    }
}

/// Failure of a page-view write: bad input or a store error.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
