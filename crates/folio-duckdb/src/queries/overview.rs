use anyhow::Result;

use folio_core::analytics::{
    average_session_seconds, bounce_rate, AnalyticsWindow, MetricDefaults, Overview,
    RollupBoundaries,
};

use super::count;
use crate::backend::format_ts;
use crate::DuckDbBackend;

/// Visitors active since the given instant (last visit on or after it).
const ACTIVE_SINCE_SQL: &str = "SELECT COUNT(*) FROM visitors WHERE last_visit >= CAST(?1 AS TIMESTAMP)";

/// Per-visitor page-view counts inside the window; bounced visitors are
/// those with exactly one view.
const BOUNCE_SQL: &str = r#"
    WITH per_visitor AS (
        SELECT visitor_ip, COUNT(*) AS views
        FROM page_views
        WHERE created_at >= CAST(?1 AS TIMESTAMP)
          AND created_at < CAST(?2 AS TIMESTAMP)
        GROUP BY visitor_ip
    )
    SELECT
        COUNT(*) AS visitors,
        CAST(COALESCE(SUM(CASE WHEN views = 1 THEN 1 ELSE 0 END), 0) AS BIGINT) AS bounced
    FROM per_visitor
"#;

const AVG_DURATION_SQL: &str = r#"
    SELECT AVG(duration_seconds)
    FROM page_views
    WHERE created_at >= CAST(?1 AS TIMESTAMP)
      AND created_at < CAST(?2 AS TIMESTAMP)
      AND duration_seconds IS NOT NULL
      AND duration_seconds > 0
"#;

impl DuckDbBackend {
    /// Headline counters for the dashboard.
    ///
    /// Everything is recomputed from the tables on each call; nothing is
    /// maintained incrementally.
    pub async fn overview(
        &self,
        window: AnalyticsWindow,
        rollups: RollupBoundaries,
        defaults: MetricDefaults,
    ) -> Result<Overview> {
        let conn = self.conn.lock().await;
        let start = format_ts(window.start);
        let end = format_ts(window.end);

        let total_visitors = count(&conn, "SELECT COUNT(*) FROM visitors", &[])?;
        let visitors_today = count(&conn, ACTIVE_SINCE_SQL, &[&format_ts(rollups.today_start)])?;
        let visitors_this_week = count(&conn, ACTIVE_SINCE_SQL, &[&format_ts(rollups.week_start)])?;
        let visitors_this_month =
            count(&conn, ACTIVE_SINCE_SQL, &[&format_ts(rollups.month_start)])?;
        let visitors_in_range = count(
            &conn,
            "SELECT COUNT(*) FROM visitors \
             WHERE last_visit >= CAST(?1 AS TIMESTAMP) AND first_visit < CAST(?2 AS TIMESTAMP)",
            &[&start, &end],
        )?;

        let total_page_views = count(&conn, "SELECT COUNT(*) FROM page_views", &[])?;
        let page_views_in_range = count(
            &conn,
            "SELECT COUNT(*) FROM page_views \
             WHERE created_at >= CAST(?1 AS TIMESTAMP) AND created_at < CAST(?2 AS TIMESTAMP)",
            &[&start, &end],
        )?;

        let (visitors_with_views, bounced): (i64, i64) = conn
            .prepare(BOUNCE_SQL)?
            .query_row(duckdb::params![start, end], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mean_duration: Option<f64> = conn
            .prepare(AVG_DURATION_SQL)?
            .query_row(duckdb::params![start, end], |row| row.get(0))?;

        Ok(Overview {
            total_visitors,
            visitors_today,
            visitors_this_week,
            visitors_this_month,
            visitors_in_range,
            total_page_views,
            page_views_in_range,
            bounce_rate: bounce_rate(bounced, visitors_with_views, defaults.bounce_rate),
            avg_session_seconds: average_session_seconds(
                mean_duration,
                defaults.avg_session_seconds,
            ),
        })
    }
}
