use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use duckdb::Connection;

use folio_core::analytics::{
    AnalyticsWindow, BreakdownRow, DailyPoint, PageRow, TrafficBreakdowns, VisitorBreakdowns,
};

use super::count;
use crate::backend::format_ts;
use crate::DuckDbBackend;

/// Visitors active in `[?1, ?2)`.
const ACTIVE_VISITORS_WHERE: &str =
    "last_visit >= CAST(?1 AS TIMESTAMP) AND first_visit < CAST(?2 AS TIMESTAMP)";

/// Page views created in `[?1, ?2)`.
const PAGE_VIEWS_WHERE: &str =
    "created_at >= CAST(?1 AS TIMESTAMP) AND created_at < CAST(?2 AS TIMESTAMP)";

/// Group `table` rows in the window by `column`, largest groups first.
/// `NULL` values are reported as `"Unknown"`.
fn grouped_counts(
    conn: &Connection,
    table: &str,
    column: &str,
    where_sql: &str,
    start: &str,
    end: &str,
    limit: i64,
) -> Result<Vec<BreakdownRow>> {
    let sql = format!(
        "SELECT COALESCE({column}, 'Unknown') AS dim, COUNT(*) AS n \
         FROM {table} \
         WHERE {where_sql} \
         GROUP BY 1 \
         ORDER BY n DESC, dim ASC \
         LIMIT ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(duckdb::params![start, end, limit], |row| {
        Ok(BreakdownRow {
            value: row.get(0)?,
            count: row.get(1)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

impl DuckDbBackend {
    /// Where visitors in the window come from, and how many are new.
    pub async fn visitor_breakdowns(
        &self,
        window: AnalyticsWindow,
        limit: i64,
    ) -> Result<VisitorBreakdowns> {
        let conn = self.conn.lock().await;
        let start = format_ts(window.start);
        let end = format_ts(window.end);

        let countries = grouped_counts(
            &conn,
            "visitors",
            "country",
            ACTIVE_VISITORS_WHERE,
            &start,
            &end,
            limit,
        )?;
        let cities = grouped_counts(
            &conn,
            "visitors",
            "city",
            ACTIVE_VISITORS_WHERE,
            &start,
            &end,
            limit,
        )?;

        let new_visitors = count(
            &conn,
            "SELECT COUNT(*) FROM visitors \
             WHERE first_visit >= CAST(?1 AS TIMESTAMP) AND first_visit < CAST(?2 AS TIMESTAMP)",
            &[&start, &end],
        )?;
        // Active in the window but first seen before it; together with
        // `new_visitors` this partitions the window's active visitors.
        let returning_visitors = count(
            &conn,
            "SELECT COUNT(*) FROM visitors \
             WHERE first_visit < CAST(?1 AS TIMESTAMP) AND last_visit >= CAST(?1 AS TIMESTAMP)",
            &[&start],
        )?;

        Ok(VisitorBreakdowns {
            countries,
            cities,
            new_visitors,
            returning_visitors,
        })
    }

    /// Which pages, devices and browsers the window's traffic hit, plus a
    /// zero-filled daily series.
    pub async fn traffic_breakdowns(
        &self,
        window: AnalyticsWindow,
        limit: i64,
    ) -> Result<TrafficBreakdowns> {
        let conn = self.conn.lock().await;
        let start = format_ts(window.start);
        let end = format_ts(window.end);

        let top_pages = {
            let sql = format!(
                "SELECT path, COUNT(*) AS views, COUNT(DISTINCT visitor_ip) AS unique_visitors \
                 FROM page_views \
                 WHERE {PAGE_VIEWS_WHERE} \
                 GROUP BY path \
                 ORDER BY views DESC, path ASC \
                 LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(duckdb::params![start, end, limit], |row| {
                Ok(PageRow {
                    path: row.get(0)?,
                    views: row.get(1)?,
                    unique_visitors: row.get(2)?,
                })
            })?;
            let mut pages = Vec::new();
            for row in rows {
                pages.push(row?);
            }
            pages
        };

        let devices = grouped_counts(
            &conn,
            "page_views",
            "device_type",
            PAGE_VIEWS_WHERE,
            &start,
            &end,
            limit,
        )?;
        let browsers = grouped_counts(
            &conn,
            "page_views",
            "browser",
            PAGE_VIEWS_WHERE,
            &start,
            &end,
            limit,
        )?;

        let mut by_day: BTreeMap<String, (i64, i64)> = BTreeMap::new();
        {
            let sql = format!(
                "SELECT CAST(CAST(created_at AS DATE) AS VARCHAR) AS day, \
                        COUNT(*) AS page_views, \
                        COUNT(DISTINCT visitor_ip) AS visitors \
                 FROM page_views \
                 WHERE {PAGE_VIEWS_WHERE} \
                 GROUP BY 1 \
                 ORDER BY 1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(duckdb::params![start, end], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
            })?;
            for row in rows {
                let (day, page_views, visitors) = row?;
                by_day.insert(day, (page_views, visitors));
            }
        }

        Ok(TrafficBreakdowns {
            top_pages,
            devices,
            browsers,
            daily: fill_days(window, &by_day),
        })
    }
}

/// One point per UTC day touched by the window, zero where nothing was
/// recorded.
fn fill_days(window: AnalyticsWindow, by_day: &BTreeMap<String, (i64, i64)>) -> Vec<DailyPoint> {
    let first = window.start.date_naive();
    let last = (window.end - Duration::nanoseconds(1)).date_naive();
    let mut out = Vec::new();
    let mut day: NaiveDate = first;
    while day <= last {
        let key = day.format("%Y-%m-%d").to_string();
        let (page_views, visitors) = by_day.get(&key).copied().unwrap_or((0, 0));
        out.push(DailyPoint {
            date: key,
            page_views,
            visitors,
        });
        day += Duration::days(1);
    }
    out
}
