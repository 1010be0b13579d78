use anyhow::Result;
use chrono::{DateTime, Utc};

use folio_core::location::Location;
use folio_core::visitor::{VisitOutcome, Visitor};

use crate::backend::{format_ts, parse_ts};
use crate::DuckDbBackend;

impl DuckDbBackend {
    /// Fetch the visitor row for `ip`, if any.
    pub async fn find_visitor(&self, ip: &str) -> Result<Option<Visitor>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT ip, visit_count, CAST(first_visit AS VARCHAR), CAST(last_visit AS VARCHAR), \
                    country, region, city, user_agent \
             FROM visitors WHERE ip = ?1",
        )?;
        let mut rows = stmt.query(duckdb::params![ip])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let first_visit: String = row.get(2)?;
        let last_visit: String = row.get(3)?;
        Ok(Some(Visitor {
            ip: row.get(0)?,
            visit_count: row.get(1)?,
            first_visit: parse_ts(&first_visit)?,
            last_visit: parse_ts(&last_visit)?,
            country: row.get(4)?,
            region: row.get(5)?,
            city: row.get(6)?,
            user_agent: row.get(7)?,
        }))
    }

    /// Record one visit from `ip` as a single conditional insert-or-increment.
    ///
    /// A new row starts at `visit_count = 1` with `location`. An existing row
    /// has its count incremented and `last_visit` refreshed; its location is
    /// left as first resolved. The follow-up reads happen under the same
    /// connection lock, so the returned counts include this visit and no
    /// other writer's.
    pub async fn upsert_visit(
        &self,
        ip: &str,
        location: &Location,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<VisitOutcome> {
        let conn = self.conn.lock().await;
        let now_str = format_ts(now);

        conn.execute(
            "INSERT INTO visitors (ip, visit_count, first_visit, last_visit, country, region, city, user_agent) \
             VALUES (?1, 1, ?2, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT (ip) DO UPDATE SET \
                 visit_count = visitors.visit_count + 1, \
                 last_visit = EXCLUDED.last_visit, \
                 user_agent = COALESCE(EXCLUDED.user_agent, visitors.user_agent)",
            duckdb::params![
                ip,
                now_str,
                location.country,
                location.region,
                location.city,
                user_agent
            ],
        )?;

        let mut outcome = conn
            .prepare("SELECT visit_count, country, region, city FROM visitors WHERE ip = ?1")?
            .query_row(duckdb::params![ip], |row| {
                Ok(VisitOutcome {
                    visit_count: row.get(0)?,
                    total_visitors: 0,
                    country: row.get(1)?,
                    region: row.get(2)?,
                    city: row.get(3)?,
                })
            })?;

        outcome.total_visitors = conn
            .prepare("SELECT COUNT(*) FROM visitors")?
            .query_row([], |row| row.get(0))?;

        Ok(outcome)
    }
}
