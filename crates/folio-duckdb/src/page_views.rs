use anyhow::Result;

use folio_core::page_view::{NewPageView, PageView};

use crate::backend::format_ts;
use crate::DuckDbBackend;

impl DuckDbBackend {
    /// Insert one page view, copying `country` from the visitor row.
    ///
    /// A page view from an IP with no visitor row is still stored; its
    /// country is left `NULL`.
    pub async fn insert_page_view(&self, pv: NewPageView) -> Result<PageView> {
        let conn = self.conn.lock().await;

        let country: Option<String> = {
            let mut stmt = conn.prepare("SELECT country FROM visitors WHERE ip = ?1")?;
            let mut rows = stmt.query(duckdb::params![pv.visitor_ip])?;
            let country = match rows.next()? {
                Some(row) => row.get(0)?,
                None => None,
            };
            country
        };

        conn.execute(
            "INSERT INTO page_views (
                id, visitor_ip, path, title, created_at, duration_seconds,
                device_type, browser, os, country
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            duckdb::params![
                pv.id,
                pv.visitor_ip,
                pv.path,
                pv.title,
                format_ts(pv.created_at),
                pv.duration_seconds,
                pv.device_type,
                pv.browser,
                pv.os,
                country
            ],
        )?;

        Ok(PageView {
            id: pv.id,
            visitor_ip: pv.visitor_ip,
            path: pv.path,
            title: pv.title,
            duration_seconds: pv.duration_seconds,
            device_type: pv.device_type,
            browser: pv.browser,
            os: pv.os,
            country,
            created_at: pv.created_at,
        })
    }

    /// Set the duration reported by the unload beacon.
    pub async fn set_page_view_duration(&self, id: &str, seconds: f64) -> Result<bool> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE page_views SET duration_seconds = ?1 WHERE id = ?2",
            duckdb::params![seconds, id],
        )?;
        Ok(updated > 0)
    }
}
