pub mod breakdowns;
pub mod overview;

use duckdb::Connection;

/// Run a single-value `COUNT(*)`-style query.
pub(crate) fn count(conn: &Connection, sql: &str, params: &[&dyn duckdb::types::ToSql]) -> anyhow::Result<i64> {
    let value: i64 = conn.prepare(sql)?.query_row(params, |row| row.get(0))?;
    Ok(value)
}
