/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// All statements use `IF NOT EXISTS` so they are safe to re-run on every
/// startup.
///
/// `memory_limit` comes from `Config.duckdb_memory_limit`
/// (env `FOLIO_DUCKDB_MEMORY`, default `"1GB"`).
///
/// `visitors` deliberately carries no secondary index: DuckDB rejects
/// `ON CONFLICT DO UPDATE` assignments to indexed columns, and the visit
/// upsert rewrites `visit_count` and `last_visit`.
///
/// `page_views.visitor_ip` is not a foreign key. Page views outlive any
/// cleanup of the visitor they reference.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- VISITORS (one row per client IP)
-- ===========================================
CREATE TABLE IF NOT EXISTS visitors (
    ip              VARCHAR PRIMARY KEY,
    visit_count     BIGINT NOT NULL DEFAULT 1,
    first_visit     TIMESTAMP NOT NULL,
    last_visit      TIMESTAMP NOT NULL,
    country         VARCHAR,                       -- "Local" for private networks
    region          VARCHAR,
    city            VARCHAR,
    user_agent      VARCHAR
);

-- ===========================================
-- PAGE VIEWS (one row per page load)
-- ===========================================
CREATE TABLE IF NOT EXISTS page_views (
    id               VARCHAR PRIMARY KEY,          -- UUID v4
    visitor_ip       VARCHAR NOT NULL,
    path             VARCHAR NOT NULL,
    title            VARCHAR,
    created_at       TIMESTAMP NOT NULL,
    duration_seconds DOUBLE,                       -- set later by the unload beacon
    device_type      VARCHAR,                      -- desktop | mobile | tablet
    browser          VARCHAR,
    os               VARCHAR,
    country          VARCHAR                       -- copied from visitors at write time
);
CREATE INDEX IF NOT EXISTS idx_page_views_created_at
    ON page_views(created_at);
CREATE INDEX IF NOT EXISTS idx_page_views_visitor
    ON page_views(visitor_ip, created_at);
"#
    )
}
