//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: page view log
    r#"
    -- Timestamps are UTC Unix milliseconds so range filters and
    -- bucket arithmetic stay integer comparisons.
    CREATE TABLE IF NOT EXISTS page_views (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id       TEXT NOT NULL,
        ts_ms            INTEGER NOT NULL,
        page             TEXT NOT NULL,
        site             TEXT NOT NULL,
        ip               TEXT NOT NULL,

        -- Geolocation (nullable: lookup may fail)
        country_code     TEXT,
        country_name     TEXT,
        city             TEXT,
        region           TEXT,
        latitude         REAL,
        longitude        REAL
    );

    CREATE INDEX IF NOT EXISTS idx_page_views_ts ON page_views(ts_ms);
    CREATE INDEX IF NOT EXISTS idx_page_views_session_ts ON page_views(session_id, ts_ms);
    "#,
    // Version 2: site-scoped queries
    r#"
    CREATE INDEX IF NOT EXISTS idx_page_views_site_ts ON page_views(site, ts_ms);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
