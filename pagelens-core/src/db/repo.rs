//! Database repository layer
//!
//! Insert operations for page views and the read queries the analytics
//! engine is built on. Grouped counts are computed in SQL (interval buckets
//! are finished in Rust); ordered per-session
//! sequences are returned for the computations that need event order.
//!
//! Every range query filters `ts_ms BETWEEN from AND to` (both inclusive)
//! and, when a site is given, `site = ?`.

use crate::error::{Error, Result};
use crate::types::{EventFilter, PageView};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::{params, Connection, Row};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Per-session span and page counts, the raw input of feature extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSpanRow {
    pub session_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Total page views in range
    pub page_count: i64,
    /// Distinct pages in range
    pub unique_page_count: i64,
}

/// Event and session counts for one interval bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalRow {
    /// Bucket index; may fall outside `[0, intervals)` at the range edge
    pub interval: i64,
    pub unique_sessions: i64,
    pub total_events: i64,
}

/// Distinct sessions of one cohort active `week_number` weeks after it began.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CohortRow {
    /// Monday of the week of the cohort's first activity
    pub cohort_week: NaiveDate,
    pub week_number: i64,
    pub user_count: i64,
}

/// A session's page views in timestamp order.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTrail {
    pub session_id: String,
    pub steps: Vec<TrailStep>,
}

/// One page view within a [`SessionTrail`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrailStep {
    pub page: String,
    pub timestamp: DateTime<Utc>,
}

/// A geolocated point with the number of sessions seen there.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRow {
    pub city: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub session_count: i64,
}

/// Convert a stored millisecond timestamp back into a `DateTime`.
fn ms_to_datetime(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single().ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Integer,
            format!("timestamp out of range: {}", ms).into(),
        )
    })
}

/// Database handle over a single SQLite connection
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL lets readers proceed while an import is writing
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        super::schema::run_migrations(&conn)
    }

    /// Lock the connection. A poisoned lock still guards a usable connection.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ============================================
    // Page view writes
    // ============================================

    /// Insert one page view, returning its row id
    pub fn insert_page_view(&self, view: &PageView) -> Result<i64> {
        let conn = self.conn();
        insert_row(&conn, view)?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a batch of page views in a single transaction
    pub fn insert_page_views(&self, views: &[PageView]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for view in views {
            insert_row(&tx, view)?;
        }
        tx.commit()?;
        tracing::debug!(count = views.len(), "Inserted page views");
        Ok(views.len())
    }

    /// Total number of stored page views
    pub fn count_page_views(&self) -> Result<i64> {
        let conn = self.conn();
        let count = conn.query_row("SELECT COUNT(*) FROM page_views", [], |r| r.get(0))?;
        Ok(count)
    }

    // ============================================
    // Session-level queries
    // ============================================

    /// First/last timestamps and page counts per session, ordered by session id.
    pub fn session_spans(&self, filter: &EventFilter) -> Result<Vec<SessionSpanRow>> {
        let conn = self.conn();
        let (from, to) = filter.bounds_ms();

        let mut stmt = conn.prepare(
            r#"
            SELECT
                session_id,
                MIN(ts_ms),
                MAX(ts_ms),
                COUNT(*),
                COUNT(DISTINCT page)
            FROM page_views
            WHERE ts_ms >= ?1 AND ts_ms <= ?2 AND (?3 IS NULL OR site = ?3)
            GROUP BY session_id
            ORDER BY session_id
            "#,
        )?;

        let rows = stmt
            .query_map(params![from, to, filter.site.as_deref()], |row| {
                Ok(SessionSpanRow {
                    session_id: row.get(0)?,
                    first_seen: ms_to_datetime(1, row.get(1)?)?,
                    last_seen: ms_to_datetime(2, row.get(2)?)?,
                    page_count: row.get(3)?,
                    unique_page_count: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    /// Page views per session in timestamp order, sessions ordered by id.
    pub fn session_trails(&self, filter: &EventFilter) -> Result<Vec<SessionTrail>> {
        let conn = self.conn();
        let (from, to) = filter.bounds_ms();

        let mut stmt = conn.prepare(
            r#"
            SELECT session_id, page, ts_ms
            FROM page_views
            WHERE ts_ms >= ?1 AND ts_ms <= ?2 AND (?3 IS NULL OR site = ?3)
            ORDER BY session_id, ts_ms, id
            "#,
        )?;

        let rows = stmt.query_map(params![from, to, filter.site.as_deref()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                TrailStep {
                    page: row.get(1)?,
                    timestamp: ms_to_datetime(2, row.get(2)?)?,
                },
            ))
        })?;

        let mut trails: Vec<SessionTrail> = Vec::new();
        for row in rows {
            let (session_id, step) = row?;
            match trails.last_mut() {
                Some(trail) if trail.session_id == session_id => trail.steps.push(step),
                _ => trails.push(SessionTrail {
                    session_id,
                    steps: vec![step],
                }),
            }
        }

        Ok(trails)
    }

    /// Every page view of one session, regardless of time range.
    pub fn session_trail(&self, session_id: &str) -> Result<Vec<TrailStep>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT page, ts_ms
            FROM page_views
            WHERE session_id = ?1
            ORDER BY ts_ms, id
            "#,
        )?;

        let steps = stmt
            .query_map([session_id], |row| {
                Ok(TrailStep {
                    page: row.get(0)?,
                    timestamp: ms_to_datetime(1, row.get(1)?)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(steps)
    }

    /// Number of distinct sessions in range
    pub fn count_sessions(&self, filter: &EventFilter) -> Result<i64> {
        let conn = self.conn();
        let (from, to) = filter.bounds_ms();
        let count = conn.query_row(
            r#"
            SELECT COUNT(DISTINCT session_id)
            FROM page_views
            WHERE ts_ms >= ?1 AND ts_ms <= ?2 AND (?3 IS NULL OR site = ?3)
            "#,
            params![from, to, filter.site.as_deref()],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    /// Returns `(total_sessions, single_event_sessions)` for the range.
    pub fn bounce_counts(&self, filter: &EventFilter) -> Result<(i64, i64)> {
        let conn = self.conn();
        let (from, to) = filter.bounds_ms();
        let counts = conn.query_row(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN views = 1 THEN 1 ELSE 0 END), 0)
            FROM (
                SELECT session_id, COUNT(*) AS views
                FROM page_views
                WHERE ts_ms >= ?1 AND ts_ms <= ?2 AND (?3 IS NULL OR site = ?3)
                GROUP BY session_id
            )
            "#,
            params![from, to, filter.site.as_deref()],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        Ok(counts)
    }

    // ============================================
    // Time-bucketed aggregates
    // ============================================

    /// Distinct sessions and events per interval bucket.
    ///
    /// `bucket = floor((ts - from) * intervals / (to - from))`, computed in
    /// 128-bit integer arithmetic so wide ranges with many intervals cannot
    /// overflow. An event exactly at `to` lands in bucket `intervals`;
    /// callers drop out-of-range buckets.
    pub fn interval_counts(
        &self,
        filter: &EventFilter,
        intervals: u32,
    ) -> Result<Vec<IntervalRow>> {
        let (from, to) = filter.bounds_ms();
        let span = i128::from(to) - i128::from(from);
        if span <= 0 {
            return Ok(Vec::new());
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT ts_ms, session_id, COUNT(*)
            FROM page_views
            WHERE ts_ms >= ?1 AND ts_ms <= ?2 AND (?3 IS NULL OR site = ?3)
            GROUP BY ts_ms, session_id
            "#,
        )?;

        let rows = stmt.query_map(params![from, to, filter.site.as_deref()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut buckets: BTreeMap<i64, (HashSet<String>, i64)> = BTreeMap::new();
        for row in rows {
            let (ts_ms, session_id, events) = row?;
            let offset = i128::from(ts_ms) - i128::from(from);
            // offset <= span, so the quotient is at most `intervals`
            let bucket = (offset * i128::from(intervals) / span) as i64;
            let entry = buckets.entry(bucket).or_default();
            entry.0.insert(session_id);
            entry.1 += events;
        }

        Ok(buckets
            .into_iter()
            .map(|(interval, (sessions, total_events))| IntervalRow {
                interval,
                unique_sessions: sessions.len() as i64,
                total_events,
            })
            .collect())
    }

    /// Distinct sessions per weekday across the range (0=Sunday, UTC).
    pub fn sessions_by_weekday(&self, filter: &EventFilter) -> Result<[i64; 7]> {
        let rows = self.grouped_session_counts(
            filter,
            "CAST(strftime('%w', ts_ms / 1000, 'unixepoch') AS INTEGER)",
        )?;

        let mut distribution = [0i64; 7];
        for (dow, count) in rows {
            if (0..7).contains(&dow) {
                distribution[dow as usize] = count;
            }
        }
        Ok(distribution)
    }

    /// Distinct sessions per hour of day across the range (UTC).
    pub fn sessions_by_hour(&self, filter: &EventFilter) -> Result<[i64; 24]> {
        let rows = self.grouped_session_counts(
            filter,
            "CAST(strftime('%H', ts_ms / 1000, 'unixepoch') AS INTEGER)",
        )?;

        let mut distribution = [0i64; 24];
        for (hour, count) in rows {
            if (0..24).contains(&hour) {
                distribution[hour as usize] = count;
            }
        }
        Ok(distribution)
    }

    fn grouped_session_counts(
        &self,
        filter: &EventFilter,
        key_expr: &str,
    ) -> Result<Vec<(i64, i64)>> {
        let conn = self.conn();
        let (from, to) = filter.bounds_ms();
        let sql = format!(
            r#"
            SELECT {} AS bucket, COUNT(DISTINCT session_id)
            FROM page_views
            WHERE ts_ms >= ?1 AND ts_ms <= ?2 AND (?3 IS NULL OR site = ?3)
            GROUP BY bucket
            "#,
            key_expr
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![from, to, filter.site.as_deref()], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ============================================
    // Cohorts
    // ============================================

    /// Distinct sessions per (cohort week, weeks since cohort start).
    ///
    /// Weeks start on Monday (UTC). A session's cohort is the week of its
    /// earliest page view inside the range.
    pub fn cohort_counts(&self, filter: &EventFilter) -> Result<Vec<CohortRow>> {
        let conn = self.conn();
        let (from, to) = filter.bounds_ms();

        let mut stmt = conn.prepare(
            r#"
            WITH activity AS (
                SELECT DISTINCT
                    session_id,
                    date(ts_ms / 1000, 'unixepoch', 'weekday 0', '-6 days') AS week
                FROM page_views
                WHERE ts_ms >= ?1 AND ts_ms <= ?2 AND (?3 IS NULL OR site = ?3)
            ),
            cohorts AS (
                SELECT session_id, MIN(week) AS cohort_week
                FROM activity
                GROUP BY session_id
            )
            SELECT
                c.cohort_week,
                CAST((julianday(a.week) - julianday(c.cohort_week)) / 7 AS INTEGER) AS week_number,
                COUNT(DISTINCT a.session_id)
            FROM activity a
            JOIN cohorts c ON c.session_id = a.session_id
            GROUP BY c.cohort_week, week_number
            ORDER BY c.cohort_week, week_number
            "#,
        )?;

        let rows = stmt
            .query_map(params![from, to, filter.site.as_deref()], |row| {
                let week: String = row.get(0)?;
                let cohort_week = NaiveDate::parse_from_str(&week, "%Y-%m-%d").map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(CohortRow {
                    cohort_week,
                    week_number: row.get(1)?,
                    user_count: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    // ============================================
    // Listings
    // ============================================

    /// Distinct sessions per page, most visited first
    pub fn sessions_by_page(&self, filter: &EventFilter) -> Result<Vec<(String, i64)>> {
        let conn = self.conn();
        let (from, to) = filter.bounds_ms();

        let mut stmt = conn.prepare(
            r#"
            SELECT page, COUNT(DISTINCT session_id) AS sessions
            FROM page_views
            WHERE ts_ms >= ?1 AND ts_ms <= ?2 AND (?3 IS NULL OR site = ?3)
            GROUP BY page
            ORDER BY sessions DESC, page
            "#,
        )?;

        let rows = stmt
            .query_map(params![from, to, filter.site.as_deref()], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Every site that has recorded a page view
    pub fn distinct_sites(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT DISTINCT site FROM page_views ORDER BY site")?;
        let sites = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sites)
    }

    /// Distinct pages viewed in range
    pub fn distinct_pages(&self, filter: &EventFilter) -> Result<Vec<String>> {
        let conn = self.conn();
        let (from, to) = filter.bounds_ms();
        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT page
            FROM page_views
            WHERE ts_ms >= ?1 AND ts_ms <= ?2 AND (?3 IS NULL OR site = ?3)
            ORDER BY page
            "#,
        )?;
        let pages = stmt
            .query_map(params![from, to, filter.site.as_deref()], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pages)
    }

    /// Geolocated points with distinct session counts; views without coordinates are skipped.
    pub fn locations(&self, filter: &EventFilter) -> Result<Vec<LocationRow>> {
        let conn = self.conn();
        let (from, to) = filter.bounds_ms();
        let mut stmt = conn.prepare(
            r#"
            SELECT city, latitude, longitude, COUNT(DISTINCT session_id) AS sessions
            FROM page_views
            WHERE ts_ms >= ?1 AND ts_ms <= ?2 AND (?3 IS NULL OR site = ?3)
              AND latitude IS NOT NULL AND longitude IS NOT NULL
            GROUP BY city, latitude, longitude
            ORDER BY sessions DESC, city
            "#,
        )?;
        let rows = stmt
            .query_map(params![from, to, filter.site.as_deref()], map_location)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn insert_row(conn: &Connection, view: &PageView) -> Result<()> {
    if view.session_id.is_empty() {
        return Err(Error::InvalidParameter(
            "page view has an empty session id".to_string(),
        ));
    }
    let geo = view.geo.clone().unwrap_or_default();
    conn.execute(
        r#"
        INSERT INTO page_views (
            session_id, ts_ms, page, site, ip,
            country_code, country_name, city, region, latitude, longitude
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        params![
            view.session_id,
            view.timestamp.timestamp_millis(),
            view.page,
            view.site,
            view.ip,
            geo.country_code,
            geo.country_name,
            geo.city,
            geo.region,
            geo.latitude,
            geo.longitude,
        ],
    )?;
    Ok(())
}

fn map_location(row: &Row) -> rusqlite::Result<LocationRow> {
    Ok(LocationRow {
        city: row.get(0)?,
        latitude: row.get(1)?,
        longitude: row.get(2)?,
        session_count: row.get(3)?,
    })
}
