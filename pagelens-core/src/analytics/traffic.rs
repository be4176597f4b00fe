//! Visitor counts and listings

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::Database;
use crate::types::EventFilter;

/// Distinct sessions that viewed a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageTraffic {
    pub page: String,
    pub sessions: i64,
}

/// Sessions seen at one geolocated point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub city: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub sessions: i64,
}

/// Number of distinct sessions in range.
pub fn unique_visitors(db: &Database, filter: &EventFilter) -> crate::Result<i64> {
    db.count_sessions(filter)
}

/// Distinct sessions per page, most visited first.
pub fn sessions_by_page(db: &Database, filter: &EventFilter) -> crate::Result<Vec<PageTraffic>> {
    Ok(db
        .sessions_by_page(filter)?
        .into_iter()
        .map(|(page, sessions)| PageTraffic { page, sessions })
        .collect())
}

/// Sessions with a page view during the `window` ending at `now`.
pub fn active_sessions(
    db: &Database,
    now: DateTime<Utc>,
    window: Duration,
    site: Option<&str>,
) -> crate::Result<i64> {
    let filter = EventFilter::ending_at(now, window).with_site(site);
    db.count_sessions(&filter)
}

/// Where sessions in range came from.
pub fn locations(db: &Database, filter: &EventFilter) -> crate::Result<Vec<Location>> {
    Ok(db
        .locations(filter)?
        .into_iter()
        .map(|row| Location {
            city: row.city,
            latitude: row.latitude,
            longitude: row.longitude,
            sessions: row.session_count,
        })
        .collect())
}

/// All sites with recorded traffic.
pub fn sites(db: &Database) -> crate::Result<Vec<String>> {
    db.distinct_sites()
}

/// Pages viewed in range, sorted by name.
pub fn unique_pages(db: &Database, filter: &EventFilter) -> crate::Result<Vec<String>> {
    db.distinct_pages(filter)
}
