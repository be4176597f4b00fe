//! Core domain types for pagelens
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Page view** | One immutable event: a session loaded a page of a site at an instant |
//! | **Session** | All page views sharing a session id, bounded by the query range |
//! | **Site** | The property a page belongs to; most queries can be narrowed to one site |
//! | **Query range** | An inclusive `[from, to]` window, optionally restricted to one site |
//!
//! Sessions are never delimited by an inactivity timeout here: whatever shares a
//! session id inside the query range is one session.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Page views
// ============================================

/// Geolocation resolved for the visitor's IP at ingestion time.
///
/// Every field is optional so a partial lookup still stores what it found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    /// ISO 3166-1 alpha-2 (e.g., "US", "HU")
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub city: Option<String>,
    /// Region or state
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A single page view. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageView {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub page: String,
    pub site: String,
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoInfo>,
}

impl PageView {
    /// Create a page view without geolocation.
    pub fn new(
        session_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        page: impl Into<String>,
        site: impl Into<String>,
        ip: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp,
            page: page.into(),
            site: site.into(),
            ip: ip.into(),
            geo: None,
        }
    }

    /// Attach geolocation data.
    pub fn with_geo(mut self, geo: GeoInfo) -> Self {
        self.geo = Some(geo);
        self
    }
}

/// Issue a fresh session id for a visitor that arrived without one.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================
// Query range
// ============================================

/// Time range plus optional site restriction shared by every analytics query.
///
/// Both ends are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Restrict to this site; `None` means all sites
    pub site: Option<String>,
}

impl EventFilter {
    /// Create a filter over `[from, to]` across all sites.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self> {
        if from > to {
            return Err(Error::InvalidParameter(format!(
                "range start {} is after range end {}",
                from.to_rfc3339(),
                to.to_rfc3339()
            )));
        }
        Ok(Self {
            from,
            to,
            site: None,
        })
    }

    /// The `span` ending at `now`.
    pub fn ending_at(now: DateTime<Utc>, span: Duration) -> Self {
        Self {
            from: now - span,
            to: now,
            site: None,
        }
    }

    /// Build a filter from optional calendar dates (`YYYY-MM-DD`, midnight UTC).
    ///
    /// A missing `to` means `now`; a missing `from` means `to - default_span`.
    pub fn from_dates(
        from: Option<&str>,
        to: Option<&str>,
        now: DateTime<Utc>,
        default_span: Duration,
    ) -> Result<Self> {
        let to = match to {
            Some(s) => parse_date(s)?,
            None => now,
        };
        let from = match from {
            Some(s) => parse_date(s)?,
            None => to - default_span,
        };
        Self::new(from, to)
    }

    /// Restrict the filter to one site. An empty name means all sites.
    pub fn with_site(mut self, site: Option<&str>) -> Self {
        self.site = site.filter(|s| !s.is_empty()).map(str::to_string);
        self
    }

    /// Range bounds as Unix milliseconds, the store's timestamp encoding.
    pub fn bounds_ms(&self) -> (i64, i64) {
        (self.from.timestamp_millis(), self.to.timestamp_millis())
    }

    /// Length of the range.
    pub fn span(&self) -> Duration {
        self.to - self.from
    }
}

/// Parse a calendar date into midnight UTC.
pub fn parse_date(value: &str) -> Result<DateTime<Utc>> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| {
            Error::InvalidParameter(format!("invalid date '{}', expected YYYY-MM-DD", value))
        })
}
