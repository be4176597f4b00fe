//! Per-session behavioral features
//!
//! Reduces the page views of each session into duration, depth and a
//! loop score, the inputs of [`super::archetypes`].

use serde::Serialize;

use crate::db::{Database, SessionSpanRow};
use crate::types::EventFilter;

/// Behavioral metrics for one session within the query range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionFeature {
    pub session_id: String,
    /// Last page view minus first page view, 0 for a single view
    pub duration_seconds: f64,
    /// Total page views
    pub page_count: i64,
    /// Distinct pages viewed
    pub unique_page_count: i64,
    /// `page_count / unique_page_count`; 0 when no pages were seen
    pub loop_score: f64,
}

impl SessionFeature {
    /// Build a feature record from raw counts.
    pub fn new(
        session_id: impl Into<String>,
        duration_seconds: f64,
        page_count: i64,
        unique_page_count: i64,
    ) -> Self {
        let loop_score = if unique_page_count > 0 {
            page_count as f64 / unique_page_count as f64
        } else {
            0.0
        };
        Self {
            session_id: session_id.into(),
            duration_seconds: duration_seconds.max(0.0),
            page_count,
            unique_page_count,
            loop_score,
        }
    }
}

impl From<SessionSpanRow> for SessionFeature {
    fn from(row: SessionSpanRow) -> Self {
        let duration = (row.last_seen - row.first_seen).num_milliseconds() as f64 / 1000.0;
        Self::new(row.session_id, duration, row.page_count, row.unique_page_count)
    }
}

/// Extract one feature record per session active in the range.
///
/// Output is ordered by session id so downstream exemplar selection is
/// deterministic.
pub fn extract_session_features(
    db: &Database,
    filter: &EventFilter,
) -> crate::Result<Vec<SessionFeature>> {
    let rows = db.session_spans(filter)?;
    tracing::debug!(sessions = rows.len(), site = ?filter.site, "Extracted session features");
    Ok(rows.into_iter().map(SessionFeature::from).collect())
}
