//! Dwell time and bounce rate

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::Database;
use crate::types::EventFilter;

/// Bounce statistics for a range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BounceStats {
    pub total_sessions: i64,
    /// Sessions with exactly one page view
    pub bounced_sessions: i64,
    /// `bounced / total * 100`, 0 when there are no sessions
    pub bounce_rate: f64,
}

impl BounceStats {
    pub fn new(total_sessions: i64, bounced_sessions: i64) -> Self {
        let bounce_rate = if total_sessions > 0 {
            bounced_sessions as f64 / total_sessions as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total_sessions,
            bounced_sessions,
            bounce_rate,
        }
    }
}

/// Share of sessions in range that viewed exactly one page.
pub fn bounce_rate(db: &Database, filter: &EventFilter) -> crate::Result<BounceStats> {
    let (total, bounced) = db.bounce_counts(filter)?;
    Ok(BounceStats::new(total, bounced))
}

/// Dwell time of one session in minutes.
///
/// Sums the gaps between consecutive page views; a gap longer than
/// `threshold` is idle time and contributes nothing. Timestamps must be in
/// ascending order.
pub fn session_dwell_minutes(timestamps: &[DateTime<Utc>], threshold: Duration) -> f64 {
    timestamps
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .filter(|gap| *gap <= threshold)
        .map(|gap| gap.num_milliseconds() as f64 / 60_000.0)
        .sum()
}

/// Average dwell time in minutes across sessions in range, 0 with no sessions.
pub fn average_dwell_minutes(
    db: &Database,
    filter: &EventFilter,
    threshold: Duration,
) -> crate::Result<f64> {
    let trails = db.session_trails(filter)?;
    if trails.is_empty() {
        return Ok(0.0);
    }

    let total: f64 = trails
        .iter()
        .map(|trail| {
            let timestamps: Vec<DateTime<Utc>> =
                trail.steps.iter().map(|step| step.timestamp).collect();
            session_dwell_minutes(&timestamps, threshold)
        })
        .sum();

    Ok(total / trails.len() as f64)
}
