//! Analytics module for pagelens
//!
//! Turns the page-view log into behavioral analytics:
//! - Per-session features and archetype classification
//! - Interval, weekday and hour-of-day traffic curves
//! - Weekly cohort retention
//! - Dwell time and bounce rate
//! - Visitor counts, listings and navigation paths
//!
//! Every entry point takes a [`Database`] and an [`EventFilter`] and computes
//! its result from scratch. Nothing is cached between calls, so calls for
//! different ranges can run concurrently against the same database.

pub mod archetypes;
pub mod cohort;
pub mod engagement;
pub mod features;
pub mod journey;
pub mod time_buckets;
pub mod traffic;

use chrono::Duration;
use serde::Serialize;

use crate::config::AnalyticsConfig;
use crate::db::Database;
use crate::types::EventFilter;

pub use archetypes::{classify, generate_archetypes, Archetype, ArchetypeShare, Characteristic};
pub use cohort::{cohort_analysis, cohort_window, CohortData};
pub use engagement::{average_dwell_minutes, bounce_rate, BounceStats};
pub use features::{extract_session_features, SessionFeature};
pub use journey::{average_journey, user_journey, JourneyAnchors, JourneyGraph, JourneyStep};
pub use time_buckets::{
    interval_histogram, traffic_by_day_of_week, traffic_by_hour_of_day, IntervalBucket,
    TrafficByDay, TrafficByHour,
};
pub use traffic::{active_sessions, locations, sessions_by_page, Location, PageTraffic};

/// Headline numbers for a range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    /// Distinct sessions
    pub visitors: i64,
    pub bounce: BounceStats,
    /// Average dwell time per session in minutes
    pub avg_dwell_minutes: f64,
}

/// Visitors, bounce rate and dwell time in one call.
pub fn generate_summary(
    db: &Database,
    filter: &EventFilter,
    config: &AnalyticsConfig,
) -> crate::Result<AnalyticsSummary> {
    let bounce = bounce_rate(db, filter)?;
    let threshold = Duration::minutes(config.dwell_threshold_minutes as i64);
    let avg_dwell_minutes = average_dwell_minutes(db, filter, threshold)?;

    Ok(AnalyticsSummary {
        visitors: bounce.total_sessions,
        bounce,
        avg_dwell_minutes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PageView;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    #[test]
    fn test_summary() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let t = Utc.with_ymd_and_hms(2024, 4, 1, 10, 0, 0).unwrap();
        db.insert_page_views(&[
            PageView::new("a", t, "/", "s", "ip"),
            PageView::new("a", t + Duration::minutes(3), "/x", "s", "ip"),
            PageView::new("b", t, "/", "s", "ip"),
        ])
        .unwrap();

        let filter = EventFilter::new(t, t + Duration::hours(1)).unwrap();
        let summary = generate_summary(&db, &filter, &AnalyticsConfig::default()).unwrap();
        assert_eq!(summary.visitors, 2);
        assert_eq!(summary.bounce.bounce_rate, 50.0);
        assert_eq!(summary.avg_dwell_minutes, 1.5);
    }

    #[test]
    fn test_concurrent_queries() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.migrate().unwrap();
        let t = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let views: Vec<PageView> = (0..48)
            .map(|i| PageView::new(format!("s{}", i % 6), t + Duration::hours(i), "/", "s", "ip"))
            .collect();
        db.insert_page_views(&views).unwrap();

        let handles: Vec<_> = (1..=4)
            .map(|days| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || {
                    let filter = EventFilter::new(t, t + Duration::days(days)).unwrap();
                    let shares = generate_archetypes(&db, &filter).unwrap();
                    let hours = traffic_by_hour_of_day(&db, &filter).unwrap();
                    (shares.iter().map(|s| s.sessions).sum::<usize>(), hours.len())
                })
            })
            .collect();

        for handle in handles {
            let (sessions, hours) = handle.join().unwrap();
            assert_eq!(sessions, 6);
            assert_eq!(hours, 24);
        }
    }
}
