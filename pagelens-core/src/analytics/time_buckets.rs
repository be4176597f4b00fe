//! Time-bucketed traffic aggregates
//!
//! Three independent views over the same range:
//! - a fixed-count interval histogram
//! - average distinct sessions per weekday, normalized by how many times
//!   each weekday occurs in the range
//! - average distinct sessions per hour of day, normalized by the number of
//!   days the range spans
//!
//! Weekdays and hours are taken in UTC.

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use serde::Serialize;

use crate::db::{Database, IntervalRow};
use crate::error::Error;
use crate::types::EventFilter;

/// Output order for weekday reports.
pub const WEEKDAYS_FROM_MONDAY: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// One bucket of the interval histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntervalBucket {
    pub interval_index: u32,
    /// Start of the bucket
    pub starts_at: DateTime<Utc>,
    pub distinct_sessions: i64,
    pub total_events: i64,
}

/// Average distinct sessions seen on one weekday.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficByDay {
    pub day: &'static str,
    pub count: f64,
}

/// Average distinct sessions seen during one hour of the day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficByHour {
    pub hour: u32,
    pub count: f64,
}

fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

// ============================================
// Interval histogram
// ============================================

/// Spread grouped interval rows over exactly `intervals` zero-filled buckets.
///
/// Rows whose index falls outside `[0, intervals)` are dropped; this is where
/// events exactly at the range end go.
pub fn fill_intervals(
    filter: &EventFilter,
    intervals: u32,
    rows: &[IntervalRow],
) -> Vec<IntervalBucket> {
    let (from, to) = filter.bounds_ms();
    let span = i128::from(to) - i128::from(from);

    let mut buckets: Vec<IntervalBucket> = (0..intervals)
        .map(|i| IntervalBucket {
            interval_index: i,
            // Wide ranges times many intervals exceed i64; the quotient never does
            starts_at: filter.from
                + Duration::milliseconds((span * i128::from(i) / i128::from(intervals)) as i64),
            distinct_sessions: 0,
            total_events: 0,
        })
        .collect();

    for row in rows {
        if row.interval >= 0 && row.interval < intervals as i64 {
            let bucket = &mut buckets[row.interval as usize];
            bucket.distinct_sessions = row.unique_sessions;
            bucket.total_events = row.total_events;
        }
    }

    buckets
}

/// Split the range into `intervals` equal buckets and count activity in each.
pub fn interval_histogram(
    db: &Database,
    filter: &EventFilter,
    intervals: u32,
) -> crate::Result<Vec<IntervalBucket>> {
    if intervals == 0 {
        return Err(Error::InvalidParameter(
            "intervals must be greater than 0".to_string(),
        ));
    }

    let rows = db.interval_counts(filter, intervals)?;
    tracing::debug!(intervals, groups = rows.len(), "Built interval histogram");
    Ok(fill_intervals(filter, intervals, &rows))
}

// ============================================
// Day of week
// ============================================

/// Number of calendar dates in `[from, to]` (date-truncated, inclusive)
/// falling on each weekday, indexed 0=Sunday.
pub fn weekday_occurrences(from: DateTime<Utc>, to: DateTime<Utc>) -> [i64; 7] {
    let mut counts = [0i64; 7];
    let first = from.date_naive();
    let last = to.date_naive();
    if last < first {
        return counts;
    }

    let days = (last - first).num_days() + 1;
    let start = first.weekday().num_days_from_sunday() as i64;
    for (dow, count) in counts.iter_mut().enumerate() {
        *count = days / 7;
        let offset = (dow as i64 - start).rem_euclid(7);
        if offset < days % 7 {
            *count += 1;
        }
    }
    counts
}

/// Normalize raw per-weekday session counts (0=Sunday) into averages,
/// reported Monday through Sunday.
pub fn average_by_weekday(raw: &[i64; 7], occurrences: &[i64; 7]) -> Vec<TrafficByDay> {
    WEEKDAYS_FROM_MONDAY
        .iter()
        .map(|&day| {
            let idx = day.num_days_from_sunday() as usize;
            let count = if occurrences[idx] > 0 {
                raw[idx] as f64 / occurrences[idx] as f64
            } else {
                0.0
            };
            TrafficByDay {
                day: day_name(day),
                count,
            }
        })
        .collect()
}

/// Average distinct sessions per weekday over the range.
pub fn traffic_by_day_of_week(
    db: &Database,
    filter: &EventFilter,
) -> crate::Result<Vec<TrafficByDay>> {
    let raw = db.sessions_by_weekday(filter)?;
    let occurrences = weekday_occurrences(filter.from, filter.to);
    Ok(average_by_weekday(&raw, &occurrences))
}

// ============================================
// Hour of day
// ============================================

/// Days spanned by the range, rounded up, at least 1.
pub fn days_spanned(filter: &EventFilter) -> f64 {
    let hours = filter.span().num_milliseconds() as f64 / 3_600_000.0;
    (hours / 24.0).ceil().max(1.0)
}

/// Normalize raw per-hour session counts into averages over `days`.
pub fn average_by_hour(raw: &[i64; 24], days: f64) -> Vec<TrafficByHour> {
    raw.iter()
        .enumerate()
        .map(|(hour, &count)| TrafficByHour {
            hour: hour as u32,
            count: count as f64 / days,
        })
        .collect()
}

/// Average distinct sessions per hour of day over the range.
pub fn traffic_by_hour_of_day(
    db: &Database,
    filter: &EventFilter,
) -> crate::Result<Vec<TrafficByHour>> {
    let raw = db.sessions_by_hour(filter)?;
    Ok(average_by_hour(&raw, days_spanned(filter)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PageView;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    #[test]
    fn test_weekday_occurrences_ten_days() {
        // Mon 2024-01-01 .. Wed 2024-01-10
        let counts = weekday_occurrences(at(1, 0), at(10, 23));
        assert_eq!(counts[1], 2); // Monday
        assert_eq!(counts[2], 2); // Tuesday
        assert_eq!(counts[3], 2); // Wednesday
        assert_eq!(counts[0], 1); // Sunday
        assert_eq!(counts.iter().sum::<i64>(), 10);
    }

    #[test]
    fn test_weekday_occurrences_sum_matches_days() {
        for (from_day, to_day) in [(1, 1), (3, 9), (5, 31), (31, 31)] {
            let counts = weekday_occurrences(at(from_day, 12), at(to_day, 0));
            assert_eq!(counts.iter().sum::<i64>(), (to_day - from_day + 1) as i64);
        }
    }

    #[test]
    fn test_average_by_weekday_order_and_zero_guard() {
        let raw = [3, 4, 0, 0, 0, 0, 0];
        let occurrences = [1, 2, 0, 1, 1, 1, 1];
        let days = average_by_weekday(&raw, &occurrences);

        assert_eq!(days.len(), 7);
        assert_eq!(days[0].day, "Monday");
        assert_eq!(days[0].count, 2.0);
        assert_eq!(days[1].count, 0.0); // Tuesday never occurs
        assert_eq!(days[6].day, "Sunday");
        assert_eq!(days[6].count, 3.0);
    }

    #[test]
    fn test_days_spanned() {
        let exact = EventFilter::new(at(1, 0), at(3, 0)).unwrap();
        assert_eq!(days_spanned(&exact), 2.0);

        let partial = EventFilter::new(at(1, 0), at(3, 1)).unwrap();
        assert_eq!(days_spanned(&partial), 3.0);

        let instant = EventFilter::new(at(1, 0), at(1, 0)).unwrap();
        assert_eq!(days_spanned(&instant), 1.0);
    }

    #[test]
    fn test_traffic_by_hour_returns_all_hours() {
        let db = setup();
        db.insert_page_views(&[
            PageView::new("a", at(1, 8), "/", "s", "ip"),
            PageView::new("b", at(2, 8), "/", "s", "ip"),
        ])
        .unwrap();

        let filter = EventFilter::new(at(1, 0), at(3, 0)).unwrap();
        let hours = traffic_by_hour_of_day(&db, &filter).unwrap();
        assert_eq!(hours.len(), 24);
        assert_eq!(hours[8].count, 1.0);
        assert_eq!(hours[9].count, 0.0);
    }

    #[test]
    fn test_traffic_by_day_normalizes() {
        let db = setup();
        // Two Mondays in range, three sessions on them in total
        db.insert_page_views(&[
            PageView::new("a", at(1, 8), "/", "s", "ip"),
            PageView::new("b", at(1, 9), "/", "s", "ip"),
            PageView::new("c", at(8, 9), "/", "s", "ip"),
            PageView::new("d", at(2, 9), "/", "s", "ip"),
        ])
        .unwrap();

        let filter = EventFilter::new(at(1, 0), at(10, 0)).unwrap();
        let days = traffic_by_day_of_week(&db, &filter).unwrap();
        assert_eq!(days[0].count, 1.5);
        assert_eq!(days[1].count, 0.5);
        assert_eq!(days[4].count, 0.0);
    }

    #[test]
    fn test_interval_histogram_zero_filled_and_boundary() {
        let db = setup();
        let filter = EventFilter::new(at(1, 0), at(1, 10)).unwrap();
        db.insert_page_views(&[
            PageView::new("a", at(1, 0), "/", "s", "ip"),
            PageView::new("a", at(1, 3), "/x", "s", "ip"),
            PageView::new("b", at(1, 3), "/", "s", "ip"),
            PageView::new("c", at(1, 10), "/", "s", "ip"),
        ])
        .unwrap();

        let buckets = interval_histogram(&db, &filter, 5).unwrap();
        assert_eq!(buckets.len(), 5);
        assert_eq!(buckets[0].total_events, 1);
        assert_eq!(buckets[1].distinct_sessions, 2);
        assert_eq!(buckets[1].starts_at, at(1, 2));
        assert_eq!(buckets[4].total_events, 0);

        // The view exactly at the range end is dropped
        let total: i64 = buckets.iter().map(|b| b.total_events).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_interval_histogram_rejects_zero() {
        let db = setup();
        let filter = EventFilter::new(at(1, 0), at(2, 0)).unwrap();
        assert!(matches!(
            interval_histogram(&db, &filter, 0),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_interval_histogram_empty_range() {
        let db = setup();
        let filter = EventFilter::new(at(1, 0), at(1, 0)).unwrap();
        let buckets = interval_histogram(&db, &filter, 3).unwrap();
        assert_eq!(buckets.len(), 3);
        assert!(buckets.iter().all(|b| b.total_events == 0));
    }

    #[test]
    fn test_interval_histogram_wide_range() {
        let db = setup();
        let from = Utc.with_ymd_and_hms(-200_000, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(200_000, 1, 1, 0, 0, 0).unwrap();
        db.insert_page_views(&[PageView::new(
            "late",
            to - Duration::milliseconds(1),
            "/",
            "s",
            "ip",
        )])
        .unwrap();

        let filter = EventFilter::new(from, to).unwrap();
        let buckets = interval_histogram(&db, &filter, 1000).unwrap();
        assert_eq!(buckets.len(), 1000);
        assert_eq!(buckets[0].starts_at, from);
        assert!(buckets.windows(2).all(|w| w[0].starts_at < w[1].starts_at));
        assert!(buckets[999].starts_at < to);
        assert_eq!(buckets[999].total_events, 1);
        assert_eq!(buckets.iter().map(|b| b.total_events).sum::<i64>(), 1);
    }
}
