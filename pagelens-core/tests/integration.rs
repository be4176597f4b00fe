//! Integration tests for pagelens ingestion and analytics
//!
//! These tests import `tests/fixtures/page_views.jsonl` into an on-disk
//! database and check the analytics end to end.
//!
//! Fixture layout (all UTC, site `shop.example` unless noted):
//! - week of Mon 2024-03-04: six sessions, one per archetype plus two bounces
//! - week of Mon 2024-03-11: `s-return` comes back, `s-blog` visits `blog.example`
//! - line 11 is malformed

use chrono::{DateTime, Duration, TimeZone, Utc};
use pagelens_core::analytics::{self, Archetype, JourneyAnchors};
use pagelens_core::config::AnalyticsConfig;
use pagelens_core::{import_jsonl, Database, EventFilter};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tempfile::TempDir;

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Open a fresh database under `dir` and import the fixture
fn seeded_db(dir: &TempDir) -> Database {
    pagelens_core::logging::init_test();
    let db = Database::open(&dir.path().join("events.db")).expect("open should succeed");
    db.migrate().expect("migrate should succeed");
    let file = File::open(fixture_path("page_views.jsonl")).unwrap();
    import_jsonl(&db, BufReader::new(file)).expect("import should succeed");
    db
}

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

/// Mon 2024-03-04 00:00:00 through Sun 2024-03-10 23:59:59
fn first_week() -> EventFilter {
    EventFilter::new(utc(2024, 3, 4, 0, 0, 0), utc(2024, 3, 10, 23, 59, 59)).unwrap()
}

// ============================================
// Ingestion
// ============================================

#[test]
fn test_import_fixture() {
    let dir = TempDir::new().unwrap();
    let db = Database::open(&dir.path().join("events.db")).unwrap();
    db.migrate().unwrap();

    let file = File::open(fixture_path("page_views.jsonl")).unwrap();
    let result = import_jsonl(&db, BufReader::new(file)).unwrap();

    assert_eq!(result.lines_read, 29);
    assert_eq!(result.events_inserted, 28);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].0, 11);
    assert_eq!(db.count_page_views().unwrap(), 28);
}

#[test]
fn test_reopen_keeps_events() {
    let dir = TempDir::new().unwrap();
    {
        let _db = seeded_db(&dir);
    }
    let db = Database::open(&dir.path().join("events.db")).unwrap();
    db.migrate().unwrap();
    assert_eq!(db.count_page_views().unwrap(), 28);
}

// ============================================
// Archetypes
// ============================================

#[test]
fn test_archetype_shares() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir);

    let shares = analytics::generate_archetypes(&db, &first_week()).unwrap();
    let summary: Vec<(Archetype, f64, usize)> = shares
        .iter()
        .map(|s| (s.archetype, s.percentage, s.sessions))
        .collect();

    assert_eq!(
        summary,
        vec![
            (Archetype::Targeted, 50.0, 3),
            (Archetype::Engaged, 16.7, 1),
            (Archetype::Frustrated, 16.7, 1),
            (Archetype::Default, 16.7, 1),
        ]
    );
    assert_eq!(shares[0].example_session_id, "s-bounce");
    assert_eq!(shares[1].example_session_id, "s-engaged");
    assert_eq!(shares[2].example_session_id, "s-frustrated");
    assert_eq!(shares[3].example_session_id, "s-general");
    assert_eq!(shares[0].characteristics.len(), 3);
}

#[test]
fn test_archetypes_empty_range() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir);
    let filter = EventFilter::new(utc(2023, 1, 1, 0, 0, 0), utc(2023, 1, 2, 0, 0, 0)).unwrap();
    assert!(analytics::generate_archetypes(&db, &filter)
        .unwrap()
        .is_empty());
}

// ============================================
// Time buckets
// ============================================

#[test]
fn test_interval_histogram_per_day() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir);

    let buckets = analytics::interval_histogram(&db, &first_week(), 7).unwrap();
    assert_eq!(buckets.len(), 7);
    assert_eq!(buckets[0].distinct_sessions, 2);
    assert_eq!(buckets[0].total_events, 3);
    assert_eq!(buckets[1].distinct_sessions, 1);
    assert_eq!(buckets[1].total_events, 12);
    assert_eq!(buckets[5].total_events, 0);
    assert_eq!(buckets[6].total_events, 0);
    assert_eq!(
        buckets.iter().map(|b| b.total_events).sum::<i64>(),
        3 + 12 + 6 + 1 + 4
    );
}

#[test]
fn test_traffic_by_day_of_week() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir);

    let days = analytics::traffic_by_day_of_week(&db, &first_week()).unwrap();
    let counts: Vec<(&str, f64)> = days.iter().map(|d| (d.day, d.count)).collect();
    assert_eq!(
        counts,
        vec![
            ("Monday", 2.0),
            ("Tuesday", 1.0),
            ("Wednesday", 1.0),
            ("Thursday", 1.0),
            ("Friday", 1.0),
            ("Saturday", 0.0),
            ("Sunday", 0.0),
        ]
    );
}

#[test]
fn test_traffic_by_hour_of_day() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir);

    let hours = analytics::traffic_by_hour_of_day(&db, &first_week()).unwrap();
    assert_eq!(hours.len(), 24);
    assert!((hours[9].count - 2.0 / 7.0).abs() < 1e-9);
    assert!((hours[14].count - 1.0 / 7.0).abs() < 1e-9);
    assert_eq!(hours[3].count, 0.0);
}

// ============================================
// Cohorts
// ============================================

#[test]
fn test_cohorts_with_site_filter() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir);
    let filter = EventFilter::new(utc(2024, 3, 4, 0, 0, 0), utc(2024, 3, 17, 23, 59, 59))
        .unwrap()
        .with_site(Some("shop.example"));

    let cohorts = analytics::cohort_analysis(&db, &filter, 2).unwrap();
    assert_eq!(cohorts.len(), 1);
    assert_eq!(cohorts[0].cohort_date, "2024-03-04");
    assert_eq!(cohorts[0].total_users, 6);
    assert_eq!(cohorts[0].retention_data[0], 100.0);
    assert!((cohorts[0].retention_data[1] - 100.0 / 6.0).abs() < 1e-9);
}

#[test]
fn test_cohorts_all_sites_newest_first() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir);
    let filter =
        EventFilter::new(utc(2024, 3, 4, 0, 0, 0), utc(2024, 3, 17, 23, 59, 59)).unwrap();

    let cohorts = analytics::cohort_analysis(&db, &filter, 2).unwrap();
    let dates: Vec<&str> = cohorts.iter().map(|c| c.cohort_date.as_str()).collect();
    assert_eq!(dates, vec!["2024-03-11", "2024-03-04"]);
    assert_eq!(cohorts[0].retention_data, vec![100.0, 0.0]);
}

// ============================================
// Engagement and traffic
// ============================================

#[test]
fn test_summary_first_week() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir);

    let summary =
        analytics::generate_summary(&db, &first_week(), &AnalyticsConfig::default()).unwrap();
    assert_eq!(summary.visitors, 6);
    assert_eq!(summary.bounce.bounced_sessions, 2);
    assert!((summary.bounce.bounce_rate - 100.0 / 3.0).abs() < 1e-9);
    // 0.5 + 11 + 5 + 0 + 3 + 0 minutes over six sessions
    assert!((summary.avg_dwell_minutes - 3.25).abs() < 1e-9);
}

#[test]
fn test_pages_sites_and_locations() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir);

    let pages = analytics::sessions_by_page(&db, &first_week()).unwrap();
    assert_eq!(pages[0].page, "/");
    assert_eq!(pages[0].sessions, 6);

    assert_eq!(
        analytics::traffic::sites(&db).unwrap(),
        vec!["blog.example", "shop.example"]
    );

    let locations = analytics::locations(&db, &first_week()).unwrap();
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].city.as_deref(), Some("Budapest"));
    assert_eq!(locations[0].sessions, 1);
}

#[test]
fn test_active_sessions() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir);

    let now = utc(2024, 3, 6, 20, 7, 0);
    let active = analytics::active_sessions(&db, now, Duration::minutes(5), None).unwrap();
    assert_eq!(active, 1);
}

// ============================================
// Journeys
// ============================================

#[test]
fn test_user_journey() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir);

    let steps = analytics::user_journey(&db, "s-frustrated").unwrap();
    let pages: Vec<&str> = steps.iter().map(|s| s.page.as_str()).collect();
    assert_eq!(pages, vec!["/", "/search", "/", "/search", "/", "/search"]);
}

#[test]
fn test_average_journey_anchored() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir);
    let anchors = JourneyAnchors {
        start_page: Some("/".to_string()),
        end_page: Some("/pricing".to_string()),
    };

    let graph = analytics::average_journey(&db, &first_week(), &anchors).unwrap();
    let names: Vec<&str> = graph.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["/", "/docs", "/pricing"]);

    let links: Vec<(usize, usize, i64)> = graph
        .links
        .iter()
        .map(|l| (l.source, l.target, l.value))
        .collect();
    assert_eq!(links, vec![(0, 1, 1), (0, 2, 1), (1, 2, 1)]);
}
