//! Plain-text rendering for report output

use anyhow::Result;
use pagelens_core::analytics::{
    AnalyticsSummary, ArchetypeShare, BounceStats, CohortData, IntervalBucket, JourneyGraph,
    JourneyStep, Location,
};
use pagelens_core::ImportResult;

use crate::Format;

const BAR_WIDTH: usize = 40;

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 {
        return String::new();
    }
    let len = ((value / max) * BAR_WIDTH as f64).round() as usize;
    "#".repeat(len.min(BAR_WIDTH))
}

pub fn import(result: &ImportResult, format: Format) -> Result<()> {
    if format == Format::Json {
        let errors: Vec<serde_json::Value> = result
            .errors
            .iter()
            .map(|(line, message)| serde_json::json!({ "line": line, "message": message }))
            .collect();
        let json = serde_json::json!({
            "lines_read": result.lines_read,
            "events_inserted": result.events_inserted,
            "errors": errors,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("Import complete:");
    println!("  Lines read:      {}", result.lines_read);
    println!("  Events inserted: {}", result.events_inserted);
    if result.has_errors() {
        println!("  Skipped lines:   {}", result.errors.len());
        for (line, message) in &result.errors {
            println!("    line {}: {}", line, message);
        }
    }
    Ok(())
}

pub fn archetypes(shares: &[ArchetypeShare]) {
    if shares.is_empty() {
        println!("No sessions in range.");
        return;
    }

    for share in shares {
        println!(
            "{:<24} {:>5.1}%  ({} sessions, e.g. {})",
            share.name, share.percentage, share.sessions, share.example_session_id
        );
        for trait_ in share.characteristics {
            println!("   {:<16} {}", trait_.name, trait_.value);
        }
        println!();
    }
}

pub fn histogram(buckets: &[IntervalBucket]) {
    let max = buckets
        .iter()
        .map(|b| b.distinct_sessions)
        .max()
        .unwrap_or(0) as f64;
    for bucket in buckets {
        println!(
            "{}  {:>6} sessions {:>7} events  {}",
            bucket.starts_at.format("%Y-%m-%d %H:%M"),
            bucket.distinct_sessions,
            bucket.total_events,
            bar(bucket.distinct_sessions as f64, max)
        );
    }
}

/// Labelled averages with a bar per row.
pub fn series(rows: impl Iterator<Item = (String, f64)>) {
    let rows: Vec<(String, f64)> = rows.collect();
    let max = rows.iter().map(|(_, v)| *v).fold(0.0, f64::max);
    for (label, value) in &rows {
        println!("{:<10} {:>8.2}  {}", label, value, bar(*value, max));
    }
}

pub fn cohorts(cohorts: &[CohortData]) {
    if cohorts.is_empty() {
        println!("No cohorts in range.");
        return;
    }

    let weeks = cohorts[0].retention_data.len();
    let header: String = (0..weeks).map(|w| format!("{:>7}", format!("W{}", w))).collect();
    println!("{:<12} {:>6} {}", "Cohort", "Users", header);
    for cohort in cohorts {
        let cells: String = cohort
            .retention_data
            .iter()
            .map(|r| format!("{:>6.1}%", r))
            .collect();
        println!(
            "{:<12} {:>6} {}",
            cohort.cohort_date, cohort.total_users, cells
        );
    }
}

pub fn bounce(stats: &BounceStats) {
    println!(
        "Bounce rate: {:.1}% ({} of {} sessions)",
        stats.bounce_rate, stats.bounced_sessions, stats.total_sessions
    );
}

pub fn summary(summary: &AnalyticsSummary) {
    println!("Visitors:      {}", summary.visitors);
    println!("Bounce rate:   {:.1}%", summary.bounce.bounce_rate);
    println!("Avg dwell:     {:.2} min", summary.avg_dwell_minutes);
}

pub fn counts<'a>(rows: impl Iterator<Item = (&'a str, i64)>) {
    for (label, count) in rows {
        println!("{:>8}  {}", count, label);
    }
}

pub fn lines(items: &[String]) {
    for item in items {
        println!("{}", item);
    }
}

pub fn locations(locations: &[Location]) {
    for loc in locations {
        println!(
            "{:>6}  {} ({:.4}, {:.4})",
            loc.sessions,
            loc.city.as_deref().unwrap_or("(unknown)"),
            loc.latitude,
            loc.longitude
        );
    }
}

pub fn journey(steps: &[JourneyStep]) {
    for (i, step) in steps.iter().enumerate() {
        println!(
            "{:>3}. {}  {}",
            i + 1,
            step.timestamp.format("%Y-%m-%d %H:%M:%S"),
            step.page
        );
    }
}

pub fn graph(graph: &JourneyGraph) {
    if graph.links.is_empty() {
        println!("No transitions in range.");
        return;
    }

    for link in &graph.links {
        println!(
            "{:>6}  {} -> {}",
            link.value, graph.nodes[link.source].name, graph.nodes[link.target].name
        );
    }
}
