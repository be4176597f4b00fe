//! Weekly cohort retention
//!
//! Sessions are grouped by the Monday-start week of their first page view in
//! the range. Each cohort then reports, for every following week, what share
//! of its sessions were active again.
//!
//! A week that has not happened yet relative to the range end and a week in
//! which nobody returned both report 0; the matrix does not distinguish them.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::{CohortRow, Database};
use crate::error::Error;
use crate::types::EventFilter;

/// Retention row for one cohort.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortData {
    /// Monday of the cohort week, `YYYY-MM-DD`
    pub cohort_date: String,
    /// Distinct sessions in the cohort
    pub total_users: i64,
    /// `retention_data[w]`: percentage of the cohort active `w` weeks later
    pub retention_data: Vec<f64>,
}

/// Default cohort window: `weeks * 7` days ending at `now`.
pub fn cohort_window(now: DateTime<Utc>, weeks: u32) -> EventFilter {
    EventFilter::ending_at(now, Duration::weeks(weeks as i64))
}

/// Assemble the retention matrix from grouped cohort counts.
///
/// Cohorts are ordered newest first. A cohort without week-0 activity is
/// dropped.
pub fn build_cohorts(rows: &[CohortRow], weeks: u32) -> Vec<CohortData> {
    let mut by_cohort: BTreeMap<NaiveDate, BTreeMap<i64, i64>> = BTreeMap::new();
    for row in rows {
        by_cohort
            .entry(row.cohort_week)
            .or_default()
            .insert(row.week_number, row.user_count);
    }

    by_cohort
        .into_iter()
        .rev()
        .filter_map(|(cohort_week, counts)| {
            let total_users = counts.get(&0).copied().unwrap_or(0);
            if total_users == 0 {
                return None;
            }

            let retention_data = (0..weeks as i64)
                .map(|week| {
                    let active = counts.get(&week).copied().unwrap_or(0);
                    active as f64 / total_users as f64 * 100.0
                })
                .collect();

            Some(CohortData {
                cohort_date: cohort_week.format("%Y-%m-%d").to_string(),
                total_users,
                retention_data,
            })
        })
        .collect()
}

/// Weekly retention matrix for sessions active in the range.
pub fn cohort_analysis(
    db: &Database,
    filter: &EventFilter,
    weeks: u32,
) -> crate::Result<Vec<CohortData>> {
    if weeks == 0 {
        return Err(Error::InvalidParameter(
            "number of weeks must be greater than 0".to_string(),
        ));
    }

    let rows = db.cohort_counts(filter)?;
    let cohorts = build_cohorts(&rows, weeks);
    tracing::debug!(weeks, cohorts = cohorts.len(), "Built cohort matrix");
    Ok(cohorts)
}
