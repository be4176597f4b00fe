//! Visitor archetype classification
//!
//! Assigns each session one behavioral archetype through an ordered rule
//! cascade, then reports how the sessions in a range split across archetypes.
//!
//! Rule order matters: frustration signals are checked first, so a session
//! that also looks engaged is still reported as frustrated.

use serde::Serialize;
use std::collections::HashMap;

use super::features::{extract_session_features, SessionFeature};
use crate::db::Database;
use crate::types::EventFilter;

/// Visitor archetypes. Declaration order is the tie-break order for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    /// Short, shallow visit - came for one thing and left
    Targeted,
    /// Long or broad visit without much repetition
    Engaged,
    /// Keeps circling back over the same pages
    Frustrated,
    /// Everything else
    Default,
}

/// A descriptive trait shown alongside an archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Characteristic {
    pub name: &'static str,
    pub value: &'static str,
}

const fn trait_pair(name: &'static str, value: &'static str) -> Characteristic {
    Characteristic { name, value }
}

const TARGETED_TRAITS: &[Characteristic] = &[
    trait_pair("Session length", "Short (< 1 minute)"),
    trait_pair("Behavior", "Views few (1-3) pages"),
    trait_pair("Likely goal", "Quick information lookup"),
];

const ENGAGED_TRAITS: &[Characteristic] = &[
    trait_pair("Session length", "Long (> 10 minutes)"),
    trait_pair("Behavior", "Views many pages, moves linearly"),
    trait_pair("Likely goal", "In-depth research, browsing"),
];

const FRUSTRATED_TRAITS: &[Characteristic] = &[
    trait_pair("Session length", "Varies"),
    trait_pair("Behavior", "Steps back often, goes in circles"),
    trait_pair("Likely goal", "Cannot find what they are looking for"),
];

const DEFAULT_TRAITS: &[Characteristic] = &[
    trait_pair("Session length", "Average"),
    trait_pair("Behavior", "General browsing patterns"),
    trait_pair("Likely goal", "Mixed"),
];

impl Archetype {
    /// All archetypes in tie-break order.
    pub const ALL: [Archetype; 4] = [
        Archetype::Targeted,
        Archetype::Engaged,
        Archetype::Frustrated,
        Archetype::Default,
    ];

    /// Get the display name for this archetype.
    pub fn name(&self) -> &'static str {
        match self {
            Archetype::Targeted => "Targeted Visitor",
            Archetype::Engaged => "Engaged Browser",
            Archetype::Frustrated => "Frustrated or Aimless",
            Archetype::Default => "General Visitor",
        }
    }

    /// Static descriptive traits, independent of any data.
    pub fn characteristics(&self) -> &'static [Characteristic] {
        match self {
            Archetype::Targeted => TARGETED_TRAITS,
            Archetype::Engaged => ENGAGED_TRAITS,
            Archetype::Frustrated => FRUSTRATED_TRAITS,
            Archetype::Default => DEFAULT_TRAITS,
        }
    }
}

/// One step of the classification cascade.
struct Rule {
    archetype: Archetype,
    matches: fn(&SessionFeature) -> bool,
}

fn heavy_looping(f: &SessionFeature) -> bool {
    f.loop_score >= 2.5 && f.page_count > 5
}

fn long_repetitive(f: &SessionFeature) -> bool {
    f.duration_seconds > 120.0 && f.page_count > 10 && f.loop_score >= 1.8
}

fn quick_and_shallow(f: &SessionFeature) -> bool {
    f.duration_seconds <= 60.0 && f.page_count <= 3
}

fn long_and_linear(f: &SessionFeature) -> bool {
    f.duration_seconds > 600.0 && f.loop_score < 1.5
}

fn broad_and_linear(f: &SessionFeature) -> bool {
    f.unique_page_count > 7 && f.loop_score < 1.8
}

/// Evaluated top to bottom; the first match wins.
const RULES: &[Rule] = &[
    Rule {
        archetype: Archetype::Frustrated,
        matches: heavy_looping,
    },
    Rule {
        archetype: Archetype::Frustrated,
        matches: long_repetitive,
    },
    Rule {
        archetype: Archetype::Targeted,
        matches: quick_and_shallow,
    },
    Rule {
        archetype: Archetype::Engaged,
        matches: long_and_linear,
    },
    Rule {
        archetype: Archetype::Engaged,
        matches: broad_and_linear,
    },
];

/// Classify one session.
pub fn classify(feature: &SessionFeature) -> Archetype {
    RULES
        .iter()
        .find(|rule| (rule.matches)(feature))
        .map(|rule| rule.archetype)
        .unwrap_or(Archetype::Default)
}

/// Share of sessions classified into one archetype.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchetypeShare {
    pub archetype: Archetype,
    pub name: &'static str,
    /// Percentage of sessions, rounded to one decimal
    pub percentage: f64,
    /// Number of sessions classified into this archetype
    pub sessions: usize,
    pub characteristics: &'static [Characteristic],
    /// First session (in input order) that landed in this archetype
    pub example_session_id: String,
}

/// Classify every session and aggregate into per-archetype shares.
///
/// Only archetypes with at least one session are reported, ordered by
/// percentage descending with ties in [`Archetype::ALL`] order. No sessions
/// yields an empty list.
pub fn summarize(features: &[SessionFeature]) -> Vec<ArchetypeShare> {
    if features.is_empty() {
        return Vec::new();
    }

    let mut counts: HashMap<Archetype, (usize, &str)> = HashMap::new();
    for feature in features {
        let entry = counts
            .entry(classify(feature))
            .or_insert((0, feature.session_id.as_str()));
        entry.0 += 1;
    }

    let total = features.len() as f64;
    let mut shares: Vec<ArchetypeShare> = counts
        .into_iter()
        .map(|(archetype, (count, example))| ArchetypeShare {
            archetype,
            name: archetype.name(),
            percentage: (count as f64 / total * 1000.0).round() / 10.0,
            sessions: count,
            characteristics: archetype.characteristics(),
            example_session_id: example.to_string(),
        })
        .collect();

    shares.sort_by(|a, b| {
        b.percentage
            .partial_cmp(&a.percentage)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.archetype.cmp(&b.archetype))
    });
    shares
}

/// Classify all sessions in the range.
///
/// A store failure aborts the whole result; no partial shares are returned.
pub fn generate_archetypes(
    db: &Database,
    filter: &EventFilter,
) -> crate::Result<Vec<ArchetypeShare>> {
    let features = extract_session_features(db, filter)?;
    let shares = summarize(&features);
    tracing::debug!(
        sessions = features.len(),
        archetypes = shares.len(),
        "Classified sessions"
    );
    Ok(shares)
}
