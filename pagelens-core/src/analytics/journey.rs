//! Navigation paths
//!
//! - [`user_journey`]: the ordered page views of one session
//! - [`average_journey`]: a page-transition graph over every session in range,
//!   optionally anchored at a start page and/or cut at an end page

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::db::{Database, SessionTrail};
use crate::error::Error;
use crate::types::EventFilter;

/// One stop of a session's journey.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JourneyStep {
    pub page: String,
    pub timestamp: DateTime<Utc>,
}

/// A page in the transition graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JourneyNode {
    pub name: String,
}

/// Sessions that moved directly from `source` to `target` (node indices).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JourneyLink {
    pub source: usize,
    pub target: usize,
    pub value: i64,
}

/// Page-transition graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JourneyGraph {
    pub nodes: Vec<JourneyNode>,
    pub links: Vec<JourneyLink>,
}

/// Optional anchors for [`average_journey`].
#[derive(Debug, Clone, Default)]
pub struct JourneyAnchors {
    /// Keep each session's path from its first visit to this page
    pub start_page: Option<String>,
    /// Cut each session's path at its first later visit to this page
    pub end_page: Option<String>,
}

/// Every page view of a session, in order.
pub fn user_journey(db: &Database, session_id: &str) -> crate::Result<Vec<JourneyStep>> {
    let steps = db.session_trail(session_id)?;
    if steps.is_empty() {
        return Err(Error::SessionNotFound(session_id.to_string()));
    }
    Ok(steps
        .into_iter()
        .map(|step| JourneyStep {
            page: step.page,
            timestamp: step.timestamp,
        })
        .collect())
}

/// The part of a session's page sequence the anchors select.
///
/// Returns `None` when the session never reaches an anchor.
fn anchored_path<'a>(pages: &[&'a str], anchors: &JourneyAnchors) -> Option<Vec<&'a str>> {
    let start = match anchors.start_page.as_deref() {
        Some(page) => pages.iter().position(|p| *p == page)?,
        None => 0,
    };
    let path = &pages[start..];

    let path = match anchors.end_page.as_deref() {
        Some(page) => {
            let end = path.iter().skip(1).position(|p| *p == page)? + 1;
            &path[..=end]
        }
        None => path,
    };
    Some(path.to_vec())
}

/// Build the transition graph from ordered session trails.
///
/// Each session counts at most once per link; self-transitions (reloads) are
/// ignored. Nodes are numbered in order of first appearance; links are
/// ordered by value descending.
pub fn build_journey_graph(trails: &[SessionTrail], anchors: &JourneyAnchors) -> JourneyGraph {
    let mut graph = JourneyGraph::default();
    let mut node_index: HashMap<String, usize> = HashMap::new();
    let mut link_counts: HashMap<(usize, usize), i64> = HashMap::new();

    for trail in trails {
        let pages: Vec<&str> = trail.steps.iter().map(|s| s.page.as_str()).collect();
        let Some(path) = anchored_path(&pages, anchors) else {
            continue;
        };

        let mut seen: BTreeSet<(usize, usize)> = BTreeSet::new();
        for pair in path.windows(2) {
            if pair[0] == pair[1] {
                continue;
            }
            let mut index_of = |page: &str| -> usize {
                if let Some(&idx) = node_index.get(page) {
                    return idx;
                }
                let idx = graph.nodes.len();
                graph.nodes.push(JourneyNode {
                    name: page.to_string(),
                });
                node_index.insert(page.to_string(), idx);
                idx
            };
            let source = index_of(pair[0]);
            let target = index_of(pair[1]);
            seen.insert((source, target));
        }

        for link in seen {
            *link_counts.entry(link).or_insert(0) += 1;
        }
    }

    graph.links = link_counts
        .into_iter()
        .map(|((source, target), value)| JourneyLink {
            source,
            target,
            value,
        })
        .collect();
    graph.links.sort_by(|a, b| {
        b.value
            .cmp(&a.value)
            .then(a.source.cmp(&b.source))
            .then(a.target.cmp(&b.target))
    });

    graph
}

/// Page-transition graph across all sessions in range.
pub fn average_journey(
    db: &Database,
    filter: &EventFilter,
    anchors: &JourneyAnchors,
) -> crate::Result<JourneyGraph> {
    let trails = db.session_trails(filter)?;
    let graph = build_journey_graph(&trails, anchors);
    tracing::debug!(
        sessions = trails.len(),
        nodes = graph.nodes.len(),
        links = graph.links.len(),
        "Built journey graph"
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TrailStep;
    use crate::types::PageView;
    use chrono::{Duration, TimeZone};

    fn trail(id: &str, pages: &[&str]) -> SessionTrail {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        SessionTrail {
            session_id: id.to_string(),
            steps: pages
                .iter()
                .enumerate()
                .map(|(i, page)| TrailStep {
                    page: page.to_string(),
                    timestamp: start + Duration::seconds(i as i64),
                })
                .collect(),
        }
    }

    fn link_names(graph: &JourneyGraph) -> Vec<(String, String, i64)> {
        graph
            .links
            .iter()
            .map(|l| {
                (
                    graph.nodes[l.source].name.clone(),
                    graph.nodes[l.target].name.clone(),
                    l.value,
                )
            })
            .collect()
    }

    #[test]
    fn test_graph_counts_sessions_not_transitions() {
        let trails = vec![
            trail("a", &["/", "/docs", "/", "/docs"]),
            trail("b", &["/", "/docs", "/docs", "/pricing"]),
        ];
        let graph = build_journey_graph(&trails, &JourneyAnchors::default());

        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(
            link_names(&graph),
            vec![
                ("/".to_string(), "/docs".to_string(), 2),
                ("/docs".to_string(), "/".to_string(), 1),
                ("/docs".to_string(), "/pricing".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_anchors() {
        let trails = vec![
            trail("a", &["/blog", "/", "/docs", "/signup", "/docs"]),
            trail("b", &["/", "/pricing"]),
            trail("c", &["/docs", "/signup"]),
        ];
        let anchors = JourneyAnchors {
            start_page: Some("/".to_string()),
            end_page: Some("/signup".to_string()),
        };
        let graph = build_journey_graph(&trails, &anchors);

        // b never reaches /signup, c never visits /
        assert_eq!(
            link_names(&graph),
            vec![
                ("/".to_string(), "/docs".to_string(), 1),
                ("/docs".to_string(), "/signup".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_empty_trails() {
        let graph = build_journey_graph(&[], &JourneyAnchors::default());
        assert_eq!(graph, JourneyGraph::default());
    }

    #[test]
    fn test_user_journey() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        db.insert_page_views(&[
            PageView::new("s1", t + Duration::minutes(1), "/docs", "site", "ip"),
            PageView::new("s1", t, "/", "site", "ip"),
        ])
        .unwrap();

        let journey = user_journey(&db, "s1").unwrap();
        assert_eq!(journey.len(), 2);
        assert_eq!(journey[0].page, "/");

        assert!(matches!(
            user_journey(&db, "nope"),
            Err(Error::SessionNotFound(_))
        ));
    }
}
