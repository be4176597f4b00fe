//! Ingestion of page-view logs
//!
//! Reads newline-delimited JSON, one [`PageView`] per line, and appends the
//! events to the store.
//!
//! ```text
//! {"session_id":"4f1c...","timestamp":"2024-03-01T10:00:00Z","page":"/","site":"example.com","ip":"203.0.113.7"}
//! ```
//!
//! A malformed line is recorded in [`ImportResult::errors`] and skipped; the
//! rest of the file is still imported.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pagelens_core::{import_jsonl, Database};
//! use std::io::BufReader;
//!
//! let file = std::fs::File::open("events.jsonl")?;
//! let result = import_jsonl(&db, BufReader::new(file))?;
//! println!("Imported {} of {} lines", result.events_inserted, result.lines_read);
//! ```

use std::io::BufRead;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::PageView;

/// Events are written in transactions of this many rows.
const BATCH_SIZE: usize = 500;

/// Outcome of one import.
#[derive(Debug, Default)]
pub struct ImportResult {
    /// Non-blank lines read
    pub lines_read: usize,
    /// Events written to the store
    pub events_inserted: usize,
    /// Rejected lines (1-based line number, reason)
    pub errors: Vec<(usize, String)>,
}

impl ImportResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Parse a single JSONL line into a page view.
pub fn parse_line(line: &str, line_number: usize) -> Result<PageView> {
    let view: PageView = serde_json::from_str(line).map_err(|e| Error::Parse {
        line: line_number,
        message: e.to_string(),
    })?;
    if view.session_id.trim().is_empty() {
        return Err(Error::Parse {
            line: line_number,
            message: "missing session id".to_string(),
        });
    }
    Ok(view)
}

/// Import every page view from a JSONL reader.
///
/// Read errors and store errors abort the import; events already committed
/// stay in the store.
pub fn import_jsonl<R: BufRead>(db: &Database, reader: R) -> Result<ImportResult> {
    let mut result = ImportResult::default();
    let mut batch: Vec<PageView> = Vec::with_capacity(BATCH_SIZE);

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        result.lines_read += 1;

        match parse_line(&line, line_number) {
            Ok(view) => batch.push(view),
            Err(e) => {
                tracing::warn!(line = line_number, error = %e, "Skipping malformed event");
                result.errors.push((line_number, e.to_string()));
            }
        }

        if batch.len() >= BATCH_SIZE {
            result.events_inserted += db.insert_page_views(&batch)?;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        result.events_inserted += db.insert_page_views(&batch)?;
    }

    tracing::info!(
        lines = result.lines_read,
        inserted = result.events_inserted,
        errors = result.errors.len(),
        "Import complete"
    );
    Ok(result)
}
