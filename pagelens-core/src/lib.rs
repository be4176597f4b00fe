//! # pagelens-core
//!
//! Core library for pagelens - a session analytics and classification engine.
//!
//! This library provides:
//! - Domain types for page views and query ranges
//! - Database storage layer with SQLite
//! - JSONL ingestion of page-view logs
//! - Analytics: session archetypes, traffic curves, cohort retention,
//!   dwell time, bounce rate and navigation paths
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through two layers:
//! - **Layer 1 (Events):** Append-only `page_views` table, one row per view
//! - **Layer 2 (Derived):** Analytics computed per request from a time range
//!   (never stored)
//!
//! ## Example
//!
//! ```rust,no_run
//! use pagelens_core::{analytics, Config, Database, EventFilter};
//!
//! let config = Config::load().expect("failed to load config");
//! let db = Database::open(&config.resolved_database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let filter = EventFilter::ending_at(chrono::Utc::now(), chrono::Duration::days(7));
//! let shares = analytics::generate_archetypes(&db, &filter).expect("query failed");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use ingest::{import_jsonl, ImportResult};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod types;
