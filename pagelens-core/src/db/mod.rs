//! Database layer for pagelens
//!
//! This module provides the event store using SQLite with:
//! - Schema migrations
//! - Repository queries for grouped counts and per-session sequences

pub mod repo;
pub mod schema;

pub use repo::{
    CohortRow, Database, IntervalRow, LocationRow, SessionSpanRow, SessionTrail, TrailStep,
};
