//! Database layer
//!
//! Schema and connection management live in `sqlite`; every query is an
//! `impl Database` block in the `models` subdirectory.

mod models;
mod sqlite;

pub use sqlite::Database;
