//! SQL schema for the canvas SQLite store.
//!
//! The schema is defined entirely by the numbered scripts under
//! `migrations/`, embedded into the binary at compile time. Every script is
//! idempotent (`CREATE ... IF NOT EXISTS`), so re-running one whose version
//! was never recorded is a no-op rather than an error.

use crate::{Migration, Result};

/// Connection setup executed before migrating.
///
/// Not part of a migration because `journal_mode` cannot be changed inside a
/// transaction.
pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

/// Bookkeeping table written by the migration runner.
pub const MIGRATIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS schema_migrations (
    version     INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    applied_at  TEXT NOT NULL
);
";

/// `(file name, contents)` of each embedded script, in version order.
const EMBEDDED: &[(&str, &str)] = &[
  (
    "000_core_tables.sql",
    include_str!("../migrations/000_core_tables.sql"),
  ),
  (
    "001_access_control.sql",
    include_str!("../migrations/001_access_control.sql"),
  ),
  (
    "002_activity_log.sql",
    include_str!("../migrations/002_activity_log.sql"),
  ),
];

/// The migrations compiled into this build.
pub fn embedded_migrations() -> Result<Vec<Migration>> {
  EMBEDDED
    .iter()
    .map(|(file, sql)| Migration::from_file(file, *sql))
    .collect()
}
