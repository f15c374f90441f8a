//! Schema migration runner.
//!
//! Each [`Migration`] is a numbered script named `NNN_description.sql`. The
//! runner applies every script whose version is not yet recorded in
//! `schema_migrations`, in ascending order, and records the version in the
//! same transaction as the script. A failing script aborts the whole run with
//! [`Error::MigrationFailed`]; earlier versions stay recorded.

use std::{
  borrow::Cow,
  collections::BTreeSet,
  path::Path,
};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, error, info};

use crate::{
  Error, Result,
  encode::{decode_dt, encode_dt, now},
  schema::{MIGRATIONS_TABLE, embedded_migrations},
};

// ─── Migration ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
  pub version: u32,
  pub name:    Cow<'static, str>,
  pub sql:     Cow<'static, str>,
}

impl Migration {
  pub fn new(
    version: u32,
    name: impl Into<Cow<'static, str>>,
    sql: impl Into<Cow<'static, str>>,
  ) -> Self {
    Self { version, name: name.into(), sql: sql.into() }
  }

  /// Build a migration from a `NNN_description[.sql]` file name.
  pub fn from_file(
    file_name: &str,
    sql: impl Into<Cow<'static, str>>,
  ) -> Result<Self> {
    let stem = file_name.strip_suffix(".sql").unwrap_or(file_name);
    let invalid = || {
      Error::InvalidMigration(format!(
        "{file_name:?} does not match NNN_description"
      ))
    };

    let (digits, name) = stem.split_once('_').ok_or_else(invalid)?;
    if digits.is_empty()
      || !digits.bytes().all(|b| b.is_ascii_digit())
      || name.is_empty()
    {
      return Err(invalid());
    }
    let version = digits.parse().map_err(|_| invalid())?;

    Ok(Self::new(version, name.to_owned(), sql))
  }

  /// Read every `*.sql` file in `dir`, in lexical order of file name.
  pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<Self>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
      let path = entry?.path();
      if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
        files.push(path);
      }
    }
    files.sort();

    files
      .into_iter()
      .map(|path| {
        let file_name = path
          .file_name()
          .and_then(|n| n.to_str())
          .ok_or_else(|| {
            Error::InvalidMigration(format!("non UTF-8 file name: {path:?}"))
          })?
          .to_owned();
        let sql = std::fs::read_to_string(&path)?;
        Self::from_file(&file_name, sql)
      })
      .collect()
  }

  pub fn file_name(&self) -> String {
    format!("{:03}_{}.sql", self.version, self.name)
  }
}

/// One row of `schema_migrations`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
  pub version:    u32,
  pub name:       String,
  pub applied_at: DateTime<Utc>,
}

/// Outcome of a successful [`MigrationRunner::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
  pub applied: Vec<u32>,
  pub skipped: Vec<u32>,
}

// ─── Runner ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MigrationRunner {
  migrations: Vec<Migration>,
}

impl MigrationRunner {
  /// Versions must be strictly increasing.
  pub fn new(migrations: Vec<Migration>) -> Result<Self> {
    for pair in migrations.windows(2) {
      if pair[1].version <= pair[0].version {
        return Err(Error::InvalidMigration(format!(
          "{} must come after {}",
          pair[1].file_name(),
          pair[0].file_name()
        )));
      }
    }
    Ok(Self { migrations })
  }

  /// Runner over the scripts compiled into this build.
  pub fn embedded() -> Result<Self> { Self::new(embedded_migrations()?) }

  pub fn migrations(&self) -> &[Migration] { &self.migrations }

  /// Apply every pending migration on `conn`.
  pub fn run(&self, conn: &mut Connection) -> Result<MigrationReport> {
    conn.execute_batch(MIGRATIONS_TABLE)?;

    let recorded: BTreeSet<u32> = Self::records(conn)?
      .into_iter()
      .map(|r| r.version)
      .collect();
    let latest = recorded.last().copied();

    let mut report = MigrationReport::default();
    for migration in &self.migrations {
      if recorded.contains(&migration.version) {
        report.skipped.push(migration.version);
        continue;
      }
      if let Some(latest) = latest
        && migration.version < latest
      {
        return Err(Error::InvalidMigration(format!(
          "{} is pending but version {latest} is already applied",
          migration.file_name()
        )));
      }

      debug!(version = migration.version, name = %migration.name, "applying migration");
      apply(conn, migration).inspect_err(|e| {
        error!(version = migration.version, name = %migration.name, error = %e, "migration failed");
      })?;
      info!(version = migration.version, name = %migration.name, "applied migration");
      report.applied.push(migration.version);
    }

    if report.applied.is_empty() {
      info!(version = ?latest, "schema is up to date");
    }
    Ok(report)
  }

  /// Rows of `schema_migrations`, ascending by version.
  pub fn records(conn: &Connection) -> Result<Vec<MigrationRecord>> {
    conn.execute_batch(MIGRATIONS_TABLE)?;
    let mut stmt = conn.prepare(
      "SELECT version, name, applied_at FROM schema_migrations ORDER BY version",
    )?;
    let raws = stmt
      .query_map([], |row| {
        Ok((
          row.get::<_, u32>(0)?,
          row.get::<_, String>(1)?,
          row.get::<_, String>(2)?,
        ))
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    raws
      .into_iter()
      .map(|(version, name, applied_at)| {
        Ok(MigrationRecord { version, name, applied_at: decode_dt(&applied_at)? })
      })
      .collect()
  }
}

/// Run one script and record its version atomically.
fn apply(conn: &mut Connection, migration: &Migration) -> Result<()> {
  let failed = |source| Error::MigrationFailed {
    version: migration.version,
    name: migration.name.to_string(),
    source,
  };

  let tx = conn.transaction().map_err(failed)?;
  tx.execute_batch(&migration.sql).map_err(failed)?;
  tx.execute(
    "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
    rusqlite::params![
      migration.version,
      migration.name.as_ref(),
      encode_dt(now())
    ],
  )
  .map_err(failed)?;
  tx.commit().map_err(failed)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn memory() -> Connection { Connection::open_in_memory().unwrap() }

  fn table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
      .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
      .unwrap();
    stmt
      .query_map([], |r| r.get(0))
      .unwrap()
      .collect::<rusqlite::Result<_>>()
      .unwrap()
  }

  #[test]
  fn parses_numbered_file_names() {
    let m = Migration::from_file("007_add_widgets.sql", "SELECT 1;").unwrap();
    assert_eq!(m.version, 7);
    assert_eq!(m.name, "add_widgets");
    assert_eq!(m.file_name(), "007_add_widgets.sql");

    for bad in ["widgets.sql", "_x.sql", "01a_x.sql", "003_.sql"] {
      assert!(
        matches!(Migration::from_file(bad, ""), Err(Error::InvalidMigration(_))),
        "{bad} should be rejected"
      );
    }
  }

  #[test]
  fn rejects_out_of_order_and_duplicate_versions() {
    let out_of_order = vec![
      Migration::new(1, "b", "SELECT 1;"),
      Migration::new(0, "a", "SELECT 1;"),
    ];
    assert!(matches!(
      MigrationRunner::new(out_of_order),
      Err(Error::InvalidMigration(_))
    ));

    let duplicate = vec![
      Migration::new(1, "a", "SELECT 1;"),
      Migration::new(1, "b", "SELECT 1;"),
    ];
    assert!(MigrationRunner::new(duplicate).is_err());
  }

  #[test]
  fn embedded_set_is_ordered() {
    let runner = MigrationRunner::embedded().unwrap();
    let versions: Vec<_> = runner.migrations().iter().map(|m| m.version).collect();
    assert_eq!(versions, [0, 1, 2]);
  }

  #[test]
  fn second_run_applies_nothing() {
    let mut conn = memory();
    let runner = MigrationRunner::embedded().unwrap();

    let first = runner.run(&mut conn).unwrap();
    assert_eq!(first.applied, [0, 1, 2]);
    assert!(first.skipped.is_empty());
    let tables_after_first = table_names(&conn);

    let second = runner.run(&mut conn).unwrap();
    assert!(second.applied.is_empty());
    assert_eq!(second.skipped, [0, 1, 2]);
    assert_eq!(table_names(&conn), tables_after_first);
    assert_eq!(MigrationRunner::records(&conn).unwrap().len(), 3);
  }

  #[test]
  fn scripts_are_idempotent_without_bookkeeping() {
    // A crash between running a script and recording it must be harmless on
    // retry: run every script twice by hand, then let the runner record them.
    let mut conn = memory();
    for m in embedded_migrations().unwrap() {
      conn.execute_batch(&m.sql).unwrap();
      conn.execute_batch(&m.sql).unwrap();
    }
    let report = MigrationRunner::embedded().unwrap().run(&mut conn).unwrap();
    assert_eq!(report.applied, [0, 1, 2]);
  }

  #[test]
  fn failing_script_is_fatal_and_keeps_earlier_versions() {
    let mut conn = memory();
    let runner = MigrationRunner::new(vec![
      Migration::new(0, "ok", "CREATE TABLE IF NOT EXISTS a (x INTEGER);"),
      Migration::new(1, "broken", "CREATE TABLE nonsense ("),
      Migration::new(2, "never", "CREATE TABLE IF NOT EXISTS c (x INTEGER);"),
    ])
    .unwrap();

    let err = runner.run(&mut conn).unwrap_err();
    assert!(matches!(err, Error::MigrationFailed { version: 1, .. }));

    let recorded: Vec<_> = MigrationRunner::records(&conn)
      .unwrap()
      .into_iter()
      .map(|r| r.version)
      .collect();
    assert_eq!(recorded, [0]);
    assert!(!table_names(&conn).contains(&"c".to_owned()));
  }

  #[test]
  fn refuses_to_apply_below_the_latest_recorded_version() {
    let mut conn = memory();
    MigrationRunner::new(vec![Migration::new(5, "later", "SELECT 1;")])
      .unwrap()
      .run(&mut conn)
      .unwrap();

    let err = MigrationRunner::new(vec![
      Migration::new(3, "earlier", "SELECT 1;"),
      Migration::new(5, "later", "SELECT 1;"),
    ])
    .unwrap()
    .run(&mut conn)
    .unwrap_err();
    assert!(matches!(err, Error::InvalidMigration(_)));
  }

  #[test]
  fn loads_scripts_from_a_directory_in_lexical_order() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("001_second.sql"), "CREATE TABLE IF NOT EXISTS b (x);").unwrap();
    std::fs::write(dir.path().join("000_first.sql"), "CREATE TABLE IF NOT EXISTS a (x);").unwrap();
    std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

    let migrations = Migration::load_dir(dir.path()).unwrap();
    let names: Vec<_> = migrations.iter().map(Migration::file_name).collect();
    assert_eq!(names, ["000_first.sql", "001_second.sql"]);

    let mut conn = memory();
    let report = MigrationRunner::new(migrations).unwrap().run(&mut conn).unwrap();
    assert_eq!(report.applied, [0, 1]);
  }
}
