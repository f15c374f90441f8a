//! Activity log persistence. Insert and select only.

use chrono::{DateTime, Utc};
use canvas_core::activity::{ActivityLogEntry, NewActivity};
use rusqlite::Connection;

use crate::{
  Result,
  encode::{RawActivity, encode_dt},
};

pub fn insert(
  conn: &Connection,
  entry: NewActivity,
  at: DateTime<Utc>,
) -> Result<ActivityLogEntry> {
  conn.execute(
    "INSERT INTO activity_log
       (user_id, action, resource_type, resource_id, details, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![
      entry.user_id,
      entry.action,
      entry.resource_type.map(|k| k.as_str()),
      entry.resource_id,
      entry.details.to_string(),
      encode_dt(at),
    ],
  )?;

  Ok(ActivityLogEntry {
    id:            conn.last_insert_rowid(),
    user_id:       entry.user_id,
    action:        entry.action,
    resource_type: entry.resource_type,
    resource_id:   entry.resource_id,
    details:       entry.details,
    created_at:    at,
  })
}

/// The user's entries, most recent first.
pub fn recent(
  conn: &Connection,
  user_id: &str,
  limit: usize,
) -> Result<Vec<ActivityLogEntry>> {
  let sql = format!(
    "SELECT {} FROM activity_log
     WHERE user_id = ?1
     ORDER BY created_at DESC, id DESC
     LIMIT ?2",
    RawActivity::COLUMNS
  );
  let limit = i64::try_from(limit).unwrap_or(i64::MAX);

  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(rusqlite::params![user_id, limit], RawActivity::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  raws.into_iter().map(RawActivity::into_entry).collect()
}
