//! Substring search: scan the searchable tables, then drop every candidate
//! the caller cannot read.
//!
//! Every row of every scanned kind is decoded and matched in memory. That is
//! adequate for a single-user desktop store; anything larger needs a real
//! index (FTS5) instead of this scan.

use canvas_core::{
  access::Permission,
  resource::{Resource, ResourceKind},
  user::Principal,
};
use rusqlite::Connection;

use crate::{Result, acl, encode::RawResource};

/// `needle` must be lowercased and non-empty.
pub fn scan(
  conn: &Connection,
  caller: &Principal,
  kinds: &[ResourceKind],
  needle: &str,
  limit: usize,
) -> Result<Vec<Resource>> {
  let mut hits = Vec::new();
  if limit == 0 {
    return Ok(hits);
  }

  for &kind in kinds {
    let sql = format!(
      "SELECT {} FROM {} ORDER BY updated_at DESC, id",
      RawResource::COLUMNS,
      kind.table()
    );
    let mut stmt = conn.prepare(&sql)?;
    let raws = stmt
      .query_map([], RawResource::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    for raw in raws {
      let resource = raw.into_resource(kind)?;
      if !resource.payload.matches_text(needle) {
        continue;
      }
      let readable = acl::decide(
        conn,
        caller,
        kind,
        &resource.id,
        &resource.owner_id,
        Permission::Read,
      )?
      .is_allowed();
      if readable {
        hits.push(resource);
        if hits.len() >= limit {
          return Ok(hits);
        }
      }
    }
  }

  Ok(hits)
}
