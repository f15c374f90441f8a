//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings with fixed microsecond
//! precision, so lexical order matches chronological order. Payloads,
//! permission sets and activity details are stored as compact JSON.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use canvas_core::{
  access::{AclEntry, PermissionSet},
  activity::ActivityLogEntry,
  resource::{Payload, Resource, ResourceKind},
  user::{Role, User},
};
use rusqlite::Row;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The current time, truncated to the stored precision so values returned by
/// the store compare equal to what is read back later.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_kind(s: &str) -> Result<ResourceKind> {
  ResourceKind::parse(s).map_err(|e| Error::Corrupt(e.to_string()))
}

pub fn decode_role(s: &str) -> Result<Role> {
  Role::parse(s).map_err(|e| Error::Corrupt(e.to_string()))
}

// ─── Sets ────────────────────────────────────────────────────────────────────

pub fn encode_permissions(p: &PermissionSet) -> Result<String> {
  Ok(serde_json::to_string(p)?)
}

pub fn decode_permissions(s: &str) -> Result<PermissionSet> {
  serde_json::from_str(s)
    .map_err(|e| Error::Corrupt(format!("acl permissions {s:?}: {e}")))
}

pub fn encode_labels(labels: &BTreeSet<String>) -> Result<String> {
  Ok(serde_json::to_string(labels)?)
}

pub fn decode_labels(s: &str) -> Result<BTreeSet<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a resource table row.
pub struct RawResource {
  pub id:         String,
  pub user_id:    String,
  pub payload:    String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawResource {
  /// Column list matching [`RawResource::from_row`].
  pub const COLUMNS: &'static str = "id, user_id, payload, created_at, updated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      user_id:    row.get(1)?,
      payload:    row.get(2)?,
      created_at: row.get(3)?,
      updated_at: row.get(4)?,
    })
  }

  pub fn into_resource(self, kind: ResourceKind) -> Result<Resource> {
    let data: serde_json::Value = serde_json::from_str(&self.payload)?;
    let payload = Payload::from_parts(kind, data)
      .map_err(|e| Error::Corrupt(format!("{kind} {}: {e}", self.id)))?;

    Ok(Resource {
      id: self.id,
      owner_id: self.user_id,
      payload,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub id:          String,
  pub username:    String,
  pub email:       String,
  pub role:        String,
  pub permissions: String,
  pub created_at:  String,
}

impl RawUser {
  pub const COLUMNS: &'static str =
    "id, username, email, role, permissions, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      username:    row.get(1)?,
      email:       row.get(2)?,
      role:        row.get(3)?,
      permissions: row.get(4)?,
      created_at:  row.get(5)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:          self.id,
      username:    self.username,
      email:       self.email,
      role:        decode_role(&self.role)?,
      permissions: decode_labels(&self.permissions)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `acl` row.
pub struct RawAclEntry {
  pub resource_id:   String,
  pub resource_type: String,
  pub user_id:       String,
  pub permissions:   String,
  pub updated_at:    String,
}

impl RawAclEntry {
  pub const COLUMNS: &'static str =
    "resource_id, resource_type, user_id, permissions, updated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      resource_id:   row.get(0)?,
      resource_type: row.get(1)?,
      user_id:       row.get(2)?,
      permissions:   row.get(3)?,
      updated_at:    row.get(4)?,
    })
  }

  pub fn into_entry(self) -> Result<AclEntry> {
    Ok(AclEntry {
      resource_id:   self.resource_id,
      resource_type: decode_kind(&self.resource_type)?,
      user_id:       self.user_id,
      permissions:   decode_permissions(&self.permissions)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from an `activity_log` row.
pub struct RawActivity {
  pub id:            i64,
  pub user_id:       String,
  pub action:        String,
  pub resource_type: Option<String>,
  pub resource_id:   Option<String>,
  pub details:       String,
  pub created_at:    String,
}

impl RawActivity {
  pub const COLUMNS: &'static str =
    "id, user_id, action, resource_type, resource_id, details, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      user_id:       row.get(1)?,
      action:        row.get(2)?,
      resource_type: row.get(3)?,
      resource_id:   row.get(4)?,
      details:       row.get(5)?,
      created_at:    row.get(6)?,
    })
  }

  pub fn into_entry(self) -> Result<ActivityLogEntry> {
    Ok(ActivityLogEntry {
      id:            self.id,
      user_id:       self.user_id,
      action:        self.action,
      resource_type: self.resource_type.as_deref().map(decode_kind).transpose()?,
      resource_id:   self.resource_id,
      details:       serde_json::from_str(&self.details)?,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}
