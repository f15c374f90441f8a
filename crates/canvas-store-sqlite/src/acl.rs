//! ACL table access and the permission gate used by every store operation.
//!
//! These helpers run on the connection thread, inside the closure passed to
//! [`tokio_rusqlite::Connection::call`], so a check and the mutation it
//! guards observe the same database state.

use chrono::{DateTime, Utc};
use canvas_core::{
  access::{self, AclEntry, Decision, Permission, PermissionSet},
  resource::ResourceKind,
  user::Principal,
};
use rusqlite::{Connection, OptionalExtension as _};
use tracing::debug;

use crate::{
  Error, Result,
  encode::{RawAclEntry, decode_permissions, decode_role, encode_dt, encode_permissions},
};

/// Load the caller's identity, failing with [`Error::UnknownUser`].
pub fn principal(conn: &Connection, user_id: &str) -> Result<Principal> {
  let role: Option<String> = conn
    .query_row(
      "SELECT role FROM users WHERE id = ?1",
      rusqlite::params![user_id],
      |r| r.get(0),
    )
    .optional()?;

  match role {
    Some(role) => Ok(Principal { id: user_id.to_owned(), role: decode_role(&role)? }),
    None => Err(Error::UnknownUser(user_id.to_owned())),
  }
}

pub fn user_exists(conn: &Connection, user_id: &str) -> Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM users WHERE id = ?1",
        rusqlite::params![user_id],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

/// Owner of a resource, or `None` if it does not exist.
pub fn owner_of(
  conn: &Connection,
  kind: ResourceKind,
  resource_id: &str,
) -> Result<Option<String>> {
  let sql = format!("SELECT user_id FROM {} WHERE id = ?1", kind.table());
  Ok(
    conn
      .query_row(&sql, rusqlite::params![resource_id], |r| r.get(0))
      .optional()?,
  )
}

/// Like [`owner_of`] but a missing resource is [`Error::NotFound`].
pub fn existing_owner(
  conn: &Connection,
  kind: ResourceKind,
  resource_id: &str,
) -> Result<String> {
  owner_of(conn, kind, resource_id)?.ok_or_else(|| Error::NotFound {
    kind,
    resource_id: resource_id.to_owned(),
  })
}

/// The ACL permissions `user_id` holds on a resource, if any.
pub fn lookup(
  conn: &Connection,
  kind: ResourceKind,
  resource_id: &str,
  user_id: &str,
) -> Result<Option<PermissionSet>> {
  let raw: Option<String> = conn
    .query_row(
      "SELECT permissions FROM acl
       WHERE resource_id = ?1 AND resource_type = ?2 AND user_id = ?3",
      rusqlite::params![resource_id, kind.as_str(), user_id],
      |r| r.get(0),
    )
    .optional()?;

  raw.as_deref().map(decode_permissions).transpose()
}

/// Run the resolution algorithm for a resource whose owner is known.
pub fn decide(
  conn: &Connection,
  caller: &Principal,
  kind: ResourceKind,
  resource_id: &str,
  owner_id: &str,
  requested: Permission,
) -> Result<Decision> {
  access::resolve(caller, owner_id, requested, || {
    lookup(conn, kind, resource_id, &caller.id)
  })
}

/// [`decide`], turning a denial into [`Error::PermissionDenied`].
pub fn require(
  conn: &Connection,
  caller: &Principal,
  kind: ResourceKind,
  resource_id: &str,
  owner_id: &str,
  requested: Permission,
) -> Result<()> {
  match decide(conn, caller, kind, resource_id, owner_id, requested)? {
    Decision::Allow(_) => Ok(()),
    Decision::Deny => {
      debug!(user_id = %caller.id, %kind, resource_id, permission = %requested, "permission denied");
      Err(Error::PermissionDenied {
        user_id: caller.id.clone(),
        kind,
        resource_id: resource_id.to_owned(),
        permission: requested,
      })
    }
  }
}

/// Replace `user_id`'s entry. An empty set deletes the row.
pub fn replace(
  conn: &Connection,
  kind: ResourceKind,
  resource_id: &str,
  user_id: &str,
  permissions: &PermissionSet,
  now: DateTime<Utc>,
) -> Result<()> {
  if permissions.is_empty() {
    conn.execute(
      "DELETE FROM acl
       WHERE resource_id = ?1 AND resource_type = ?2 AND user_id = ?3",
      rusqlite::params![resource_id, kind.as_str(), user_id],
    )?;
    return Ok(());
  }

  conn.execute(
    "INSERT INTO acl (resource_id, resource_type, user_id, permissions, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT (resource_id, resource_type, user_id)
     DO UPDATE SET permissions = excluded.permissions,
                   updated_at  = excluded.updated_at",
    rusqlite::params![
      resource_id,
      kind.as_str(),
      user_id,
      encode_permissions(permissions)?,
      encode_dt(now),
    ],
  )?;
  Ok(())
}

/// All entries on a resource, ordered by grantee.
pub fn entries(
  conn: &Connection,
  kind: ResourceKind,
  resource_id: &str,
) -> Result<Vec<AclEntry>> {
  let sql = format!(
    "SELECT {} FROM acl WHERE resource_id = ?1 AND resource_type = ?2 ORDER BY user_id",
    RawAclEntry::COLUMNS
  );
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(rusqlite::params![resource_id, kind.as_str()], RawAclEntry::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  raws.into_iter().map(RawAclEntry::into_entry).collect()
}

/// Drop every entry on a resource. Used when the resource is deleted.
pub fn remove_all(
  conn: &Connection,
  kind: ResourceKind,
  resource_id: &str,
) -> Result<usize> {
  Ok(conn.execute(
    "DELETE FROM acl WHERE resource_id = ?1 AND resource_type = ?2",
    rusqlite::params![resource_id, kind.as_str()],
  )?)
}
