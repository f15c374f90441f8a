//! [`SqliteStore`]: the SQLite implementation of [`RecordStore`].

use std::{
  path::{Path, PathBuf},
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
};

use canvas_core::{
  access::{AclEntry, Decision, Permission, PermissionSet},
  activity::{ACL_UPDATED, ActivityLogEntry, NewActivity, USER_CREATED},
  resource::{NewResource, Payload, Resource, ResourceFilter, ResourceKind},
  store::{DEFAULT_SEARCH_LIMIT, RecordStore, SearchQuery},
  user::{NewUser, Role, User},
};
use rusqlite::{Connection, OptionalExtension as _};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result, acl, audit,
  encode::{RawResource, RawUser, encode_dt, encode_labels, now},
  migrate::{Migration, MigrationRecord, MigrationRunner},
  schema::PRAGMAS,
  search,
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// The admin account created on first boot when no admin exists.
#[derive(Debug, Clone)]
pub struct DefaultAdmin {
  pub id:       String,
  pub username: String,
  pub email:    String,
}

impl Default for DefaultAdmin {
  fn default() -> Self {
    Self {
      id:       "admin".to_owned(),
      username: "admin".to_owned(),
      email:    "admin@localhost".to_owned(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
  /// Load migration scripts from this directory instead of the embedded set.
  pub migrations_dir: Option<PathBuf>,
  pub default_admin:  Option<DefaultAdmin>,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self { migrations_dir: None, default_admin: Some(DefaultAdmin::default()) }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A record store backed by a single SQLite file.
///
/// A value of this type only exists once every migration has been applied,
/// so no operation can reach an unmigrated database.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  audit_failures:  Arc<AtomicU64>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with default options.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, &StoreOptions::default()).await
  }

  /// Open an in-memory store. Used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    Self::open_in_memory_with(&StoreOptions::default()).await
  }

  pub async fn open_with(
    path: impl AsRef<Path>,
    options: &StoreOptions,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::initialize(conn, options).await
  }

  pub async fn open_in_memory_with(options: &StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::initialize(conn, options).await
  }

  /// Migrate, then seed the default admin. Any failure here is fatal.
  async fn initialize(
    conn: tokio_rusqlite::Connection,
    options: &StoreOptions,
  ) -> Result<Self> {
    let runner = match &options.migrations_dir {
      Some(dir) => MigrationRunner::new(Migration::load_dir(dir)?)?,
      None => MigrationRunner::embedded()?,
    };

    let report = conn
      .call(move |conn| {
        conn.execute_batch(PRAGMAS)?;
        Ok(runner.run(conn))
      })
      .await??;
    info!(applied = ?report.applied, skipped = report.skipped.len(), "migrations complete");

    let store = Self { conn, audit_failures: Arc::new(AtomicU64::new(0)) };
    if let Some(admin) = &options.default_admin {
      store.ensure_admin(admin).await?;
    }
    Ok(store)
  }

  /// Shut down the connection thread.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  /// Rows of `schema_migrations`, ascending by version.
  pub async fn applied_migrations(&self) -> Result<Vec<MigrationRecord>> {
    self
      .conn
      .call(|conn| Ok(MigrationRunner::records(conn)))
      .await?
  }

  /// Number of audit entries that could not be written since open.
  pub fn audit_failures(&self) -> u64 {
    self.audit_failures.load(Ordering::Relaxed)
  }

  /// Create `admin` unless some admin already exists.
  ///
  /// If a non-admin user already holds the configured id or username, seeding
  /// is skipped with a warning and the store opens without an admin.
  async fn ensure_admin(&self, admin: &DefaultAdmin) -> Result<Option<User>> {
    let has_admin = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM users WHERE role = 'admin' LIMIT 1",
              [],
              |_| Ok(()),
            )
            .optional()?
            .is_some(),
        )
      })
      .await?;
    if has_admin {
      return Ok(None);
    }

    let seed = NewUser::new(&admin.username, &admin.email, Role::Admin)
      .with_id(&admin.id);
    match self.create_user(seed, None).await {
      Ok(user) => {
        info!(user_id = %user.id, username = %user.username, "created default admin");
        Ok(Some(user))
      }
      Err(Error::UserExists(taken)) => {
        warn!(
          user_id = %admin.id,
          username = %admin.username,
          %taken,
          "default admin id or username is held by a non-admin user; not seeding"
        );
        Ok(None)
      }
      Err(e) => Err(e),
    }
  }

  /// Append an audit entry after a committed mutation.
  ///
  /// Failure is reported and counted but never fails the mutation.
  async fn audit(&self, entry: NewActivity) {
    let action = entry.action.clone();
    let resource_id = entry.resource_id.clone();
    if let Err(e) = self.append_activity(entry).await {
      self.audit_failures.fetch_add(1, Ordering::Relaxed);
      error!(%action, ?resource_id, error = %e, "failed to append activity log entry");
    }
  }
}

// ─── Connection-thread helpers ───────────────────────────────────────────────

fn select_resource(
  conn: &Connection,
  kind: ResourceKind,
  id: &str,
) -> Result<Option<Resource>> {
  let sql = format!(
    "SELECT {} FROM {} WHERE id = ?1",
    RawResource::COLUMNS,
    kind.table()
  );
  let raw = conn
    .query_row(&sql, rusqlite::params![id], RawResource::from_row)
    .optional()?;
  raw.map(|r| r.into_resource(kind)).transpose()
}

fn require_resource(
  conn: &Connection,
  kind: ResourceKind,
  id: &str,
) -> Result<Resource> {
  select_resource(conn, kind, id)?.ok_or_else(|| Error::NotFound {
    kind,
    resource_id: id.to_owned(),
  })
}

/// Upsert; returns the stored resource and whether it was newly created.
fn save_resource(
  conn: &Connection,
  caller_id: &str,
  id: String,
  payload: Payload,
) -> Result<(Resource, bool)> {
  let caller = acl::principal(conn, caller_id)?;
  let kind = payload.kind();
  let data = payload.to_json()?.to_string();
  let subtype = payload.subtype().map(str::to_owned);
  let at = now();

  match select_resource(conn, kind, &id)? {
    Some(current) => {
      acl::require(conn, &caller, kind, &id, &current.owner_id, Permission::Write)?;
      conn.execute(
        &format!(
          "UPDATE {} SET type = ?2, payload = ?3, updated_at = ?4 WHERE id = ?1",
          kind.table()
        ),
        rusqlite::params![id, subtype, data, encode_dt(at)],
      )?;
      let resource = Resource {
        id,
        owner_id: current.owner_id,
        payload,
        created_at: current.created_at,
        updated_at: at,
      };
      Ok((resource, false))
    }
    None => {
      conn.execute(
        &format!(
          "INSERT INTO {} (id, user_id, type, payload, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          kind.table()
        ),
        rusqlite::params![id, caller.id, subtype, data, encode_dt(at)],
      )?;
      let resource = Resource {
        id,
        owner_id: caller.id,
        payload,
        created_at: at,
        updated_at: at,
      };
      Ok((resource, true))
    }
  }
}

fn delete_resource(
  conn: &mut Connection,
  caller_id: &str,
  kind: ResourceKind,
  id: &str,
) -> Result<()> {
  let caller = acl::principal(conn, caller_id)?;
  let owner = acl::existing_owner(conn, kind, id)?;
  acl::require(conn, &caller, kind, id, &owner, Permission::Delete)?;

  let tx = conn.transaction()?;
  tx.execute(
    &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
    rusqlite::params![id],
  )?;
  acl::remove_all(&tx, kind, id)?;
  tx.commit()?;
  Ok(())
}

fn insert_user(conn: &Connection, user: &User) -> Result<()> {
  let taken = conn
    .query_row(
      "SELECT 1 FROM users WHERE id = ?1 OR username = ?2",
      rusqlite::params![user.id, user.username],
      |_| Ok(()),
    )
    .optional()?
    .is_some();
  if taken {
    return Err(Error::UserExists(user.username.clone()));
  }

  conn.execute(
    "INSERT INTO users (id, username, email, role, permissions, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![
      user.id,
      user.username,
      user.email,
      user.role.as_str(),
      encode_labels(&user.permissions)?,
      encode_dt(user.created_at),
    ],
  )?;
  Ok(())
}

fn read_resource(
  conn: &Connection,
  caller_id: &str,
  kind: ResourceKind,
  id: &str,
) -> Result<Resource> {
  let caller = acl::principal(conn, caller_id)?;
  let resource = require_resource(conn, kind, id)?;
  acl::require(conn, &caller, kind, id, &resource.owner_id, Permission::Read)?;
  Ok(resource)
}

fn decide_for(
  conn: &Connection,
  caller_id: &str,
  kind: ResourceKind,
  id: &str,
  permission: Permission,
) -> Result<Decision> {
  let caller = acl::principal(conn, caller_id)?;
  let owner = acl::existing_owner(conn, kind, id)?;
  acl::decide(conn, &caller, kind, id, &owner, permission)
}

fn grant(conn: &Connection, caller_id: &str, entry: &AclEntry) -> Result<()> {
  let kind = entry.resource_type;
  let caller = acl::principal(conn, caller_id)?;
  let owner = acl::existing_owner(conn, kind, &entry.resource_id)?;
  acl::require(conn, &caller, kind, &entry.resource_id, &owner, Permission::Share)?;
  if !acl::user_exists(conn, &entry.user_id)? {
    return Err(Error::UnknownUser(entry.user_id.clone()));
  }
  acl::replace(
    conn,
    kind,
    &entry.resource_id,
    &entry.user_id,
    &entry.permissions,
    entry.updated_at,
  )
}

fn list_grants(
  conn: &Connection,
  caller_id: &str,
  kind: ResourceKind,
  resource_id: &str,
) -> Result<Vec<AclEntry>> {
  let caller = acl::principal(conn, caller_id)?;
  let owner = acl::existing_owner(conn, kind, resource_id)?;
  acl::require(conn, &caller, kind, resource_id, &owner, Permission::Read)?;
  acl::entries(conn, kind, resource_id)
}

fn search_as(
  conn: &Connection,
  caller_id: &str,
  kinds: &[ResourceKind],
  needle: &str,
  limit: usize,
) -> Result<Vec<Resource>> {
  let caller = acl::principal(conn, caller_id)?;
  search::scan(conn, &caller, kinds, needle, limit)
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(
    &self,
    input: NewUser,
    created_by: Option<&str>,
  ) -> Result<User> {
    input.validate()?;

    let user = User {
      id:          input.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
      username:    input.username,
      email:       input.email,
      role:        input.role,
      permissions: input.permissions,
      created_at:  now(),
    };

    let row = user.clone();
    self.conn.call(move |conn| Ok(insert_user(conn, &row))).await??;

    self
      .audit(
        NewActivity::new(created_by.unwrap_or(&user.id), USER_CREATED)
          .with_details(json!({
            "user_id": user.id,
            "username": user.username,
            "role": user.role,
          })),
      )
      .await;
    Ok(user)
  }

  async fn get_user(&self, id: &str) -> Result<Option<User>> {
    let id = id.to_owned();
    let sql = format!("SELECT {} FROM users WHERE id = ?1", RawUser::COLUMNS);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id], RawUser::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn list_users(&self) -> Result<Vec<User>> {
    let sql = format!("SELECT {} FROM users ORDER BY username", RawUser::COLUMNS);

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  // ── Resources ─────────────────────────────────────────────────────────────

  async fn save(&self, input: NewResource, caller_id: &str) -> Result<Resource> {
    input.validate()?;

    let kind = input.kind();
    let id = input.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let caller = caller_id.to_owned();
    let payload = input.payload;

    let (resource, created) = self
      .conn
      .call(move |conn| Ok(save_resource(conn, &caller, id, payload)))
      .await??;

    self
      .audit(
        NewActivity::new(caller_id, kind.saved_action())
          .on(kind, &resource.id)
          .with_details(json!({ "created": created })),
      )
      .await;
    Ok(resource)
  }

  async fn get_all(
    &self,
    kind: ResourceKind,
    owner_id: &str,
    filter: &ResourceFilter,
  ) -> Result<Vec<Resource>> {
    let owner_id = owner_id.to_owned();
    let subtype = filter.subtype.clone();
    let limit = filter.limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
    let offset = filter.offset.map_or(0, |o| i64::try_from(o).unwrap_or(i64::MAX));
    let sql = format!(
      "SELECT {} FROM {}
       WHERE user_id = ?1 AND (?2 IS NULL OR type = ?2)
       ORDER BY updated_at DESC, id
       LIMIT ?3 OFFSET ?4",
      RawResource::COLUMNS,
      kind.table()
    );

    let raws: Vec<RawResource> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![owner_id, subtype, limit, offset],
            RawResource::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(|r| r.into_resource(kind)).collect()
  }

  async fn get_one(
    &self,
    kind: ResourceKind,
    id: &str,
    caller_id: &str,
  ) -> Result<Resource> {
    let id = id.to_owned();
    let caller_id = caller_id.to_owned();

    self
      .conn
      .call(move |conn| Ok(read_resource(conn, &caller_id, kind, &id)))
      .await?
  }

  async fn delete(&self, kind: ResourceKind, id: &str, caller_id: &str) -> Result<()> {
    let resource_id = id.to_owned();
    let caller = caller_id.to_owned();

    self
      .conn
      .call(move |conn| Ok(delete_resource(conn, &caller, kind, &resource_id)))
      .await??;

    self
      .audit(NewActivity::new(caller_id, kind.deleted_action()).on(kind, id))
      .await;
    Ok(())
  }

  async fn check_permission(
    &self,
    caller_id: &str,
    kind: ResourceKind,
    id: &str,
    permission: Permission,
  ) -> Result<Decision> {
    let id = id.to_owned();
    let caller_id = caller_id.to_owned();

    self
      .conn
      .call(move |conn| Ok(decide_for(conn, &caller_id, kind, &id, permission)))
      .await?
  }

  // ── Access control ────────────────────────────────────────────────────────

  async fn set_permissions(
    &self,
    kind: ResourceKind,
    resource_id: &str,
    user_id: &str,
    permissions: PermissionSet,
    caller_id: &str,
  ) -> Result<AclEntry> {
    let entry = AclEntry {
      resource_id:   resource_id.to_owned(),
      resource_type: kind,
      user_id:       user_id.to_owned(),
      permissions,
      updated_at:    now(),
    };
    let row = entry.clone();
    let caller = caller_id.to_owned();

    self
      .conn
      .call(move |conn| Ok(grant(conn, &caller, &row)))
      .await??;

    self
      .audit(
        NewActivity::new(caller_id, ACL_UPDATED)
          .on(kind, resource_id)
          .with_details(json!({
            "user_id": entry.user_id,
            "permissions": entry.permissions,
          })),
      )
      .await;
    Ok(entry)
  }

  async fn get_permissions(
    &self,
    kind: ResourceKind,
    resource_id: &str,
    caller_id: &str,
  ) -> Result<Vec<AclEntry>> {
    let resource_id = resource_id.to_owned();
    let caller_id = caller_id.to_owned();

    self
      .conn
      .call(move |conn| Ok(list_grants(conn, &caller_id, kind, &resource_id)))
      .await?
  }

  // ── Audit log ─────────────────────────────────────────────────────────────

  async fn append_activity(&self, entry: NewActivity) -> Result<ActivityLogEntry> {
    if entry.action.trim().is_empty() {
      return Err(canvas_core::Error::Malformed("activity action must not be empty".into()).into());
    }
    let at = now();
    self
      .conn
      .call(move |conn| Ok(audit::insert(conn, entry, at)))
      .await?
  }

  async fn recent_activity(
    &self,
    user_id: &str,
    limit: usize,
  ) -> Result<Vec<ActivityLogEntry>> {
    let user_id = user_id.to_owned();
    self
      .conn
      .call(move |conn| Ok(audit::recent(conn, &user_id, limit)))
      .await?
  }

  // ── Search ────────────────────────────────────────────────────────────────

  async fn search(&self, query: &SearchQuery, caller_id: &str) -> Result<Vec<Resource>> {
    let kinds = if query.kinds.is_empty() {
      ResourceKind::SEARCHABLE.to_vec()
    } else {
      if let Some(kind) = query.kinds.iter().find(|k| !k.is_searchable()) {
        return Err(
          canvas_core::Error::Malformed(format!("{kind} is not searchable")).into(),
        );
      }
      let mut kinds = Vec::with_capacity(query.kinds.len());
      for &kind in &query.kinds {
        if !kinds.contains(&kind) {
          kinds.push(kind);
        }
      }
      kinds
    };

    // Blankness is judged on the trimmed text; the match uses it verbatim.
    if query.text.trim().is_empty() {
      return Ok(Vec::new());
    }
    let needle = query.text.to_lowercase();
    let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    if limit == 0 {
      return Ok(Vec::new());
    }
    let caller_id = caller_id.to_owned();

    self
      .conn
      .call(move |conn| Ok(search_as(conn, &caller_id, &kinds, &needle, limit)))
      .await?
  }
}
