//! The `RecordStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `canvas-store-sqlite`).
//! Higher layers (`canvas-api`, the server) depend on this abstraction, not on
//! any concrete backend.
//!
//! Every operation runs on behalf of a caller id. Reads, writes and deletes
//! of individual resources are authorised with
//! [`resolve`](crate::access::resolve); list operations are scoped by owner.

use std::future::Future;

use crate::{
  Classify,
  access::{AclEntry, Decision, Permission, PermissionSet},
  activity::{ActivityLogEntry, NewActivity},
  resource::{NewResource, Resource, ResourceFilter, ResourceKind},
  user::{NewUser, User},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Default cap on search results.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Parameters for [`RecordStore::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
  /// Case-insensitive substring. Blank text matches nothing.
  pub text:  String,
  /// Restrict to these kinds. Empty means every searchable kind; repeats
  /// are ignored.
  pub kinds: Vec<ResourceKind>,
  pub limit: Option<usize>,
}

impl SearchQuery {
  pub fn new(text: impl Into<String>) -> Self {
    Self { text: text.into(), ..Self::default() }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a permissioned record store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Create a user. Fails if the id or username is already taken.
  ///
  /// The `user_created` audit entry is recorded under `created_by`, or under
  /// the new user's own id when there is no creator (first-boot seeding).
  fn create_user<'a>(
    &'a self,
    input: NewUser,
    created_by: Option<&'a str>,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + 'a;

  /// Retrieve a user by id. Returns `None` if not found.
  fn get_user<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  fn list_users(
    &self,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  // ── Resources ─────────────────────────────────────────────────────────

  /// Insert or update a resource by id.
  ///
  /// A new resource is owned by the caller. Updating an existing resource
  /// requires `write` unless the caller is its owner or an admin; the owner
  /// never changes.
  fn save<'a>(
    &'a self,
    input: NewResource,
    caller_id: &'a str,
  ) -> impl Future<Output = Result<Resource, Self::Error>> + Send + 'a;

  /// All resources of `kind` owned by `owner_id`, most recently updated
  /// first. ACL grants never widen this list.
  fn get_all<'a>(
    &'a self,
    kind: ResourceKind,
    owner_id: &'a str,
    filter: &'a ResourceFilter,
  ) -> impl Future<Output = Result<Vec<Resource>, Self::Error>> + Send + 'a;

  /// Fetch one resource. Requires `read`.
  fn get_one<'a>(
    &'a self,
    kind: ResourceKind,
    id: &'a str,
    caller_id: &'a str,
  ) -> impl Future<Output = Result<Resource, Self::Error>> + Send + 'a;

  /// Delete one resource and its ACL entries. Requires `delete`.
  fn delete<'a>(
    &'a self,
    kind: ResourceKind,
    id: &'a str,
    caller_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Evaluate the permission algorithm without performing an operation.
  fn check_permission<'a>(
    &'a self,
    caller_id: &'a str,
    kind: ResourceKind,
    id: &'a str,
    permission: Permission,
  ) -> impl Future<Output = Result<Decision, Self::Error>> + Send + 'a;

  // ── Access control ────────────────────────────────────────────────────

  /// Replace `user_id`'s permissions on a resource. Requires `share`.
  /// An empty set removes the entry.
  fn set_permissions<'a>(
    &'a self,
    kind: ResourceKind,
    resource_id: &'a str,
    user_id: &'a str,
    permissions: PermissionSet,
    caller_id: &'a str,
  ) -> impl Future<Output = Result<AclEntry, Self::Error>> + Send + 'a;

  /// All ACL entries of a resource. Requires `read`.
  fn get_permissions<'a>(
    &'a self,
    kind: ResourceKind,
    resource_id: &'a str,
    caller_id: &'a str,
  ) -> impl Future<Output = Result<Vec<AclEntry>, Self::Error>> + Send + 'a;

  // ── Audit log ─────────────────────────────────────────────────────────

  /// Append one entry to the activity log.
  fn append_activity(
    &self,
    entry: NewActivity,
  ) -> impl Future<Output = Result<ActivityLogEntry, Self::Error>> + Send + '_;

  /// The user's own entries, most recent first.
  fn recent_activity<'a>(
    &'a self,
    user_id: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<ActivityLogEntry>, Self::Error>> + Send + 'a;

  // ── Search ────────────────────────────────────────────────────────────

  /// Substring search over searchable kinds, filtered by `read` access.
  fn search<'a>(
    &'a self,
    query: &'a SearchQuery,
    caller_id: &'a str,
  ) -> impl Future<Output = Result<Vec<Resource>, Self::Error>> + Send + 'a;
}
