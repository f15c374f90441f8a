//! Activity log entries: the append-only audit trail.
//!
//! Entries are written after every mutating store operation and are never
//! updated or deleted by normal operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ResourceId, UserId, resource::ResourceKind};

/// Action recorded by `set_permissions`.
pub const ACL_UPDATED: &str = "acl_updated";

/// Action recorded when a user is created.
pub const USER_CREATED: &str = "user_created";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
  /// Monotonic, store-assigned sequence number.
  pub id:            i64,
  pub user_id:       UserId,
  pub action:        String,
  pub resource_type: Option<ResourceKind>,
  pub resource_id:   Option<ResourceId>,
  pub details:       Value,
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::RecordStore::append_activity`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
  pub user_id:       UserId,
  pub action:        String,
  pub resource_type: Option<ResourceKind>,
  pub resource_id:   Option<ResourceId>,
  pub details:       Value,
}

impl NewActivity {
  pub fn new(user_id: impl Into<UserId>, action: impl Into<String>) -> Self {
    Self {
      user_id:       user_id.into(),
      action:        action.into(),
      resource_type: None,
      resource_id:   None,
      details:       Value::Object(Default::default()),
    }
  }

  /// Attach the resource the action was performed on.
  pub fn on(mut self, kind: ResourceKind, id: impl Into<ResourceId>) -> Self {
    self.resource_type = Some(kind);
    self.resource_id = Some(id.into());
    self
  }

  pub fn with_details(mut self, details: Value) -> Self {
    self.details = details;
    self
  }
}
