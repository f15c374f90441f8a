//! Error type for `canvas-store-sqlite`.

use canvas_core::{
  Classify, ErrorClass, access::Permission, resource::ResourceKind,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Validation failures from `canvas-core` (malformed payloads, unknown
  /// kinds or permissions).
  #[error(transparent)]
  Core(#[from] canvas_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored row could not be decoded back into a domain value.
  #[error("corrupt row: {0}")]
  Corrupt(String),

  #[error("user {user_id} lacks {permission} on {kind} {resource_id}")]
  PermissionDenied {
    user_id:     String,
    kind:        ResourceKind,
    resource_id: String,
    permission:  Permission,
  },

  #[error("{kind} not found: {resource_id}")]
  NotFound {
    kind:        ResourceKind,
    resource_id: String,
  },

  #[error("unknown user: {0}")]
  UnknownUser(String),

  #[error("user already exists: {0}")]
  UserExists(String),

  /// The migration list itself is unusable (bad file name, duplicate or
  /// out-of-order versions). Detected before any script runs.
  #[error("invalid migration set: {0}")]
  InvalidMigration(String),

  /// A migration script failed. Fatal: the store refuses to start.
  #[error("migration {version:03}_{name} failed: {source}")]
  MigrationFailed {
    version: u32,
    name:    String,
    #[source]
    source:  rusqlite::Error,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Classify for Error {
  fn class(&self) -> ErrorClass {
    match self {
      Self::Core(e) => e.class(),
      Self::PermissionDenied { .. } => ErrorClass::PermissionDenied,
      Self::NotFound { .. } => ErrorClass::NotFound,
      Self::UnknownUser(_) => ErrorClass::UnknownUser,
      Self::UserExists(_) => ErrorClass::Conflict,
      Self::Database(_)
      | Self::Sqlite(_)
      | Self::Json(_)
      | Self::Io(_)
      | Self::DateParse(_)
      | Self::Corrupt(_)
      | Self::InvalidMigration(_)
      | Self::MigrationFailed { .. } => ErrorClass::Internal,
    }
  }
}
