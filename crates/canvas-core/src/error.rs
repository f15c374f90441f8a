//! Error types for `canvas-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("malformed resource: {0}")]
  Malformed(String),

  #[error("unknown resource kind: {0:?}")]
  UnknownKind(String),

  #[error("unknown permission: {0:?}")]
  UnknownPermission(String),

  #[error("unknown role: {0:?}")]
  UnknownRole(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// Coarse category of a store failure.
///
/// Transport layers (e.g. `canvas-api`) pick a response from the class alone,
/// so they never need to know which backend produced the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
  PermissionDenied,
  NotFound,
  Malformed,
  UnknownUser,
  Conflict,
  Internal,
}

/// Implemented by every error type a [`crate::store::RecordStore`] can return.
pub trait Classify {
  fn class(&self) -> ErrorClass;
}

impl Classify for Error {
  fn class(&self) -> ErrorClass {
    match self {
      Self::Malformed(_)
      | Self::UnknownKind(_)
      | Self::UnknownPermission(_)
      | Self::UnknownRole(_)
      | Self::Serialization(_) => ErrorClass::Malformed,
    }
  }
}
