//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use canvas_core::{Classify, ErrorClass};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("missing or invalid x-user-id header")]
  MissingCaller,

  #[error("unknown user: {0}")]
  UnknownCaller(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// A store failure, already classified.
  #[error("{source}")]
  Store {
    class:  ErrorClass,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl ApiError {
  /// Wrap any store error, keeping its class for the status mapping.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Classify + Send + Sync + 'static,
  {
    Self::Store { class: err.class(), source: Box::new(err) }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::MissingCaller | ApiError::UnknownCaller(_) => {
        StatusCode::UNAUTHORIZED
      }
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Store { class, .. } => match class {
        ErrorClass::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorClass::NotFound => StatusCode::NOT_FOUND,
        ErrorClass::Malformed => StatusCode::BAD_REQUEST,
        ErrorClass::UnknownUser => StatusCode::UNAUTHORIZED,
        ErrorClass::Conflict => StatusCode::CONFLICT,
        ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

/// Boundary parsing failures (unknown kind, bad payload, bad permission).
impl From<canvas_core::Error> for ApiError {
  fn from(err: canvas_core::Error) -> Self { ApiError::BadRequest(err.to_string()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
