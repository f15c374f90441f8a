//! The `x-user-id` header extractor.

use axum::{extract::FromRequestParts, http::request::Parts};
use canvas_core::UserId;

use crate::error::ApiError;

pub const CALLER_HEADER: &str = "x-user-id";

/// The user a request runs on behalf of.
///
/// Only presence is checked here; the store rejects ids it does not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub UserId);

impl<S> FromRequestParts<S> for Caller
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    let id = parts
      .headers
      .get(CALLER_HEADER)
      .and_then(|v| v.to_str().ok())
      .map(str::trim)
      .filter(|id| !id.is_empty())
      .ok_or(ApiError::MissingCaller)?;
    Ok(Caller(id.to_owned()))
  }
}
