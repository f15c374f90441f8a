//! Handlers for `/users` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/users` | Admin callers only. Body: [`NewUser`] |
//! | `GET`  | `/users/{id}` | 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use canvas_core::{
  store::RecordStore,
  user::{NewUser, User},
};

use crate::{caller::Caller, error::ApiError};

/// Resolve the caller to a known user, or 401.
pub(crate) async fn require_user<S>(store: &S, id: &str) -> Result<User, ApiError>
where
  S: RecordStore,
{
  store
    .get_user(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::UnknownCaller(id.to_owned()))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /users`, body: `{"username":"bob","email":"bob@example.com","role":"user"}`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Caller(caller): Caller,
  Json(body): Json<NewUser>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecordStore,
{
  let caller = require_user(store.as_ref(), &caller).await?;
  if !caller.is_admin() {
    return Err(ApiError::Forbidden("only admins can create users".into()));
  }

  let user = store
    .create_user(body, Some(caller.id.as_str()))
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(user)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /users/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Caller(caller): Caller,
  Path(id): Path<String>,
) -> Result<Json<User>, ApiError>
where
  S: RecordStore,
{
  require_user(store.as_ref(), &caller).await?;
  let user = store
    .get_user(&id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("user {id} not found")))?;
  Ok(Json(user))
}
