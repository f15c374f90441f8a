//! Handlers for `/resources/{kind}/{id}/acl`.
//!
//! `PUT` replaces one grantee's permission set; an empty list revokes it.
//! Body: `{"user_id":"bob","permissions":["read","write"]}`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use canvas_core::{
  UserId,
  access::{AclEntry, PermissionSet},
  resource::ResourceKind,
  store::RecordStore,
};
use serde::Deserialize;

use crate::{caller::Caller, error::ApiError};

/// `GET /resources/{kind}/{id}/acl`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Caller(caller): Caller,
  Path((kind, id)): Path<(String, String)>,
) -> Result<Json<Vec<AclEntry>>, ApiError>
where
  S: RecordStore,
{
  let kind = ResourceKind::parse(&kind)?;
  let entries = store
    .get_permissions(kind, &id, &caller)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct ReplaceBody {
  pub user_id:     UserId,
  pub permissions: Vec<String>,
}

/// `PUT /resources/{kind}/{id}/acl`
pub async fn replace<S>(
  State(store): State<Arc<S>>,
  Caller(caller): Caller,
  Path((kind, id)): Path<(String, String)>,
  Json(body): Json<ReplaceBody>,
) -> Result<Json<AclEntry>, ApiError>
where
  S: RecordStore,
{
  let kind = ResourceKind::parse(&kind)?;
  let permissions = PermissionSet::parse(&body.permissions)?;

  let entry = store
    .set_permissions(kind, &id, &body.user_id, permissions, &caller)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(entry))
}
