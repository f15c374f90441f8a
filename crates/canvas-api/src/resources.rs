//! Handlers for `/resources/{kind}` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/resources/{kind}` | Caller's own resources. `?subtype=&limit=&offset=` |
//! | `POST`   | `/resources/{kind}` | Upsert. Body: `{"id":"doc-1","data":{...}}`, `id` optional |
//! | `GET`    | `/resources/{kind}/{id}` | Requires `read` |
//! | `DELETE` | `/resources/{kind}/{id}` | Requires `delete` |
//!
//! `kind` is one of the six wire values; anything else is a 400 before the
//! store is touched.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use canvas_core::{
  ResourceId,
  resource::{NewResource, Payload, Resource, ResourceFilter, ResourceKind},
  store::RecordStore,
};
use serde::Deserialize;

use crate::{caller::Caller, error::ApiError, users::require_user};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub subtype: Option<String>,
  pub limit:   Option<usize>,
  pub offset:  Option<usize>,
}

/// `GET /resources/{kind}`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Caller(caller): Caller,
  Path(kind): Path<String>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Resource>>, ApiError>
where
  S: RecordStore,
{
  let kind = ResourceKind::parse(&kind)?;
  require_user(store.as_ref(), &caller).await?;

  let filter = ResourceFilter {
    subtype: params.subtype,
    limit:   params.limit,
    offset:  params.offset,
  };
  let resources = store
    .get_all(kind, &caller, &filter)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(resources))
}

// ─── Save ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveBody {
  pub id:   Option<ResourceId>,
  pub data: serde_json::Value,
}

/// `POST /resources/{kind}`
pub async fn save<S>(
  State(store): State<Arc<S>>,
  Caller(caller): Caller,
  Path(kind): Path<String>,
  Json(body): Json<SaveBody>,
) -> Result<Json<Resource>, ApiError>
where
  S: RecordStore,
{
  let payload = Payload::parse(&kind, body.data)?;
  let input = NewResource { id: body.id, payload };

  let resource = store.save(input, &caller).await.map_err(ApiError::store)?;
  Ok(Json(resource))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /resources/{kind}/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Caller(caller): Caller,
  Path((kind, id)): Path<(String, String)>,
) -> Result<Json<Resource>, ApiError>
where
  S: RecordStore,
{
  let kind = ResourceKind::parse(&kind)?;
  let resource = store
    .get_one(kind, &id, &caller)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(resource))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /resources/{kind}/{id}`
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  Caller(caller): Caller,
  Path((kind, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError>
where
  S: RecordStore,
{
  let kind = ResourceKind::parse(&kind)?;
  store
    .delete(kind, &id, &caller)
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}
