//! Handler for `GET /activity`: the caller's own audit trail.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use canvas_core::{activity::ActivityLogEntry, store::RecordStore};
use serde::Deserialize;

use crate::{caller::Caller, error::ApiError, users::require_user};

const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub struct RecentParams {
  pub limit: Option<usize>,
}

/// `GET /activity[?limit=...]`
pub async fn recent<S>(
  State(store): State<Arc<S>>,
  Caller(caller): Caller,
  Query(params): Query<RecentParams>,
) -> Result<Json<Vec<ActivityLogEntry>>, ApiError>
where
  S: RecordStore,
{
  require_user(store.as_ref(), &caller).await?;
  let entries = store
    .recent_activity(&caller, params.limit.unwrap_or(DEFAULT_LIMIT))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(entries))
}
