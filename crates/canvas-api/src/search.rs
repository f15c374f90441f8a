//! Handler for `GET /search`.
//!
//! `kinds` is accepted as a comma-separated string, e.g. `document,rdf_entity`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use canvas_core::{
  resource::{Resource, ResourceKind},
  store::{RecordStore, SearchQuery},
};
use serde::Deserialize;

use crate::{caller::Caller, error::ApiError};

#[derive(Debug, Deserialize, Default)]
pub struct SearchParams {
  pub q:     Option<String>,
  pub kinds: Option<String>,
  pub limit: Option<usize>,
}

/// `GET /search?q=...[&kinds=...][&limit=...]`
pub async fn handler<S>(
  State(store): State<Arc<S>>,
  Caller(caller): Caller,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Resource>>, ApiError>
where
  S: RecordStore,
{
  let kinds = params
    .kinds
    .as_deref()
    .map(|s| {
      s.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(ResourceKind::parse)
        .collect::<Result<Vec<_>, _>>()
    })
    .transpose()?
    .unwrap_or_default();

  let query = SearchQuery {
    text: params.q.unwrap_or_default(),
    kinds,
    limit: params.limit,
  };

  let hits = store
    .search(&query, &caller)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(hits))
}
