//! Handler for `GET /runs`.

use std::sync::Arc;

use axum::{Json, extract::State};
use docket_core::store::{HistoryStore, RunSummary};

use crate::error::ApiError;

/// `GET /runs`, oldest first.
pub async fn list<S>(State(store): State<Arc<S>>) -> Result<Json<Vec<RunSummary>>, ApiError>
where
  S: HistoryStore,
{
  let runs = store.list_runs().await.map_err(ApiError::store)?;
  Ok(Json(runs))
}
