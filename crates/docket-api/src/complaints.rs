//! Handler for `GET /complaints/{id}`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use docket_core::{complaint::Record, store::HistoryStore};

use crate::error::ApiError;

/// `GET /complaints/{id}`: every version of the complaint, oldest first.
///
/// 404 if history holds no record for `id`. The path segment must parse as
/// an unsigned integer, otherwise axum rejects the request with 400.
pub async fn history<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<u64>,
) -> Result<Json<Vec<Record>>, ApiError>
where
  S: HistoryStore,
{
  let records = store
    .records_for_complaint(id)
    .await
    .map_err(ApiError::store)?;
  if records.is_empty() {
    return Err(ApiError::NotFound(format!("complaint {id} not found")));
  }
  Ok(Json(records))
}
