//! Handlers for `/reports` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/reports/daily` | Activity per capture day, from run counters |
//! | `GET`  | `/reports/series` | Requires `?field=...&value=...` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use docket_core::{
  latest::LatestView,
  report::{DailyActivity, SeriesPoint, daily_activity, entity_series},
  store::HistoryStore,
  window::Window,
};
use serde::Deserialize;

use crate::error::ApiError;

// ─── Daily ────────────────────────────────────────────────────────────────────

/// `GET /reports/daily`
pub async fn daily<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<DailyActivity>>, ApiError>
where
  S: HistoryStore,
{
  let runs = store.list_runs().await.map_err(ApiError::store)?;
  Ok(Json(daily_activity(&runs)))
}

// ─── Series ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct SeriesParams {
  /// Canonical payload field, e.g. `company`.
  pub field: Option<String>,
  pub value: Option<String>,
}

/// `GET /reports/series?field=<field>&value=<value>`
pub async fn series<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<SeriesParams>,
) -> Result<Json<Vec<SeriesPoint>>, ApiError>
where
  S: HistoryStore,
{
  let (Some(field), Some(value)) = (params.field, params.value) else {
    return Err(ApiError::BadRequest(
      "both `field` and `value` are required".to_owned(),
    ));
  };
  if field.trim().is_empty() {
    return Err(ApiError::BadRequest("`field` must not be empty".to_owned()));
  }

  let records = store
    .records_in_window(Window::full())
    .await
    .map_err(ApiError::store)?;
  let view = LatestView::reconstruct(Window::full(), records);
  Ok(Json(entity_series(&view, field.trim(), &value)))
}
