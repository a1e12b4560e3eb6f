//! JSON REST API over a Docket complaint history.
//!
//! Exposes a read-only axum [`Router`] backed by any
//! [`docket_core::store::HistoryStore`]. Ingestion happens elsewhere; auth
//! and TLS are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", docket_api::api_router(store.clone()))
//! ```

pub mod complaints;
pub mod error;
pub mod reports;
pub mod runs;

use std::sync::Arc;

use axum::{Router, routing::get};
use docket_core::store::HistoryStore;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: HistoryStore + 'static,
{
  Router::new()
    .route("/complaints/{id}", get(complaints::history::<S>))
    .route("/runs", get(runs::list::<S>))
    .route("/reports/daily", get(reports::daily::<S>))
    .route("/reports/series", get(reports::series::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(store)
}

#[cfg(test)]
mod tests {
  use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
  };
  use chrono::{TimeZone, Utc};
  use docket_core::{
    normalize::{RawBatch, RawRecord},
    pipeline::Ingestor,
    window::Window,
  };
  use docket_store_sqlite::SqliteStore;
  use serde_json::Value;
  use tower::ServiceExt;

  use super::*;

  fn row(id: u64, date: &str, company: &str) -> RawRecord {
    [
      ("Complaint ID", id.to_string()),
      ("Date received", date.to_string()),
      ("Company", company.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
  }

  /// A store with two runs on 2024-03-01: two creations, then one amendment
  /// and one deletion.
  async fn seeded() -> Router {
    let ing = Ingestor::new(Arc::new(SqliteStore::open_in_memory().await.unwrap()));
    let at = |h| Utc.with_ymd_and_hms(2024, 3, 1, h, 0, 0).unwrap();

    ing
      .ingest(
        RawBatch::new(Window::full(), vec![
          row(1, "2024-01-05", "EQUIFAX, INC."),
          row(2, "2024-01-06", "TRANSUNION"),
        ]),
        at(1),
      )
      .await
      .unwrap();
    ing
      .ingest(
        RawBatch::new(Window::full(), vec![row(1, "2024-01-05", "Equifax, Inc.")]),
        at(2),
      )
      .await
      .unwrap();

    api_router(ing.store().clone())
  }

  async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let res = app
      .oneshot(Request::get(uri).body(Body::empty()).unwrap())
      .await
      .unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
  }

  #[tokio::test]
  async fn complaint_history_oldest_first() {
    let (status, body) = get(seeded().await, "/complaints/1").await;
    assert_eq!(status, StatusCode::OK);

    let versions = body.as_array().unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0]["payload"]["company"], "EQUIFAX, INC.");
    assert_eq!(versions[1]["payload"]["company"], "Equifax, Inc.");
  }

  #[tokio::test]
  async fn deleted_complaint_ends_with_empty_payload() {
    let (status, body) = get(seeded().await, "/complaints/2").await;
    assert_eq!(status, StatusCode::OK);

    let versions = body.as_array().unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[1]["payload"], serde_json::json!({}));
  }

  #[tokio::test]
  async fn unknown_complaint_is_404() {
    let (status, body) = get(seeded().await, "/complaints/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("99"));
  }

  #[tokio::test]
  async fn non_numeric_complaint_id_is_400() {
    let (status, _) = get(seeded().await, "/complaints/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn runs_are_listed() {
    let (status, body) = get(seeded().await, "/runs").await;
    assert_eq!(status, StatusCode::OK);

    let runs = body.as_array().unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0]["counts"]["new"], 2);
    assert_eq!(runs[1]["counts"]["amended"], 1);
    assert_eq!(runs[1]["counts"]["deleted"], 1);
  }

  #[tokio::test]
  async fn daily_report_nets_deletions() {
    let (status, body) = get(seeded().await, "/reports/daily").await;
    assert_eq!(status, StatusCode::OK);

    let days = body.as_array().unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0]["day"], "2024-03-01");
    assert_eq!(days[0]["created_net"], 1);
    assert_eq!(days[0]["updated"], 1);
  }

  #[tokio::test]
  async fn series_for_company() {
    let (status, body) =
      get(seeded().await, "/reports/series?field=company&value=Equifax,%20Inc.").await;
    assert_eq!(status, StatusCode::OK);

    let points = body.as_array().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["date"], "2024-01-05");
    assert_eq!(points[0]["cumulative"], 1);
  }

  #[tokio::test]
  async fn series_without_value_is_400() {
    let (status, body) = get(seeded().await, "/reports/series?field=company").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
  }
}
