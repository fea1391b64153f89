//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use pillwatch_core::store::StoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a store failure by the domain rule it broke, if any.
  pub fn from_store<E>(err: E) -> Self
  where
    E: std::error::Error + StoreError + Send + Sync + 'static,
  {
    match err.domain() {
      Some(d) if d.is_not_found() => ApiError::NotFound(d.to_string()),
      Some(d) if d.is_conflict() => ApiError::Conflict(d.to_string()),
      Some(d) => ApiError::BadRequest(d.to_string()),
      None => ApiError::Store(Box::new(err)),
    }
  }
}

impl From<pillwatch_core::Error> for ApiError {
  fn from(e: pillwatch_core::Error) -> Self { ApiError::BadRequest(e.to_string()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
