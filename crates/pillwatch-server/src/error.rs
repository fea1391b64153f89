//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error("not found: {0}")]
  NotFound(String),
  #[error("bad request: {0}")]
  BadRequest(String),
  #[error("conflict: {0}")]
  Conflict(String),
  #[error("invalid configuration: {0}")]
  Config(String),
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<pillwatch_api::ApiError> for Error {
  fn from(e: pillwatch_api::ApiError) -> Self {
    use pillwatch_api::ApiError;
    match e {
      ApiError::NotFound(m) => Error::NotFound(m),
      ApiError::BadRequest(m) => Error::BadRequest(m),
      ApiError::Conflict(m) => Error::Conflict(m),
      ApiError::Store(e) => Error::Store(e),
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::Unauthorized => {
        let mut res =
          (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"pillwatch\""),
        );
        return res;
      }
      Error::NotFound(_) => StatusCode::NOT_FOUND,
      Error::BadRequest(_) => StatusCode::BAD_REQUEST,
      Error::Conflict(_) => StatusCode::CONFLICT,
      Error::Config(_) | Error::Store(_) => {
        tracing::error!(error = %self, "request failed");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
