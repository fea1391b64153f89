//! Error type for `pillwatch-store-sqlite`.

use pillwatch_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain rule was violated (unknown user, duplicate event, ...).
  #[error(transparent)]
  Core(#[from] pillwatch_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown status in database: {0:?}")]
  UnknownStatus(String),
}

impl StoreError for Error {
  fn domain(&self) -> Option<&pillwatch_core::Error> {
    match self {
      Error::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
